pub mod access;
pub mod handlers;
pub mod invitations;
pub mod service;
