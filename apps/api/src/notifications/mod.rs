pub mod handlers;
pub mod service;

pub use service::{notify, notify_many, NewNotification};
