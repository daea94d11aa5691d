// Authentication: password hashing, JWT access/refresh tokens with
// server-side refresh rotation, and the bearer-token extractor.

pub mod extractor;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod refresh_store;
pub mod users;

pub use extractor::AuthUser;
