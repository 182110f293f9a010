pub mod auth;
pub mod error;
pub mod hash;
pub mod lock;
