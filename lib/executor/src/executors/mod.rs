pub mod common;
pub mod error;
pub mod http;
pub mod map;
pub mod timeout;
