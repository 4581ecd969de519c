pub mod matcher;
pub mod request;
