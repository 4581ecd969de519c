pub mod cancellation;
pub mod error;
pub mod job;
pub mod plan;
