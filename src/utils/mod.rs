pub mod log_sanitizer;
pub mod phone_mask;

pub use log_sanitizer::*;
