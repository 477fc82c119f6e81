pub mod auth;
pub mod dev_otp;
pub mod health;
