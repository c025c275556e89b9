pub mod capture_backend;
pub mod capture_delegate;
pub mod consumer;
pub mod notification;
