pub mod event;
pub mod generation;
