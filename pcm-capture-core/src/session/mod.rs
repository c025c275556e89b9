pub mod capture_session;
pub mod capture_thread;
pub mod enumerator;
pub mod facade;
pub mod hotplug;
pub mod shared;
