pub mod exchange;
pub mod file_lock;
pub mod layout;
pub mod persist;
