//! Storage layer - disk I/O for page files.
//!
//! - [`DiskManager`] - Low-level page reads and writes

mod disk_manager;

pub use disk_manager::DiskManager;
