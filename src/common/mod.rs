//! Common types shared across gracedb.
//!
//! - Configuration constants and tunables
//! - Error types
//! - Identifiers (PageId, FrameId)

pub mod config;
pub mod error;
mod frame_id;
mod page_id;

pub use config::{IndexConfig, JoinConfig, PagerConfig};
pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_id::PageId;
