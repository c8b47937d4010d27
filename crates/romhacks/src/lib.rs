//! `romhacks` - A catalog and submission moderation site for ROM hacks and game ports
//!
//! This library provides the catalog model, `SQLite` storage with deduplicated
//! download tracking and monthly popularity archives, and the axum server for
//! the public pages, the public API and the admin API.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod archive;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod import;
pub mod logging;
pub mod moderation;
pub mod month;
pub mod privacy;
pub mod storage;
pub mod validation;

pub use catalog::{Entry, EntryKind, Platform};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use month::YearMonth;
pub use storage::{SharedStorage, Storage, StorageStats};
