//! Managed library storage for exported transitions.
//!
//! This crate provides:
//! - The storage authority interface (authorization + file import)
//! - A directory-backed library that moves files in without overwriting
//! - Cross-device safe file moves

pub mod error;
pub mod fs_utils;
pub mod library;

pub use error::{StorageError, StorageResult};
pub use fs_utils::move_file;
pub use library::{AuthorizationStatus, LibraryStorage, StorageAuthority};
