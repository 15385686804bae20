//! Session engine for CirrusDrive.
//!
//! This module provides:
//! - A navigation stack tracking the path from the drive root
//! - The drive session: the single authenticated gateway for file
//!   operations, always scoped to the current folder
//!
//! # Architecture
//! The session module sits between the user interface and the Graph access
//! layer. It owns no caches: every listing is a fresh remote fetch, so the
//! view never goes stale after concurrent external modification.

pub mod nav;
pub mod session;

pub use nav::{Crumb, NavigationStack};
pub use session::{DirectoryEntry, DriveSession};
