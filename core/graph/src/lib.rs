//! Microsoft Graph access layer for CirrusDrive.
//!
//! This module provides:
//! - OAuth2 authentication against the Microsoft identity platform
//! - Token storage with atomic refresh
//! - A single authenticated request path with one-shot retry on token expiry
//! - Typed OneDrive operations (list, create, delete, upload, download)
//!
//! # Design Principles
//! - One refresh per call: a 401 triggers exactly one token renewal and one
//!   replay of the identical request, never a loop
//! - No hidden retries: transient network failures surface to the caller
//! - Transport isolation: the wire is behind a trait so the request path is
//!   testable without a network

pub mod auth;
pub mod client;
pub mod mock;
pub mod token;
pub mod transport;

pub use auth::{AuthConfig, AuthManager, Tokens};
pub use client::{DriveItem, FileFacet, FolderFacet, GraphClient};
pub use mock::{RejectingRefresher, ScriptedTransport, StaticRefresher};
pub use token::{RefreshTokens, TokenStore};
pub use transport::{ApiRequest, HttpTransport, RawResponse, Transport};
