#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod asset_paths;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod probe;
pub mod rewriter;

pub use cache::{CacheStore, JsonFileStore, MemoryStore, ReplacementMap};
pub use config::RewriteConfig;
pub use error::{ProbeError, StoreError};
pub use models::{AssetKind, AssetMatch, RewriteReport};
pub use probe::{HttpHeadProber, Prober};
pub use rewriter::CdnRewriter;
