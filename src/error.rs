//! Error types for probing and the external store.
//!
//! None of these escape a rewrite pass; the rewriter degrades every one of them to
//! "leave the original URL in place".

use std::path::PathBuf;

use thiserror::Error;

/// Reasons a CDN probe did not confirm an asset.
#[derive(Debug, Error)]
pub enum ProbeError {
  /// The CDN candidate could not be parsed or carries no host.
  #[error("malformed CDN url `{url}`")]
  MalformedUrl {
    /// Offending URL.
    url: String,
  },
  /// Host name resolution failed or produced no addresses.
  #[error("failed to resolve {host}:{port}")]
  Resolve {
    /// Host that was looked up.
    host: String,
    /// Port that was looked up.
    port: u16,
    /// Resolver error, when one was reported.
    #[source]
    source: Option<std::io::Error>,
  },
  /// No resolved address accepted a connection within the timeout.
  #[error("failed to connect to {host}:{port}")]
  Connect {
    /// Host that was dialled.
    host: String,
    /// Port that was dialled.
    port: u16,
    /// Error from the last attempted address.
    #[source]
    source: std::io::Error,
  },
  /// Writing the request or reading the response failed, including read timeouts.
  #[error("i/o with {host}:{port} failed")]
  Io {
    /// Host the exchange was with.
    host: String,
    /// Port the exchange was with.
    port: u16,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
  /// A response arrived but its status line was not `200 OK`.
  #[error("unexpected status line `{status_line}`")]
  Mismatch {
    /// Captured response prefix.
    status_line: String,
  },
}

/// Failures of an external replacement map store.
#[derive(Debug, Error)]
pub enum StoreError {
  /// Reading or writing the backing file failed.
  #[error("failed to access {}", path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    #[source]
    source: std::io::Error,
  },
  /// The backing file holds invalid JSON.
  #[error("failed to parse {}", path.display())]
  Parse {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    #[source]
    source: serde_json::Error,
  },
  /// The store contents could not be serialised.
  #[error("failed to serialise store contents")]
  Serialize(#[source] serde_json::Error),
}
