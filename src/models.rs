//! Data structures produced while rewriting a document.

use std::fmt;
use std::ops::Range;

/// Tag shape an asset reference was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
  /// `<img ... src="...">`
  Image,
  /// `<link ... href="...">`
  Stylesheet,
  /// `<script ... src="...">`
  Script,
}

impl AssetKind {
  /// Scan order used by a rewrite pass.
  pub const ALL: [AssetKind; 3] = [AssetKind::Image, AssetKind::Stylesheet, AssetKind::Script];
}

impl fmt::Display for AssetKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Self::Image => "img",
      Self::Stylesheet => "link",
      Self::Script => "script",
    };
    f.write_str(label)
  }
}

/// A single recognised tag occurrence within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMatch<'a> {
  /// Tag shape that produced the match.
  pub kind: AssetKind,
  /// Full matched fragment, from the tag opener through the closing quote of the value.
  pub fragment: &'a str,
  /// Attribute value exactly as authored.
  pub url: &'a str,
  /// Byte range of `fragment` in the scanned text.
  pub span: Range<usize>,
}

/// Counters collected over one rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteReport {
  /// Tag occurrences located across all scans.
  pub candidates: usize,
  /// Candidates rejected by the URL classifier.
  pub ineligible: usize,
  /// Eligible candidates served from the replacement map.
  pub cache_hits: usize,
  /// Probes issued for cache misses.
  pub probes: usize,
  /// Probes that did not confirm the asset.
  pub probe_failures: usize,
  /// Fragments rewritten to a CDN URL, from cache or probe.
  pub rewritten: usize,
}

impl RewriteReport {
  /// Probes that confirmed an asset.
  pub fn probe_successes(&self) -> usize {
    self.probes - self.probe_failures
  }
}
