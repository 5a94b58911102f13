//! Rewrite orchestrator tying the locator, classifier, replacement map and prober together.

use tracing::{debug, info, warn};

use crate::asset_paths::{is_rewrite_candidate, locate_assets, make_cdn_url};
use crate::cache::{CacheStore, ReplacementMap};
use crate::config::RewriteConfig;
use crate::models::{AssetKind, AssetMatch, RewriteReport};
use crate::probe::Prober;

/// Rewrites relative asset URLs in HTML to CDN URLs confirmed by a [`Prober`].
pub struct CdnRewriter<'a, P> {
  config: &'a RewriteConfig,
  prober: P,
}

impl<'a, P: Prober> CdnRewriter<'a, P> {
  /// Create a rewriter for the provided configuration and prober.
  pub fn new(config: &'a RewriteConfig, prober: P) -> Self {
    Self { config, prober }
  }

  /// Run a complete pass: load the replacement map, rewrite, then persist the map.
  ///
  /// The map is persisted even when nothing new was learned. Store failures are logged and
  /// never prevent the rewritten document from being returned.
  pub fn rewrite_with_store<S: CacheStore + ?Sized>(&self, html: &str, store: &mut S) -> String {
    let mut replacements = ReplacementMap::load(&*store, &self.config.cache_key);
    let (output, _) = self.rewrite(html, &mut replacements);

    if let Err(err) = replacements.persist(
      store,
      &self.config.cache_key,
      self.config.replacement_map_ttl(),
    ) {
      warn!(error = %err, "Failed to persist replacement map");
    }

    output
  }

  /// Rewrite `html` against an in-memory replacement map, recording new confirmations.
  ///
  /// Images, stylesheets and scripts are scanned in that order, each scan working on the
  /// output of the previous one.
  pub fn rewrite(&self, html: &str, replacements: &mut ReplacementMap) -> (String, RewriteReport) {
    let mut report = RewriteReport::default();
    let mut text = html.to_string();

    for kind in AssetKind::ALL {
      text = self.rewrite_kind(&text, kind, replacements, &mut report);
    }

    info!(
      candidates = report.candidates,
      cache_hits = report.cache_hits,
      probes = report.probes,
      rewritten = report.rewritten,
      "CDN rewrite pass complete"
    );

    (text, report)
  }

  fn rewrite_kind(
    &self,
    text: &str,
    kind: AssetKind,
    replacements: &mut ReplacementMap,
    report: &mut RewriteReport,
  ) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;

    for found in locate_assets(text, kind) {
      output.push_str(&text[cursor..found.span.start]);
      output.push_str(&self.rewrite_fragment(&found, replacements, report));
      cursor = found.span.end;
    }

    output.push_str(&text[cursor..]);
    output
  }

  fn rewrite_fragment(
    &self,
    found: &AssetMatch<'_>,
    replacements: &mut ReplacementMap,
    report: &mut RewriteReport,
  ) -> String {
    report.candidates += 1;
    let origin = found.url;

    if !is_rewrite_candidate(origin) {
      report.ineligible += 1;
      return found.fragment.to_string();
    }

    if let Some(cdn_url) = replacements.lookup(origin) {
      debug!(kind = %found.kind, origin, cdn_url, "Replacement map hit");
      report.cache_hits += 1;
      report.rewritten += 1;
      return found.fragment.replace(origin, cdn_url);
    }

    let cdn_url = make_cdn_url(&self.config.cdn_service_url, origin);
    report.probes += 1;
    match self.prober.probe(&cdn_url) {
      Ok(()) => {
        debug!(kind = %found.kind, origin, cdn_url = %cdn_url, "CDN confirmed asset");
        let rewritten = found.fragment.replace(origin, &cdn_url);
        replacements.insert(origin, cdn_url);
        report.rewritten += 1;
        rewritten
      }
      Err(err) => {
        debug!(kind = %found.kind, origin, cdn_url = %cdn_url, error = %err, "CDN probe failed");
        report.probe_failures += 1;
        found.fragment.to_string()
      }
    }
  }
}
