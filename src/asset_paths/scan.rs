use std::sync::OnceLock;

use regex::Regex;

use crate::models::{AssetKind, AssetMatch};

fn asset_patterns() -> &'static [Regex; 3] {
  static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
  PATTERNS.get_or_init(|| {
    [
      Regex::new(r#"<img(?:.+?)src="(\S+)""#).expect("invalid img regex"),
      Regex::new(r#"<link(?:.+?)href="(\S+)""#).expect("invalid link regex"),
      Regex::new(r#"<script(?:.+?)src="(\S+)""#).expect("invalid script regex"),
    ]
  })
}

/// Pattern recognising one tag shape.
///
/// At least one character must separate the tag name from the target attribute, the
/// preceding attributes are skipped lazily and never cross a line break, and the value is
/// the longest run of non-whitespace that is still followed by a closing double quote.
fn asset_pattern(kind: AssetKind) -> &'static Regex {
  let patterns = asset_patterns();
  match kind {
    AssetKind::Image => &patterns[0],
    AssetKind::Stylesheet => &patterns[1],
    AssetKind::Script => &patterns[2],
  }
}

/// Lazily locate every occurrence of one tag shape within `html`.
pub fn locate_assets(html: &str, kind: AssetKind) -> impl Iterator<Item = AssetMatch<'_>> + '_ {
  asset_pattern(kind).captures_iter(html).filter_map(move |caps| {
    let whole = caps.get(0)?;
    let url = caps.get(1)?;
    Some(AssetMatch {
      kind,
      fragment: whole.as_str(),
      url: url.as_str(),
      span: whole.range(),
    })
  })
}
