const ELIGIBLE_EXTENSIONS: [&str; 6] = [".js", ".css", ".jpg", ".jpeg", ".png", ".gif"];

/// Determine whether a located URL may be served from the CDN.
///
/// The URL must mention one of the whitelisted extensions somewhere (case-insensitively,
/// not only as a suffix) and must not contain `//`, which rules out absolute and
/// protocol-relative URLs along with any relative path carrying a doubled slash.
pub fn is_rewrite_candidate(url: &str) -> bool {
  if url.contains("//") {
    return false;
  }

  let lowered = url.to_ascii_lowercase();
  ELIGIBLE_EXTENSIONS
    .iter()
    .any(|extension| lowered.contains(extension))
}
