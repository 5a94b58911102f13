/// Build the CDN candidate for an origin URL.
///
/// The base is used verbatim; a `/` is inserted only when the origin URL does not already
/// start with one.
pub fn make_cdn_url(cdn_service_url: &str, origin_url: &str) -> String {
  let separator = if origin_url.starts_with('/') { "" } else { "/" };
  format!("{cdn_service_url}{separator}{origin_url}")
}
