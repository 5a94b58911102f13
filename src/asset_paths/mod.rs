//! Helpers for locating asset references in HTML and deciding how they map onto the CDN.
//!
//! Scanning, eligibility filtering and CDN URL synthesis live in separate submodules so each
//! rule can be tested on its own.

mod cdn;
mod filters;
mod scan;

pub use cdn::make_cdn_url;
pub use filters::is_rewrite_candidate;
pub use scan::locate_assets;
