//! Validated language and region codes.
//!
//! Editor-entered codes on gate and home pages, and codes negotiated from
//! requests, always pass through these types so the rest of the crate only
//! sees values from the configured enumerations.
//!
//! # Example
//!
//! ```rust,ignore
//! use region_gate::config::SiteConfig;
//! use region_gate::locale::{Language, Region};
//!
//! let config = SiteConfig::default();
//! let french = Language::from_code("fr", &config)?;
//! let canada = Region::from_code("CA", &config)?; // lower-cased on construction
//! ```

mod language;
mod region;

pub use language::Language;
pub use region::Region;
