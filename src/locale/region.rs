//! Region type: validated region code.

use crate::config::SiteConfig;
use anyhow::{bail, Result};

/// A validated region code, always lower-cased to match slug conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    code: String,
}

impl Region {
    /// Create a Region from a code string.
    ///
    /// The code is lower-cased before validation, so `"CA"` and `"ca"`
    /// produce the same region.
    pub fn from_code(code: &str, config: &SiteConfig) -> Result<Region> {
        let code = code.to_lowercase();
        if !config.is_region(&code) {
            bail!("Unknown region code: '{}'", code);
        }
        Ok(Region { code })
    }

    /// Get the region code.
    pub fn code(&self) -> &str {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_valid() {
        let config = SiteConfig::default();
        let region = Region::from_code("gb", &config).expect("Should succeed");
        assert_eq!(region.code(), "gb");
    }

    #[test]
    fn test_from_code_lowercases() {
        let config = SiteConfig::default();
        let region = Region::from_code("MX", &config).expect("Should succeed");
        assert_eq!(region.code(), "mx");
    }

    #[test]
    fn test_from_code_invalid() {
        let config = SiteConfig::default();
        let result = Region::from_code("jp", &config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown"));
    }
}
