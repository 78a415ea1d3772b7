//! Language type: validated language representation.
//!
//! A `Language` can only be constructed from a code present in the site
//! configuration, so downstream code never has to re-check membership.

use crate::config::SiteConfig;
use anyhow::{bail, Result};

/// A validated language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    /// ISO 639-1 language code (e.g., "en", "fr")
    code: String,
}

impl Language {
    /// Create a Language from a language code string.
    ///
    /// # Returns
    /// * `Ok(Language)` if the code is in the configured language list
    /// * `Err` if the code is not configured
    pub fn from_code(code: &str, config: &SiteConfig) -> Result<Language> {
        let code = code.to_lowercase();
        match config.language(&code) {
            Some(entry) => Ok(Language {
                code: entry.code.clone(),
            }),
            None => bail!("Unknown language code: '{}'", code),
        }
    }

    /// The site's default language (first configured entry).
    pub fn default_for(config: &SiteConfig) -> Language {
        Language {
            code: config.default_language().code.clone(),
        }
    }

    /// Negotiate a language from an `Accept-Language` header value.
    ///
    /// Honours q-values and matches on the primary subtag (`fr-CA` matches a
    /// configured `fr`). Falls back to the site default when the header is
    /// missing, malformed, or lists no configured language.
    pub fn negotiate(accept_language: Option<&str>, config: &SiteConfig) -> Language {
        let Some(header) = accept_language else {
            return Language::default_for(config);
        };

        let mut candidates: Vec<(f32, String)> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.trim().split(';');
                let tag = pieces.next()?.trim();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = pieces
                    .find_map(|piece| piece.trim().strip_prefix("q=").map(str::to_string))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                // Primary subtag only: "fr-CA" -> "fr"
                let primary = tag.split('-').next()?.to_lowercase();
                Some((quality, primary))
            })
            .collect();

        // Stable sort keeps header order between equal q-values.
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (_, code) in candidates {
            if let Ok(language) = Language::from_code(&code, config) {
                return language;
            }
        }

        Language::default_for(config)
    }

    /// Get the ISO 639-1 language code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the English name of the language.
    pub fn name<'a>(&self, config: &'a SiteConfig) -> &'a str {
        config
            .language(&self.code)
            .map(|entry| entry.name.as_str())
            .unwrap_or("")
    }

    /// Get the native name of the language.
    pub fn native_name<'a>(&self, config: &'a SiteConfig) -> &'a str {
        config
            .language(&self.code)
            .map(|entry| entry.native_name.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== from_code Tests ====================

    #[test]
    fn test_from_code_valid() {
        let config = SiteConfig::default();
        let language = Language::from_code("fr", &config).expect("Should succeed");
        assert_eq!(language.code(), "fr");
        assert_eq!(language.name(&config), "French");
        assert_eq!(language.native_name(&config), "Français");
    }

    #[test]
    fn test_from_code_uppercase_normalized() {
        let config = SiteConfig::default();
        let language = Language::from_code("EN", &config).expect("Should succeed");
        assert_eq!(language.code(), "en");
    }

    #[test]
    fn test_from_code_invalid() {
        let config = SiteConfig::default();
        let result = Language::from_code("de", &config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown"));
    }

    #[test]
    fn test_from_code_empty() {
        let config = SiteConfig::default();
        assert!(Language::from_code("", &config).is_err());
    }

    // ==================== negotiate Tests ====================

    #[test]
    fn test_negotiate_missing_header_falls_back() {
        let config = SiteConfig::default();
        assert_eq!(Language::negotiate(None, &config).code(), "en");
    }

    #[test]
    fn test_negotiate_simple_match() {
        let config = SiteConfig::default();
        let language = Language::negotiate(Some("es"), &config);
        assert_eq!(language.code(), "es");
    }

    #[test]
    fn test_negotiate_regional_subtag() {
        let config = SiteConfig::default();
        let language = Language::negotiate(Some("fr-CA,en;q=0.8"), &config);
        assert_eq!(language.code(), "fr");
    }

    #[test]
    fn test_negotiate_quality_ordering() {
        let config = SiteConfig::default();
        // Spanish has the higher q-value and should win despite header order.
        let language = Language::negotiate(Some("fr;q=0.5,es;q=0.9"), &config);
        assert_eq!(language.code(), "es");
    }

    #[test]
    fn test_negotiate_skips_unknown_languages() {
        let config = SiteConfig::default();
        let language = Language::negotiate(Some("de,ja;q=0.9,fr;q=0.8"), &config);
        assert_eq!(language.code(), "fr");
    }

    #[test]
    fn test_negotiate_all_unknown_falls_back() {
        let config = SiteConfig::default();
        let language = Language::negotiate(Some("de,ja"), &config);
        assert_eq!(language.code(), "en");
    }

    #[test]
    fn test_negotiate_garbage_header_falls_back() {
        let config = SiteConfig::default();
        let language = Language::negotiate(Some(";;;,,q="), &config);
        assert_eq!(language.code(), "en");
    }
}
