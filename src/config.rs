use anyhow::{bail, Context, Result};

/// Configuration for a supported site language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageEntry {
    /// ISO 639-1 language code (e.g., "en", "fr")
    pub code: String,

    /// English name of the language (e.g., "English", "French")
    pub name: String,

    /// Native name of the language (e.g., "English", "Français")
    pub native_name: String,
}

/// Site-wide configuration for the region/language routing layer.
///
/// Passed explicitly into the resolver, the gates and the copy hooks at
/// construction time. Nothing in this crate reads configuration from
/// ambient global state.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Languages editors may assign to region gates, in preference order.
    /// The first entry is the default language.
    pub languages: Vec<LanguageEntry>,

    /// Region codes editors may assign to regional home pages.
    pub regions: Vec<String>,

    /// Region reported when no client address is resolvable.
    pub fallback_region: String,

    /// Base URL of the geolocation lookup service.
    pub geoip_base_url: String,

    /// Port for the demo gate server.
    pub port: u16,
}

impl SiteConfig {
    pub fn from_env() -> Result<Self> {
        let languages = match std::env::var("SITE_LANGUAGES") {
            Ok(raw) => parse_languages(&raw)?,
            Err(_) => default_languages(),
        };

        let regions = std::env::var("SITE_REGIONS")
            .map(|raw| parse_codes(&raw))
            .unwrap_or_else(|_| default_regions());

        if languages.is_empty() {
            bail!("SITE_LANGUAGES must list at least one language");
        }
        if regions.is_empty() {
            bail!("SITE_REGIONS must list at least one region");
        }

        Ok(Self {
            languages,
            regions,
            fallback_region: std::env::var("FALLBACK_REGION")
                .unwrap_or_else(|_| "us".to_string())
                .to_lowercase(),
            geoip_base_url: std::env::var("GEOIP_BASE_URL")
                .unwrap_or_else(|_| "https://geoip.example.com".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        })
    }

    /// Look up a language entry by code.
    pub fn language(&self, code: &str) -> Option<&LanguageEntry> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// The default language (first configured entry).
    ///
    /// # Panics
    /// Panics if the language list is empty; `from_env` and `default`
    /// both guarantee at least one entry.
    pub fn default_language(&self) -> &LanguageEntry {
        self.languages
            .first()
            .expect("SiteConfig must configure at least one language")
    }

    /// Check whether a region code is part of the configured set.
    pub fn is_region(&self, code: &str) -> bool {
        self.regions.iter().any(|region| region == code)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            regions: default_regions(),
            fallback_region: "us".to_string(),
            geoip_base_url: "https://geoip.example.com".to_string(),
            port: 8080,
        }
    }
}

/// Parse `SITE_LANGUAGES`, e.g. `en:English:English,fr:French:Français`.
/// The native name may be omitted, in which case the English name is reused.
fn parse_languages(raw: &str) -> Result<Vec<LanguageEntry>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.split(':');
            let code = parts
                .next()
                .filter(|code| !code.is_empty())
                .with_context(|| format!("Invalid language entry: '{}'", entry))?
                .to_lowercase();
            let name = parts.next().unwrap_or(&code).to_string();
            let native_name = parts.next().unwrap_or(&name).to_string();
            Ok(LanguageEntry {
                code,
                name,
                native_name,
            })
        })
        .collect()
}

/// Parse a comma-separated code list, e.g. `us,ca,gb`.
fn parse_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|code| code.trim().to_lowercase())
        .filter(|code| !code.is_empty())
        .collect()
}

fn default_languages() -> Vec<LanguageEntry> {
    vec![
        LanguageEntry {
            code: "en".to_string(),
            name: "English".to_string(),
            native_name: "English".to_string(),
        },
        LanguageEntry {
            code: "fr".to_string(),
            name: "French".to_string(),
            native_name: "Français".to_string(),
        },
        LanguageEntry {
            code: "es".to_string(),
            name: "Spanish".to_string(),
            native_name: "Español".to_string(),
        },
    ]
}

fn default_regions() -> Vec<String> {
    ["us", "ca", "gb", "fr", "es", "mx"]
        .iter()
        .map(|code| code.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "SITE_LANGUAGES",
            "SITE_REGIONS",
            "FALLBACK_REGION",
            "GEOIP_BASE_URL",
            "PORT",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_parse_languages_full_entries() {
        let langs = parse_languages("en:English:English,fr:French:Français").unwrap();
        assert_eq!(langs.len(), 2);
        assert_eq!(langs[0].code, "en");
        assert_eq!(langs[1].native_name, "Français");
    }

    #[test]
    fn test_parse_languages_code_only() {
        let langs = parse_languages("de").unwrap();
        assert_eq!(langs[0].code, "de");
        assert_eq!(langs[0].name, "de");
        assert_eq!(langs[0].native_name, "de");
    }

    #[test]
    fn test_parse_codes_normalizes() {
        let codes = parse_codes(" US, ca ,gb,");
        assert_eq!(codes, vec!["us", "ca", "gb"]);
    }

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.default_language().code, "en");
        assert_eq!(config.fallback_region, "us");
        assert!(config.is_region("mx"));
        assert!(!config.is_region("jp"));
    }

    #[test]
    fn test_language_lookup() {
        let config = SiteConfig::default();
        assert_eq!(config.language("fr").unwrap().name, "French");
        assert!(config.language("zz").is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = SiteConfig::from_env().unwrap();
        assert_eq!(config.languages.len(), 3);
        assert_eq!(config.regions.len(), 6);
        assert_eq!(config.port, 8080);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("SITE_LANGUAGES", "en:English,de:German:Deutsch");
        std::env::set_var("SITE_REGIONS", "us,de");
        std::env::set_var("FALLBACK_REGION", "DE");
        let config = SiteConfig::from_env().unwrap();
        assert_eq!(config.languages[1].native_name, "Deutsch");
        assert_eq!(config.regions, vec!["us", "de"]);
        assert_eq!(config.fallback_region, "de");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_empty_region_list() {
        clear_env();
        std::env::set_var("SITE_REGIONS", " , ");
        assert!(SiteConfig::from_env().is_err());
        clear_env();
    }
}
