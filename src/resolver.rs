//! Region/language resolution.
//!
//! Pure decision logic: given the per-request detection, the session
//! context and the set of live regional homes, decide whether to redirect
//! or to render the selection prompt. No I/O happens here; geolocation runs
//! beforehand (and only when a decision actually needs it, see
//! [`crate::gates`]).
//!
//! Precedence, highest to lowest:
//! 1. a session `site_language` choice overrides language negotiation;
//! 2. a session `site_region` choice (outside selecting mode) redirects
//!    immediately;
//! 3. selecting mode always renders the prompt and marks the session as
//!    "already chose", so the prompt never returns even if the visitor
//!    abandons the flow;
//! 4. a geolocated country with a matching regional home redirects there;
//! 5. everything else (missing address, private address, unsupported
//!    country) renders the prompt.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::SiteConfig;
use crate::geoip::{Detection, RegionHint};
use crate::locale::Language;
use crate::session::SessionData;

/// What a gate should do with the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Issue a redirect to the given path.
    Redirect(String),
    /// Render the selection prompt with this context.
    Render(PromptContext),
}

/// Template context for the selection prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptContext {
    /// Geolocated region, the `private` sentinel, or the configured
    /// fallback when nothing was detected.
    pub detected_region: String,

    pub detected_ip: Option<String>,

    pub detected_language: String,

    /// When set, every outbound link on the rendered page must carry the
    /// `selector=true` marker so the choosing signal survives navigation.
    pub selecting_new_region_or_language: bool,
}

/// Live regional homes under a gate: region code to page path.
pub type RegionalHomes = BTreeMap<String, String>;

/// Resolve the language for a request: an explicit session choice wins over
/// header negotiation, but only if it is still a configured language.
pub fn resolve_language(
    detection: &Detection,
    session: &SessionData,
    config: &SiteConfig,
) -> Language {
    session
        .site_language
        .as_deref()
        .and_then(|code| Language::from_code(code, config).ok())
        .unwrap_or_else(|| detection.language.clone())
}

/// Drive the region-gate decision for one request.
///
/// `gate_path` is the serving gate's own path (used for session-choice
/// redirects); `homes` maps each live regional home's region to its path.
/// May set `chosen_region_or_language` on the session; never touches page
/// data.
pub fn resolve_region(
    gate_path: &str,
    detection: &Detection,
    session: &mut SessionData,
    selecting: bool,
    homes: &RegionalHomes,
    config: &SiteConfig,
) -> GateOutcome {
    let language = resolve_language(detection, session, config);

    if selecting {
        // Mark now, not when the choice lands: "don't ask again" must
        // survive an abandoned selection flow.
        session.chosen_region_or_language = true;
        return GateOutcome::Render(prompt_context(detection, &language, true, config));
    }

    if let Some(region) = &session.site_region {
        // Returning visitor: honour the stored choice and skip geolocation.
        return GateOutcome::Redirect(format!("{}{}/", gate_path, region));
    }

    match &detection.region {
        RegionHint::Country(code) => match homes.get(code) {
            Some(path) => GateOutcome::Redirect(path.clone()),
            // Unsupported region: let the visitor pick manually.
            None => GateOutcome::Render(prompt_context(detection, &language, false, config)),
        },
        RegionHint::Private | RegionHint::Unknown => {
            GateOutcome::Render(prompt_context(detection, &language, false, config))
        }
    }
}

fn prompt_context(
    detection: &Detection,
    language: &Language,
    selecting: bool,
    config: &SiteConfig,
) -> PromptContext {
    let detected_region = match &detection.region {
        RegionHint::Country(code) => code.clone(),
        RegionHint::Private => "private".to_string(),
        RegionHint::Unknown => config.fallback_region.clone(),
    };

    PromptContext {
        detected_region,
        detected_ip: detection.addr.ip().map(|ip| ip.to_string()),
        detected_language: language.code().to_string(),
        selecting_new_region_or_language: selecting,
    }
}
