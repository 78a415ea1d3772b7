//! The two redirection gates and their save-time normalization.
//!
//! `LanguageGate -> RegionGate -> RegionalHome` form a fixed pipeline: the
//! language gate always redirects one level down, the region gate either
//! redirects to a regional home or renders the selection prompt, and the
//! regional home commits the visitor's choice to the session.
//!
//! Geolocation is only consulted when the decision actually needs it; a
//! returning visitor with a stored region never triggers a lookup.

use anyhow::{bail, Context, Result};

use crate::config::SiteConfig;
use crate::geoip::{detect, Detection, GeoProvider};
use crate::locale::{Language, Region};
use crate::pages::{children_live, language_of, PageId, PageKind, PageNode, PageTree};
use crate::resolver::{resolve_language, resolve_region, GateOutcome, RegionalHomes};
use crate::session::SessionData;

/// Serve a language gate: resolve the language (session choice first) and
/// redirect to the matching region gate. Never renders a prompt.
///
/// A `selecting` visitor keeps the flag on the redirect target, so the
/// region gate one hop down still knows to prompt instead of honouring
/// the stored region.
pub fn serve_language_gate(
    tree: &dyn PageTree,
    gate: PageId,
    session: &SessionData,
    accept_language: Option<&str>,
    selecting: bool,
    config: &SiteConfig,
) -> Result<GateOutcome> {
    let page = tree.get(gate).context("Language gate not found in tree")?;
    if page.kind != PageKind::LanguageGate {
        bail!("Page {} is not a language gate", gate);
    }

    let detection = Detection::without_lookup(accept_language, config);
    let language = resolve_language(&detection, session, config);

    let path = tree
        .path_of(gate)
        .context("Language gate has no resolvable path")?;
    let marker = if selecting { "?selector=true" } else { "" };
    Ok(GateOutcome::Redirect(format!(
        "{}{}/{}",
        path,
        language.code(),
        marker
    )))
}

/// Serve a region gate for one request.
///
/// Runs detection lazily: the stored-choice fast path redirects without
/// ever calling the geolocation provider.
#[allow(clippy::too_many_arguments)]
pub async fn serve_region_gate(
    tree: &dyn PageTree,
    gate: PageId,
    session: &mut SessionData,
    raw_addr: Option<&str>,
    accept_language: Option<&str>,
    selecting: bool,
    provider: &dyn GeoProvider,
    config: &SiteConfig,
) -> Result<GateOutcome> {
    let page = tree.get(gate).context("Region gate not found in tree")?;
    if page.kind != PageKind::RegionGate {
        bail!("Page {} is not a region gate", gate);
    }

    let gate_path = tree
        .path_of(gate)
        .context("Region gate has no resolvable path")?;

    let needs_lookup = selecting || session.site_region.is_none();
    let detection = if needs_lookup {
        detect(raw_addr, accept_language, provider, config).await
    } else {
        Detection::without_lookup(accept_language, config)
    };

    let homes = regional_homes_under(tree, gate);
    Ok(resolve_region(
        &gate_path, &detection, session, selecting, &homes, config,
    ))
}

/// Live regional homes under a gate, keyed by region code.
pub fn regional_homes_under(tree: &dyn PageTree, gate: PageId) -> RegionalHomes {
    let mut homes = RegionalHomes::new();
    for child in children_live(tree, gate) {
        if child.kind != PageKind::RegionalHome {
            continue;
        }
        let Some(region) = child.region.as_deref() else {
            continue;
        };
        if let Some(path) = tree.path_of(child.id) {
            homes.insert(region.to_string(), path);
        }
    }
    homes
}

/// Commit the visitor's landing on a regional home: store the region and
/// the governing language in the session.
pub fn commit_locale_choice(
    tree: &dyn PageTree,
    home: PageId,
    session: &mut SessionData,
) -> Result<()> {
    let page = tree.get(home).context("Regional home not found in tree")?;
    if page.kind != PageKind::RegionalHome {
        bail!("Page {} is not a regional home", home);
    }

    session.site_region = Some(page.region.clone().unwrap_or_else(|| page.slug.clone()));
    if let Some(language) = language_of(tree, home) {
        session.site_language = Some(language);
    }
    Ok(())
}

/// Save-time normalization: gate and home slugs always mirror their
/// language/region attribute. Mismatches are corrected silently, never
/// rejected. Safe to run on every save.
pub fn clean(page: &mut PageNode) {
    let mirrored = match page.kind {
        PageKind::RegionGate => page.language.clone(),
        PageKind::RegionalHome => page.region.clone(),
        PageKind::LanguageGate | PageKind::Content => None,
    };
    if let Some(code) = mirrored {
        if page.slug != code {
            page.slug = code;
        }
    }
}

/// Assign a validated language to a region gate and normalize its slug.
pub fn set_gate_language(page: &mut PageNode, code: &str, config: &SiteConfig) -> Result<()> {
    if page.kind != PageKind::RegionGate {
        bail!("Only region gates carry a language");
    }
    let language = Language::from_code(code, config)?;
    page.language = Some(language.code().to_string());
    clean(page);
    Ok(())
}

/// Assign a validated region to a regional home and normalize its slug.
pub fn set_home_region(page: &mut PageNode, code: &str, config: &SiteConfig) -> Result<()> {
    if page.kind != PageKind::RegionalHome {
        bail!("Only regional homes carry a region");
    }
    let region = Region::from_code(code, config)?;
    page.region = Some(region.code().to_string());
    clean(page);
    Ok(())
}
