//! Copy-page lifecycle.
//!
//! The host's page-tree component invokes these hooks synchronously around
//! a copy: `on_before_copy` may mutate the in-memory copy source or abort
//! the copy, `on_after_copy` runs once the copy is persisted.
//! [`copy_page`] is the host-side driver for [`MemoryTree`].
//!
//! `RegionCopyHooks` keeps regional homes consistent across copies:
//! each copy takes an unused region code (copying is refused once every
//! configured region has a home), and internal page references inside the
//! copy are repointed at the variant in the copy's own region.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, info};

use crate::blocks::Block;
use crate::config::SiteConfig;
use crate::gates::clean;
use crate::pages::{region_of, MemoryTree, PageId, PageKind, PageNode, PageTree, PageTreeMut};

#[derive(Debug, Error)]
pub enum HookError {
    /// Every configured region already has a home page among the siblings.
    #[error("No more regions available")]
    NoRegionsAvailable,

    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Copy failed: {0}")]
    CopyFailed(String),
}

/// Lifecycle events around a page copy. An `Err` from `on_before_copy`
/// aborts the copy before anything is written.
pub trait CopyLifecycle {
    fn on_before_copy(&self, tree: &dyn PageTree, page: &mut PageNode) -> Result<(), HookError>;

    fn on_after_copy(&self, tree: &mut dyn PageTreeMut, copied: PageId) -> Result<(), HookError>;
}

/// Region bookkeeping for copied regional homes.
pub struct RegionCopyHooks<'a> {
    config: &'a SiteConfig,
}

impl<'a> RegionCopyHooks<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        Self { config }
    }
}

impl CopyLifecycle for RegionCopyHooks<'_> {
    /// Soft-reassign the copy source to the first region no sibling home
    /// uses yet. Only the in-memory object is touched; the original page
    /// keeps its region.
    fn on_before_copy(&self, tree: &dyn PageTree, page: &mut PageNode) -> Result<(), HookError> {
        if page.kind != PageKind::RegionalHome {
            return Ok(());
        }

        let used: BTreeSet<&str> = tree
            .get_siblings(page.id)
            .iter()
            .filter_map(|sibling| sibling.region.as_deref())
            .collect();

        let available = self
            .config
            .regions
            .iter()
            .find(|region| !used.contains(region.as_str()));

        match available {
            Some(region) => {
                info!("Assigning region '{}' to copied home page", region);
                page.region = Some(region.clone());
                clean(page);
                Ok(())
            }
            None => Err(HookError::NoRegionsAvailable),
        }
    }

    /// Repair internal links: page references inside the copied home that
    /// point at another region's pages are repointed at the same-slug
    /// variant in the copy's region, when one exists.
    fn on_after_copy(&self, tree: &mut dyn PageTreeMut, copied: PageId) -> Result<(), HookError> {
        let rewrites = {
            let read = tree.as_read();
            let home = read.get(copied).ok_or(HookError::PageNotFound(copied))?;
            if home.kind != PageKind::RegionalHome {
                return Ok(());
            }
            let home_region = home.region.clone().unwrap_or_else(|| home.slug.clone());

            let mut rewrites: Vec<(usize, PageId)> = Vec::new();
            for (index, block) in home.body.blocks().iter().enumerate() {
                let Block::PageRef(reference) = block else {
                    continue;
                };
                let Some(target) = read.get(reference.target) else {
                    continue;
                };
                if region_of(read, reference.target).as_deref() == Some(home_region.as_str()) {
                    continue;
                }

                let replacement = read.all_pages().into_iter().find(|candidate| {
                    candidate.id != reference.target
                        && candidate.slug == target.slug
                        && region_of(read, candidate.id).as_deref() == Some(home_region.as_str())
                });
                if let Some(replacement) = replacement {
                    debug!(
                        "Rewriting page reference {} -> {} for region '{}'",
                        reference.target, replacement.id, home_region
                    );
                    rewrites.push((index, replacement.id));
                }
            }
            rewrites
        };

        if rewrites.is_empty() {
            return Ok(());
        }

        let home = tree.get_mut(copied).ok_or(HookError::PageNotFound(copied))?;
        for (index, new_target) in rewrites {
            if let Some(Block::PageRef(reference)) = home.body.blocks_mut().get_mut(index) {
                reference.target = new_target;
            }
        }
        Ok(())
    }
}

/// Copy a page and its descendants under the same parent, running the
/// lifecycle hooks around the operation.
pub fn copy_page(
    tree: &mut MemoryTree,
    src: PageId,
    hooks: &dyn CopyLifecycle,
) -> Result<PageId, HookError> {
    let mut draft = tree
        .get(src)
        .cloned()
        .ok_or(HookError::PageNotFound(src))?;

    hooks.on_before_copy(&*tree, &mut draft)?;

    let parent = draft.parent;
    let new_root = tree
        .add(parent, draft)
        .map_err(|e| HookError::CopyFailed(e.to_string()))?;
    copy_descendants(tree, src, new_root)?;

    hooks.on_after_copy(tree, new_root)?;
    Ok(new_root)
}

fn copy_descendants(
    tree: &mut MemoryTree,
    old_parent: PageId,
    new_parent: PageId,
) -> Result<(), HookError> {
    let child_ids: Vec<PageId> = tree
        .get_children(old_parent)
        .iter()
        .map(|child| child.id)
        .collect();

    for child_id in child_ids {
        let child = tree
            .get(child_id)
            .cloned()
            .ok_or(HookError::PageNotFound(child_id))?;
        let new_child = tree
            .add(Some(new_parent), child)
            .map_err(|e| HookError::CopyFailed(e.to_string()))?;
        copy_descendants(tree, child_id, new_child)?;
    }
    Ok(())
}
