//! Page tree seam.
//!
//! The host CMS owns page storage; this module models the surface the
//! routing layer needs: typed nodes, ancestor/children/sibling traversal and
//! slug paths. [`MemoryTree`] is the in-memory implementation backing the
//! demo server and the tests.
//!
//! Locale lookups walk ancestors by node kind rather than by fixed tree
//! depth, so reorganizing the tree cannot silently break them; a missing
//! governing node still fails soft.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::blocks::StreamField;

pub type PageId = u64;

/// What role a node plays in the routing hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Root-adjacent gate that redirects on resolved language.
    LanguageGate,
    /// Child of a language gate; slug is kept equal to its language code.
    RegionGate,
    /// Terminal home page for one region; slug is kept equal to its region.
    RegionalHome,
    /// Ordinary content page.
    Content,
}

/// A node in the externally-owned page tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: PageId,
    pub parent: Option<PageId>,
    pub slug: String,
    pub title: String,
    pub kind: PageKind,

    /// Language code; meaningful on region gates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Region code; meaningful on regional homes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    pub live: bool,

    #[serde(default)]
    pub body: StreamField,
}

impl PageNode {
    pub fn new(kind: PageKind, slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: 0,
            parent: None,
            slug: slug.into(),
            title: title.into(),
            kind,
            language: None,
            region: None,
            live: true,
            body: StreamField::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_body(mut self, body: StreamField) -> Self {
        self.body = body;
        self
    }

    pub fn draft(mut self) -> Self {
        self.live = false;
        self
    }
}

/// Read surface of the host's page tree. Handlers hold `&dyn PageTree`
/// across await points, so implementations must be shareable.
pub trait PageTree: Send + Sync {
    fn get(&self, id: PageId) -> Option<&PageNode>;

    /// Ancestors from the root down to (optionally including) the page.
    fn get_ancestors(&self, id: PageId, inclusive: bool) -> Vec<&PageNode>;

    fn get_children(&self, id: PageId) -> Vec<&PageNode>;

    /// Pages sharing this page's parent, the page itself included.
    fn get_siblings(&self, id: PageId) -> Vec<&PageNode>;

    /// Slash-joined slug path, root node excluded, with a trailing slash.
    fn path_of(&self, id: PageId) -> Option<String>;

    fn all_pages(&self) -> Vec<&PageNode>;
}

/// Mutable extension used by the copy lifecycle.
pub trait PageTreeMut: PageTree {
    fn get_mut(&mut self, id: PageId) -> Option<&mut PageNode>;

    /// Read view of this tree.
    fn as_read(&self) -> &dyn PageTree;
}

/// In-memory page tree.
#[derive(Debug, Default)]
pub struct MemoryTree {
    pages: BTreeMap<PageId, PageNode>,
    next_id: PageId,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Insert a page under `parent` (or as the root when `parent` is None),
    /// returning its assigned id.
    pub fn add(&mut self, parent: Option<PageId>, mut page: PageNode) -> Result<PageId> {
        if let Some(parent_id) = parent {
            if !self.pages.contains_key(&parent_id) {
                bail!("Parent page {} does not exist", parent_id);
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        page.id = id;
        page.parent = parent;
        self.pages.insert(id, page);
        Ok(id)
    }

    /// Find a page by its slug path, e.g. `/en/us/`.
    pub fn find_by_path(&self, path: &str) -> Option<&PageNode> {
        let wanted = normalize_path(path);
        self.pages
            .values()
            .find(|page| self.path_of(page.id).as_deref() == Some(wanted.as_str()))
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

impl PageTree for MemoryTree {
    fn get(&self, id: PageId) -> Option<&PageNode> {
        self.pages.get(&id)
    }

    fn get_ancestors(&self, id: PageId, inclusive: bool) -> Vec<&PageNode> {
        let mut chain = Vec::new();
        let mut current = self.pages.get(&id);
        while let Some(page) = current {
            chain.push(page);
            current = page.parent.and_then(|parent| self.pages.get(&parent));
        }
        if !inclusive && !chain.is_empty() {
            chain.remove(0);
        }
        chain.reverse();
        chain
    }

    fn get_children(&self, id: PageId) -> Vec<&PageNode> {
        self.pages
            .values()
            .filter(|page| page.parent == Some(id))
            .collect()
    }

    fn get_siblings(&self, id: PageId) -> Vec<&PageNode> {
        let Some(page) = self.pages.get(&id) else {
            return Vec::new();
        };
        match page.parent {
            Some(parent) => self.get_children(parent),
            None => vec![page],
        }
    }

    fn path_of(&self, id: PageId) -> Option<String> {
        self.get(id)?;
        let slugs: Vec<&str> = self
            .get_ancestors(id, true)
            .into_iter()
            .filter(|page| page.parent.is_some())
            .map(|page| page.slug.as_str())
            .collect();
        Some(normalize_path(&slugs.join("/")))
    }

    fn all_pages(&self) -> Vec<&PageNode> {
        self.pages.values().collect()
    }
}

impl PageTreeMut for MemoryTree {
    fn get_mut(&mut self, id: PageId) -> Option<&mut PageNode> {
        self.pages.get_mut(&id)
    }

    fn as_read(&self) -> &dyn PageTree {
        self
    }
}

// ==================== Locale lookups ====================

/// Language code governing a page: the slug of its region-gate ancestor
/// (inclusive). `None` when the page sits outside a gate subtree.
pub fn language_of(tree: &dyn PageTree, id: PageId) -> Option<String> {
    tree.get_ancestors(id, true)
        .into_iter()
        .find(|page| page.kind == PageKind::RegionGate)
        .map(|page| page.slug.clone())
}

/// Region code governing a page: the slug of its regional-home ancestor
/// (inclusive).
pub fn region_of(tree: &dyn PageTree, id: PageId) -> Option<String> {
    tree.get_ancestors(id, true)
        .into_iter()
        .find(|page| page.kind == PageKind::RegionalHome)
        .map(|page| page.slug.clone())
}

/// Admin title with a ` - LANG` suffix. Fails soft: pages without a
/// governing language keep their plain title.
pub fn language_display_title(tree: &dyn PageTree, id: PageId) -> String {
    let Some(page) = tree.get(id) else {
        return String::new();
    };
    match language_of(tree, id) {
        Some(code) if !code.is_empty() => format!("{} - {}", page.title, code.to_uppercase()),
        _ => page.title.clone(),
    }
}

/// Admin title with a ` - REGION` suffix, same fail-soft contract.
pub fn region_display_title(tree: &dyn PageTree, id: PageId) -> String {
    let Some(page) = tree.get(id) else {
        return String::new();
    };
    match region_of(tree, id) {
        Some(code) if !code.is_empty() => format!("{} - {}", page.title, code.to_uppercase()),
        _ => page.title.clone(),
    }
}

/// All live pages sharing this page's slug: its regional variants,
/// the page itself included.
pub fn alternate_pages<'a>(tree: &'a dyn PageTree, id: PageId) -> Vec<&'a PageNode> {
    let Some(page) = tree.get(id) else {
        return Vec::new();
    };
    tree.all_pages()
        .into_iter()
        .filter(|candidate| candidate.live && candidate.slug == page.slug)
        .collect()
}

/// Live children of a page, for prompt rendering.
pub fn children_live<'a>(tree: &'a dyn PageTree, id: PageId) -> Vec<&'a PageNode> {
    tree.get_children(id)
        .into_iter()
        .filter(|page| page.live)
        .collect()
}
