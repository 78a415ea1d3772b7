//! Region and language aware routing for page-tree CMS sites.
//!
//! A visitor with no prior session state hits the language gate at the site
//! root, gets redirected to a region gate for their negotiated language,
//! and from there either straight to the regional home page matching their
//! geolocated country or to a selection prompt. Returning visitors and
//! visitors actively switching region are handled from session state alone.
//!
//! The host CMS supplies page storage and editing; this crate models those
//! seams explicitly (the [`pages::PageTree`] trait, the
//! [`hooks::CopyLifecycle`] interface, the [`session::SessionData`]
//! context) so the decision logic stays testable in isolation.

pub mod blocks;
pub mod config;
pub mod gates;
pub mod geoip;
pub mod hooks;
pub mod locale;
pub mod pages;
pub mod resolver;
pub mod session;
