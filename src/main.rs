use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::header::{HeaderMap, ACCEPT_LANGUAGE, COOKIE, SET_COOKIE};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use region_gate::blocks::{Block, PageRefBlock, ParagraphBlock, StreamField};
use region_gate::config::SiteConfig;
use region_gate::gates::{
    commit_locale_choice, serve_language_gate, serve_region_gate, set_gate_language,
    set_home_region,
};
use region_gate::geoip::{GeoProvider, HttpGeoProvider};
use region_gate::pages::{
    alternate_pages, children_live, region_display_title, region_of, MemoryTree, PageId, PageKind,
    PageNode, PageTree, PageTreeMut,
};
use region_gate::resolver::{GateOutcome, PromptContext};
use region_gate::session::SessionStore;

const SESSION_COOKIE: &str = "rg_session";

struct App {
    config: SiteConfig,
    tree: RwLock<MemoryTree>,
    sessions: SessionStore,
    geo: Box<dyn GeoProvider>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("region_gate=info".parse()?),
        )
        .init();

    info!("Starting region gate server");

    let config = SiteConfig::from_env()?;
    let geo = HttpGeoProvider::new(config.geoip_base_url.clone())?;
    let tree = demo_tree(&config)?;
    let port = config.port;

    let app = Arc::new(App {
        config,
        tree: RwLock::new(tree),
        sessions: SessionStore::new(),
        geo: Box::new(geo),
    });

    let router = Router::new()
        .route("/", get(serve_path))
        .route("/*path", get(serve_path))
        .with_state(app)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn serve_path(
    State(app): State<Arc<App>>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    // Session bootstrap: reuse the cookie id or mint a fresh one.
    let (session_id, is_new_session) = match cookie_value(&headers, SESSION_COOKIE) {
        Some(id) => (id, false),
        None => (app.sessions.create(), true),
    };
    let mut session = app.sessions.load(&session_id);

    // The selecting flag lives in the query string and may be absent.
    let selecting = params
        .get("selector")
        .map(|value| value == "true")
        .unwrap_or(false);

    let client_ip = client_ip(&headers, peer);
    let accept_language = headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());

    let tree = app.tree.read().await;
    let Some(page) = tree.find_by_path(uri.path()) else {
        return (StatusCode::NOT_FOUND, "page not found").into_response();
    };
    let page_id = page.id;

    let response = match page.kind {
        PageKind::LanguageGate => {
            match serve_language_gate(
                &*tree,
                page_id,
                &session,
                accept_language,
                selecting,
                &app.config,
            ) {
                Ok(GateOutcome::Redirect(path)) => Redirect::to(&path).into_response(),
                Ok(GateOutcome::Render(_)) => internal_error(uri.path(), "unexpected prompt"),
                Err(e) => internal_error(uri.path(), &e.to_string()),
            }
        }
        PageKind::RegionGate => {
            let outcome = serve_region_gate(
                &*tree,
                page_id,
                &mut session,
                client_ip.as_deref(),
                accept_language,
                selecting,
                app.geo.as_ref(),
                &app.config,
            )
            .await;
            match outcome {
                Ok(GateOutcome::Redirect(path)) => Redirect::to(&path).into_response(),
                Ok(GateOutcome::Render(ctx)) => {
                    Html(render_prompt(&*tree, page_id, &ctx)).into_response()
                }
                Err(e) => internal_error(uri.path(), &e.to_string()),
            }
        }
        PageKind::RegionalHome => {
            // Landing here commits the visitor's region and language.
            if let Err(e) = commit_locale_choice(&*tree, page_id, &mut session) {
                error!("Failed to commit locale choice: {}", e);
            }
            Html(render_page(&*tree, page_id, session.chosen_region_or_language)).into_response()
        }
        PageKind::Content => {
            Html(render_page(&*tree, page_id, session.chosen_region_or_language)).into_response()
        }
    };

    app.sessions.save(&session_id, session);

    if is_new_session {
        let mut response = response;
        let cookie = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, session_id);
        if let Ok(value) = axum::http::HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
        return response;
    }
    response
}

fn internal_error(path: &str, reason: &str) -> Response {
    error!("Failed to serve {}: {}", path, reason);
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
}

/// First `X-Forwarded-For` hop when present, else the peer address.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .or_else(|| Some(peer.ip().to_string()))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Region selection prompt. In selecting mode every outbound link keeps
/// the `selector=true` marker so the signal survives navigation.
fn render_prompt(tree: &dyn PageTree, gate: PageId, ctx: &PromptContext) -> String {
    let marker = if ctx.selecting_new_region_or_language {
        "?selector=true"
    } else {
        ""
    };

    let mut links = String::new();
    for home in children_live(tree, gate) {
        if home.kind != PageKind::RegionalHome {
            continue;
        }
        if let Some(path) = tree.path_of(home.id) {
            links.push_str(&format!(
                "<li><a href=\"{}{}\">{}</a></li>\n",
                path, marker, home.title
            ));
        }
    }

    format!(
        "<html><body>\n<h1>Choose your region</h1>\n<ul>\n{}</ul>\n\
         <p>Detected region: {}</p>\n<p>Detected language: {}</p>\n\
         <p>Detected address: {}</p>\n</body></html>",
        links,
        ctx.detected_region,
        ctx.detected_language,
        ctx.detected_ip.as_deref().unwrap_or("unknown"),
    )
}

/// Render a content or home page. `explicit_choice` mirrors the session's
/// `chosen_region_or_language` flag: visitors still on an automatic region
/// get a notice inviting them to pick, visitors who already chose get the
/// plain switcher link.
fn render_page(tree: &dyn PageTree, id: PageId, explicit_choice: bool) -> String {
    let Some(page) = tree.get(id) else {
        return String::new();
    };

    let mut body = String::new();
    for block in page.body.blocks() {
        match block {
            Block::Paragraph(paragraph) => {
                body.push_str(&format!("<p>{}</p>\n", paragraph.text));
            }
            Block::PageRef(reference) => {
                if let (Some(target), Some(path)) =
                    (tree.get(reference.target), tree.path_of(reference.target))
                {
                    body.push_str(&format!(
                        "<p><a href=\"{}\">{}</a></p>\n",
                        path, target.title
                    ));
                }
            }
            Block::Image(image) => {
                body.push_str(&format!(
                    "<figure><img alt=\"{}\"/><figcaption>{}</figcaption></figure>\n",
                    image.image_alt_text, image.image_caption
                ));
            }
        }
    }

    let mut children = String::new();
    for child in children_live(tree, id) {
        if let Some(path) = tree.path_of(child.id) {
            children.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                path, child.title
            ));
        }
    }

    // The same page in other regions, linked by shared slug.
    let mut alternates = String::new();
    for alternate in alternate_pages(tree, id) {
        if alternate.id == id {
            continue;
        }
        if let (Some(path), Some(region)) = (tree.path_of(alternate.id), region_of(tree, alternate.id))
        {
            alternates.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                path,
                region.to_uppercase()
            ));
        }
    }
    let alternates = if alternates.is_empty() {
        String::new()
    } else {
        format!("<p>Also available in:</p>\n<ul>\n{}</ul>\n", alternates)
    };

    let switcher = if explicit_choice {
        "<p><a href=\"/?selector=true\">Change region or language</a></p>\n"
    } else {
        "<p>This region was picked automatically. \
         <a href=\"/?selector=true\">Not right? Choose your region.</a></p>\n"
    };

    format!(
        "<html><body>\n<h1>{}</h1>\n{}<ul>\n{}</ul>\n{}{}</body></html>",
        region_display_title(tree, id),
        body,
        children,
        alternates,
        switcher,
    )
}

/// Sample site tree: language gate root, one region gate per configured
/// language, a few regional homes with linked content.
fn demo_tree(config: &SiteConfig) -> Result<MemoryTree> {
    let mut tree = MemoryTree::new();
    let root = tree.add(None, PageNode::new(PageKind::LanguageGate, "home", "Home"))?;

    let homes_by_language: &[(&str, &[&str])] = &[
        ("en", &["us", "ca", "gb"]),
        ("fr", &["fr", "ca"]),
        ("es", &["es", "mx"]),
    ];

    for (language, regions) in homes_by_language {
        if config.language(language).is_none() {
            continue;
        }
        let mut gate = PageNode::new(PageKind::RegionGate, *language, language.to_uppercase());
        set_gate_language(&mut gate, language, config)?;
        let gate_id = tree.add(Some(root), gate)?;

        for region in *regions {
            if !config.is_region(region) {
                continue;
            }
            let mut home = PageNode::new(PageKind::RegionalHome, *region, region.to_uppercase());
            set_home_region(&mut home, region, config)?;
            let home_id = tree.add(Some(gate_id), home)?;

            let about = tree.add(
                Some(home_id),
                PageNode::new(PageKind::Content, "about", "About Us"),
            )?;

            let mut body = StreamField::new();
            body.push(Block::Paragraph(ParagraphBlock {
                text: format!("Welcome to the {} home page.", region.to_uppercase()),
            }));
            body.push(Block::PageRef(PageRefBlock { target: about }));
            if let Some(home) = tree.get_mut(home_id) {
                home.body = body;
            }
        }
    }

    Ok(tree)
}
