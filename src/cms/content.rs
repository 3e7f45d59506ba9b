//! Static marketing pages with optional CMS overrides.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cms::models::Page;
use crate::cms::repository::Repository;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub slug: String,
    pub title: String,
    pub content: Value,
    /// True when a published CMS page contributed to the content.
    pub overridden: bool,
}

/// Built-in copy for a marketing page, if the site ships one.
pub fn default_page(slug: &str) -> Option<PageView> {
    let (title, content) = match slug {
        "home" => (
            "Home",
            json!({
                "hero": {
                    "heading": "Technology that grows with your business",
                    "subheading": "IT services, online stores, marketing and custom software under one roof.",
                    "cta": { "text": "Start a conversation", "link": "/contact" }
                },
                "sections": ["services", "testimonials", "contact"]
            }),
        ),
        "about" => (
            "About us",
            json!({
                "hero": { "heading": "A small team with a long track record" },
                "body": "We have helped businesses of every size plan, build and run their digital products."
            }),
        ),
        "services" => (
            "Services",
            json!({
                "hero": { "heading": "What we do" },
                "services": [
                    "IT Services",
                    "E-commerce Services",
                    "Digital Marketing",
                    "Custom Software Development"
                ]
            }),
        ),
        "contact" => (
            "Contact",
            json!({
                "hero": { "heading": "Let's talk" },
                "email": "hello@sitedesk.io"
            }),
        ),
        _ => return None,
    };

    Some(PageView {
        slug: slug.to_string(),
        title: title.to_string(),
        content,
        overridden: false,
    })
}

/// Merges `overlay` into `base`. Objects merge key by key, `null` leaves the
/// base value alone, anything else replaces it.
pub fn merge_content(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_content(existing, value),
                    None => {
                        if !value.is_null() {
                            base.insert(key, value);
                        }
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

pub struct ContentResolver {
    pages: Arc<dyn Repository<Page>>,
}

impl ContentResolver {
    pub fn new(pages: Arc<dyn Repository<Page>>) -> Self {
        Self { pages }
    }

    /// Renders `fallback` with the published CMS page of the same slug layered
    /// on top. Backend failures are logged and the fallback is served as is.
    pub async fn resolve(&self, fallback: PageView) -> PageView {
        let pages = match self.pages.list().await {
            Ok(pages) => pages,
            Err(e) => {
                warn!(slug = %fallback.slug, error = %e, "page override unavailable, serving static content");
                return fallback;
            }
        };

        let Some(page) = pages
            .into_iter()
            .find(|p| p.published && p.slug == fallback.slug)
        else {
            debug!(slug = %fallback.slug, "no published override");
            return fallback;
        };

        let mut view = fallback;
        let mut content = view.content;
        merge_content(&mut content, page.content);
        view.content = content;
        if !page.title.trim().is_empty() {
            view.title = page.title;
        }
        view.overridden = true;
        view
    }
}
