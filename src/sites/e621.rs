use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{AdapterCapabilities, DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::{MediaPayload, MediaReference, MediaType};
use crate::page::{Element, Page};

/// e621 / e926. Thumbnails carry the full file URL, so nothing is deferred.
pub struct E621 {
    domains: DomainRule,
}

impl E621 {
    pub fn new(policy: HostMatching) -> Self {
        Self { domains: DomainRule::literals(["e621.net", "e926.net"]).policy(policy) }
    }
}

#[async_trait]
impl SiteAdapter for E621 {
    fn name(&self) -> &'static str {
        "e621"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, _fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        scan_thumbnails(page)
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { pagination: true, rescan_interval: None }
    }

    fn previous_page(&self, page: &Page) -> Option<Url> {
        page.document().link("#paginator-prev", "href")
    }

    fn next_page(&self, page: &Page) -> Option<Url> {
        page.document().link("#paginator-next", "href")
    }
}

fn scan_thumbnails(page: &Page) -> Result<Vec<MediaReference>> {
    let doc = page.document();
    let mut refs = Vec::new();
    for el in doc.select("article.thumbnail")? {
        match thumbnail_payload(&el)? {
            Some(payload) => refs.push(MediaReference::new(el.handle(), payload)),
            None => debug!(handle = ?el.handle(), "e621 thumbnail without file url, skipping"),
        }
    }
    Ok(refs)
}

fn thumbnail_payload(el: &Element<'_>) -> Result<Option<MediaPayload>> {
    let Some(page_url) = el.select_first("a")?.and_then(|a| a.url_attr("href")) else {
        return Ok(None);
    };
    let (src, media_type) = match el.attr("data-file-ext") {
        // Flash posts only have a preview image to show.
        Some("swf") => (el.select_first("img")?.and_then(|img| img.url_attr("src")), MediaType::Image),
        Some("webm") | Some("mp4") => (el.url_attr("data-file-url"), MediaType::Video),
        _ => (el.url_attr("data-file-url"), MediaType::Image),
    };
    Ok(src.map(|src| MediaPayload::new(src).media_type(media_type).page_url(page_url)))
}
