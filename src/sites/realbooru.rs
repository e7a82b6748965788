use anyhow::{bail, Result};
use async_trait::async_trait;
use url::Url;

use super::{from_permalink, AdapterCapabilities, DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::{MediaItem, MediaPayload, MediaReference, MediaType};
use crate::page::{Document, Page};

pub struct Realbooru {
    domains: DomainRule,
}

impl Realbooru {
    pub fn new(policy: HostMatching) -> Self {
        Self { domains: DomainRule::literals(["realbooru.com"]).policy(policy) }
    }
}

/// Post pages show either `#image` or a `#gelcomVideoPlayer`.
fn post_media(doc: &Document) -> Result<(Url, MediaType)> {
    if let Some(img) = doc.select_first("#image")? {
        if let Some(src) = img.url_attr("src") {
            return Ok((src, MediaType::Image));
        }
    }
    if let Some(source) = doc.select_first("#gelcomVideoPlayer source")? {
        if let Some(src) = source.url_attr("src") {
            return Ok((src, MediaType::Video));
        }
    }
    bail!("post page has neither #image nor a video player")
}

fn post_item(fetcher: &Fetcher, post: Url) -> MediaItem {
    let fetcher = fetcher.clone();
    MediaItem::deferred(move || {
        let fetcher = fetcher.clone();
        let post = post.clone();
        async move {
            let (src, media_type) = from_permalink(&fetcher, &post, post_media).await?;
            Ok::<_, anyhow::Error>(MediaPayload::new(src).media_type(media_type).page_url(post))
        }
    })
}

#[async_trait]
impl SiteAdapter for Realbooru {
    fn name(&self) -> &'static str {
        "realbooru"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        let doc = page.document();
        let mut refs = Vec::new();
        for link in doc.select(".items .col.thumb a")? {
            if let Some(post) = link.url_attr("href") {
                refs.push(MediaReference::new(link.handle(), post_item(fetcher, post)));
            }
        }
        Ok(refs)
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { pagination: true, rescan_interval: None }
    }

    // Realbooru's paginator arrows carry swapped alt texts.
    fn previous_page(&self, page: &Page) -> Option<Url> {
        page.document().link("#paginator [alt=next]", "href")
    }

    fn next_page(&self, page: &Page) -> Option<Url> {
        page.document().link("#paginator [alt=back]", "href")
    }
}
