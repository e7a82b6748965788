use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{AdapterCapabilities, DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::{MediaPayload, MediaReference, MediaType};
use crate::page::Page;

/// yande.re post lists expose a direct file link per post.
pub struct Yandere {
    domains: DomainRule,
}

impl Yandere {
    pub fn new(policy: HostMatching) -> Self {
        Self { domains: DomainRule::literals(["yande.re"]).policy(policy) }
    }
}

#[async_trait]
impl SiteAdapter for Yandere {
    fn name(&self) -> &'static str {
        "yandere"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, _fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        let doc = page.document();
        let mut refs = Vec::new();
        for post in doc.select("#post-list-posts li")? {
            // The thumbnail anchor is the element the viewer attaches to.
            let Some(thumb) = post.select_first(".inner .thumb")? else { continue };
            let file = post.select_first(".directlink")?.and_then(|a| a.url_attr("href"));
            let (Some(src), Some(page_url)) = (file, thumb.url_attr("href")) else {
                debug!(handle = ?thumb.handle(), "yande.re post without direct link, skipping");
                continue;
            };
            let payload = MediaPayload::new(src).media_type(MediaType::Image).page_url(page_url);
            refs.push(MediaReference::new(thumb.handle(), payload));
        }
        Ok(refs)
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { pagination: true, rescan_interval: None }
    }

    fn previous_page(&self, page: &Page) -> Option<Url> {
        page.document().link(".previous_page", "href")
    }

    fn next_page(&self, page: &Page) -> Option<Url> {
        page.document().link(".next_page", "href")
    }
}
