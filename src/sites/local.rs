use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::{AdapterCapabilities, DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::{MediaPayload, MediaReference, MediaType};
use crate::page::Page;

/// Directory listings of the companion file server on port 8474. Entries
/// appear while uploads progress, hence the short rescan interval.
pub struct LocalFiles {
    domains: DomainRule,
}

impl LocalFiles {
    pub fn new(policy: HostMatching) -> Self {
        Self { domains: DomainRule::literals(["127.0.0.1:8474", "localhost:8474"]).policy(policy) }
    }
}

#[async_trait]
impl SiteAdapter for LocalFiles {
    fn name(&self) -> &'static str {
        "local"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, _fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        let doc = page.document();
        let mut refs = Vec::new();
        for entry in doc.select(r#"[data-mime^="image/"]"#)? {
            let Some(src) = entry.url_attr("href") else { continue };
            let mut payload = MediaPayload::new(src).media_type(MediaType::Image);
            if let Some(name) = entry.attr("data-filename").filter(|n| !n.is_empty()) {
                payload = payload.label(name.to_string());
            }
            refs.push(MediaReference::new(entry.handle(), payload));
        }
        Ok(refs)
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { pagination: false, rescan_interval: Some(Duration::from_millis(500)) }
    }
}
