use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{from_permalink, DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::{Field, MediaPayload, MediaReference, MediaType};
use crate::page::Page;

const THUMBNAIL_LINKS: &str =
    ".t-image > :not(figcaption) a, .preview-gallery-container > :not(figcaption) a";

/// FurAffinity galleries only link to submission pages; the full image is
/// read from `#submissionImg` there.
pub struct FurAffinity {
    domains: DomainRule,
}

impl FurAffinity {
    pub fn new(policy: HostMatching) -> Self {
        Self { domains: DomainRule::literals(["furaffinity.net"]).policy(policy) }
    }
}

#[async_trait]
impl SiteAdapter for FurAffinity {
    fn name(&self) -> &'static str {
        "furaffinity"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        let doc = page.document();
        let mut refs = Vec::new();
        for link in doc.select(THUMBNAIL_LINKS)? {
            let Some(submission) = link.url_attr("href") else { continue };
            let fetcher = fetcher.clone();
            let target = submission.clone();
            let src = Field::deferred(move || {
                let fetcher = fetcher.clone();
                let target = target.clone();
                async move {
                    from_permalink(&fetcher, &target, |doc| {
                        doc.select_first("#submissionImg")?
                            .and_then(|img| img.url_attr("src"))
                            .context("submission page has no #submissionImg")
                    })
                    .await
                }
            });
            let payload = MediaPayload::new(src).media_type(MediaType::Image).page_url(submission);
            refs.push(MediaReference::new(link.handle(), payload));
        }
        Ok(refs)
    }
}
