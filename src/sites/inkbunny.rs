use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{from_permalink, DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::{Field, MediaPayload, MediaReference, MediaType};
use crate::page::Page;

pub struct Inkbunny {
    domains: DomainRule,
}

impl Inkbunny {
    pub fn new(policy: HostMatching) -> Self {
        Self { domains: DomainRule::literals(["inkbunny.net"]).policy(policy) }
    }
}

#[async_trait]
impl SiteAdapter for Inkbunny {
    fn name(&self) -> &'static str {
        "inkbunny"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        let doc = page.document();
        let mut refs = Vec::new();
        for link in doc.select(".widget_imageFromSubmission > a")? {
            let Some(submission) = link.url_attr("href") else { continue };
            let fetcher = fetcher.clone();
            let target = submission.clone();
            // The magicbox link on the submission page points at the full-size file.
            let src = Field::deferred(move || {
                let fetcher = fetcher.clone();
                let target = target.clone();
                async move {
                    from_permalink(&fetcher, &target, |doc| {
                        doc.select_first(".content.magicboxParent > a")?
                            .and_then(|a| a.url_attr("href"))
                            .context("submission page has no full-size link")
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
