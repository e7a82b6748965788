use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use super::{permalink_item, AdapterCapabilities, DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::MediaReference;
use crate::page::Page;

/// idol.sankakucomplex.com. Listings load progressively on scroll.
pub struct SankakuIdol {
    domains: DomainRule,
}

impl SankakuIdol {
    pub fn new(policy: HostMatching) -> Self {
        Self { domains: DomainRule::literals(["idol.sankakucomplex.com"]).policy(policy) }
    }
}

#[async_trait]
impl SiteAdapter for SankakuIdol {
    fn name(&self) -> &'static str {
        "sankaku"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        let doc = page.document();
        let mut refs = Vec::new();
        for link in doc.select(".post-preview-link")? {
            if let Some(post) = link.url_attr("href") {
                refs.push(MediaReference::new(link.handle(), permalink_item(fetcher, post, "#image")));
            }
        }
        Ok(refs)
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { pagination: true, rescan_interval: Some(Duration::from_secs(1)) }
    }

    fn previous_page(&self, page: &Page) -> Option<Url> {
        page.document().link(".pagination .previous_page", "href")
    }

    fn next_page(&self, page: &Page) -> Option<Url> {
        page.document().link(".pagination .next_page", "href")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use crate::sites::testing::{fetcher, page};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn post_page_decides_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post/show/77"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<video id="image" autoplay><source src="//v.sankakucomplex.com/data/77.mp4"></video>"#,
            ))
            .mount(&server)
            .await;

        let listing = format!(
            r#"<div class="content"><a class="post-preview-link" href="{}/post/show/77"><img src="p.jpg"></a></div>
               <div class="pagination"><a class="next_page" href="/?page=2">Next</a></div>"#,
            server.uri()
        );
        let p = page("https://idol.sankakucomplex.com/?tags=x", &listing);
        let adapter = SankakuIdol::new(HostMatching::Substring);
        let refs = adapter.scan(&p, &fetcher()).await.unwrap();
        assert_eq!(refs.len(), 1);

        let media = refs[0].item.resolve().await.unwrap();
        assert_eq!(media.media_type, Some(MediaType::Video));
        assert_eq!(media.src.as_str(), "http://v.sankakucomplex.com/data/77.mp4");

        assert_eq!(adapter.next_page(&p).unwrap().as_str(), "https://idol.sankakucomplex.com/?page=2");
        assert!(adapter.previous_page(&p).is_none());
    }

    #[tokio::test]
    async fn missing_media_fails_only_that_item() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>rate limited</p>"))
            .mount(&server)
            .await;

        let listing = format!(r#"<a class="post-preview-link" href="{}/post/show/1"></a>"#, server.uri());
        let p = page("https://idol.sankakucomplex.com/", &listing);
        let refs = SankakuIdol::new(HostMatching::Substring).scan(&p, &fetcher()).await.unwrap();
        let err = refs[0].item.resolve().await.unwrap_err();
        assert!(matches!(err, crate::Error::FieldResolution { field: "item", .. }));
    }
}
