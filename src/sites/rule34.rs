use anyhow::Result;
use async_trait::async_trait;

use super::{permalink_item, DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::MediaReference;
use crate::page::Page;

/// rule34.us. Whether a post is a video is only visible on the post page, so
/// whole items are deferred.
pub struct Rule34 {
    domains: DomainRule,
}

impl Rule34 {
    pub fn new(policy: HostMatching) -> Self {
        Self { domains: DomainRule::literals(["rule34.us"]).policy(policy) }
    }
}

#[async_trait]
impl SiteAdapter for Rule34 {
    fn name(&self) -> &'static str {
        "rule34"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        let doc = page.document();
        let refs = doc
            .select(".thumbail-container > div > a")?
            .into_iter()
            .filter_map(|link| {
                let post = link.url_attr("href")?;
                Some(MediaReference::new(
                    link.handle(),
                    permalink_item(fetcher, post, ".content_push > :first-child"),
                ))
            })
            .collect();
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use crate::sites::testing::{fetcher, page};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn detects_video_posts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("id", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="content_push"><img src="https://img.rule34.us/images/1.png"><p>tags</p></div>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("id", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="content_push"><video controls><source src="https://video.rule34.us/images/2.webm" type="video/webm"></video></div>"#,
            ))
            .mount(&server)
            .await;

        let base = server.uri();
        // The site really spells it "thumbail".
        let listing = format!(
            r#"<div class="thumbail-container">
                 <div><a href="{base}/index.php?r=posts/view&id=1"><img src="t1.jpg"></a></div>
                 <div><a href="{base}/index.php?r=posts/view&id=2"><img src="t2.jpg"></a></div>
               </div>"#
        );
        let p = page("https://rule34.us/index.php?r=posts/index", &listing);
        let refs = Rule34::new(HostMatching::Substring).scan(&p, &fetcher()).await.unwrap();
        assert_eq!(refs.len(), 2);

        let image = refs[0].item.resolve().await.unwrap();
        assert_eq!(image.media_type, Some(MediaType::Image));
        assert_eq!(image.src.as_str(), "https://img.rule34.us/images/1.png");

        let video = refs[1].item.resolve().await.unwrap();
        assert_eq!(video.media_type, Some(MediaType::Video));
        assert_eq!(video.src.as_str(), "https://video.rule34.us/images/2.webm");
        assert_eq!(video.page_url.unwrap().as_str(), format!("{base}/index.php?r=posts/view&id=2"));
    }
}
