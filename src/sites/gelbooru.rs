use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{DomainRule, HostMatching, SiteAdapter};
use crate::http::Fetcher;
use crate::media::{Field, MediaPayload, MediaReference, MediaType};
use crate::page::Page;

const API_BASE: &str = "https://gelbooru.com/index.php";

/// Gelbooru listings link to posts by id (`p<id>`); the file URL comes from
/// the JSON API.
pub struct Gelbooru {
    domains: DomainRule,
    api_base: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    post: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    file_url: String,
}

impl Gelbooru {
    /// `api_key` is appended as-is to API queries (`&api_key=..&user_id=..`).
    pub fn new(policy: HostMatching, api_key: Option<String>) -> Self {
        Self {
            domains: DomainRule::literals(["gelbooru.com"]).policy(policy),
            api_base: API_BASE.to_string(),
            api_key,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn post_api_url(&self, post_id: &str) -> Result<Url> {
        let query = format!(
            "page=dapi&s=post&q=index&json=1&id={post_id}{}",
            self.api_key.as_deref().unwrap_or_default()
        );
        let mut url = Url::parse(&self.api_base).context("bad gelbooru API base")?;
        url.set_query(Some(&query));
        Ok(url)
    }
}

async fn file_url(fetcher: &Fetcher, api: &Url) -> Result<Url> {
    let body: PostsResponse = fetcher.get_json(api).await?;
    let post = body.post.into_iter().next().context("API returned no post")?;
    Url::parse(&post.file_url).with_context(|| format!("bad file_url {:?}", post.file_url))
}

#[async_trait]
impl SiteAdapter for Gelbooru {
    fn name(&self) -> &'static str {
        "gelbooru"
    }

    fn domains(&self) -> &DomainRule {
        &self.domains
    }

    async fn scan(&self, page: &Page, fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
        let doc = page.document();
        let mut refs = Vec::new();
        for link in doc.select(".thumbnail-preview a")? {
            let post_id = link.attr("id").and_then(|id| id.get(1..)).filter(|id| !id.is_empty());
            let (Some(post_id), Some(page_url)) = (post_id, link.url_attr("href")) else {
                debug!(handle = ?link.handle(), "gelbooru thumbnail without post id, skipping");
                continue;
            };
            let api = self.post_api_url(post_id)?;
            let fetcher = fetcher.clone();
            let src = Field::deferred(move || {
                let fetcher = fetcher.clone();
                let api = api.clone();
                async move { file_url(&fetcher, &api).await }
            });
            let payload = MediaPayload::new(src).media_type(MediaType::Image).page_url(page_url);
            refs.push(MediaReference::new(link.handle(), payload));
        }
        Ok(refs)
    }
}
