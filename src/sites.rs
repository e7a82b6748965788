//! Per-site scraping strategies behind one [`SiteAdapter`] shape.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::http::Fetcher;
use crate::media::{MediaItem, MediaPayload, MediaReference, MediaType};
use crate::page::{Document, Element, Page};

mod e621;
mod furaffinity;
mod gelbooru;
mod inkbunny;
mod local;
mod realbooru;
mod rule34;
mod sankaku;
mod yandere;

pub use e621::E621;
pub use furaffinity::FurAffinity;
pub use gelbooru::Gelbooru;
pub use inkbunny::Inkbunny;
pub use local::LocalFiles;
pub use realbooru::Realbooru;
pub use rule34::Rule34;
pub use sankaku::SankakuIdol;
pub use yandere::Yandere;

/// How literal domain entries are compared with a page host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMatching {
    /// Host contains the domain anywhere. `e621.net.evil.com` matches `e621.net`.
    #[default]
    Substring,
    /// Host equals the domain or is a subdomain of it.
    Suffix,
    /// Host equals the domain.
    Exact,
}

#[derive(Debug, Clone)]
pub enum DomainPattern {
    Literal(String),
    Pattern(Regex),
}

impl DomainPattern {
    fn matches(&self, host: &str, policy: HostMatching) -> bool {
        match self {
            DomainPattern::Pattern(re) => re.is_match(host),
            DomainPattern::Literal(domain) => match policy {
                HostMatching::Substring => host.contains(domain.as_str()),
                HostMatching::Exact => host == domain,
                HostMatching::Suffix => {
                    host == domain
                        || host.strip_suffix(domain.as_str()).is_some_and(|rest| rest.ends_with('.'))
                }
            },
        }
    }
}

impl fmt::Display for DomainPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainPattern::Literal(d) => f.write_str(d),
            DomainPattern::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Domains an adapter applies to. Any entry matching is enough.
#[derive(Debug, Clone)]
pub struct DomainRule {
    patterns: Vec<DomainPattern>,
    policy: HostMatching,
}

impl DomainRule {
    pub fn literals<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: domains.into_iter().map(|d| DomainPattern::Literal(d.into())).collect(),
            policy: HostMatching::default(),
        }
    }

    pub fn pattern(re: Regex) -> Self {
        Self { patterns: vec![DomainPattern::Pattern(re)], policy: HostMatching::default() }
    }

    pub fn with(mut self, pattern: DomainPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn policy(mut self, policy: HostMatching) -> Self {
        self.policy = policy;
        self
    }

    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.patterns.iter().any(|p| p.matches(&host, self.policy))
    }

    pub fn patterns(&self) -> &[DomainPattern] {
        &self.patterns
    }
}

impl fmt::Display for DomainRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.patterns.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Optional behavior an adapter supports, declared up front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterCapabilities {
    /// `previous_page` / `next_page` read pagination controls.
    pub pagination: bool,
    /// Content loads progressively; rescan on this cadence.
    pub rescan_interval: Option<Duration>,
}

#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Stable identifier, used in config and logs.
    fn name(&self) -> &'static str;

    fn domains(&self) -> &DomainRule;

    /// `host` is `host[:port]` of the page.
    fn matches(&self, host: &str) -> bool {
        self.domains().matches(host)
    }

    /// Collect media references from the page in document order. Finding
    /// nothing is an empty vector, not an error. Secondary fetches belong in
    /// deferred fields, not here.
    async fn scan(&self, page: &Page, fetcher: &Fetcher) -> Result<Vec<MediaReference>>;

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    fn previous_page(&self, _page: &Page) -> Option<Url> {
        None
    }

    fn next_page(&self, _page: &Page) -> Option<Url> {
        None
    }
}

/// Built-in adapters in precedence order, before `disabled_adapters` is
/// applied.
pub(crate) fn builtin(config: &Config) -> Vec<Arc<dyn SiteAdapter>> {
    let policy = config.host_matching;
    vec![
        Arc::new(E621::new(policy)),
        Arc::new(FurAffinity::new(policy)),
        Arc::new(Gelbooru::new(policy, config.gelbooru_api_key.clone())),
        Arc::new(Inkbunny::new(policy)),
        Arc::new(Rule34::new(policy)),
        Arc::new(LocalFiles::new(policy)),
        Arc::new(SankakuIdol::new(policy)),
        Arc::new(Realbooru::new(policy)),
        Arc::new(Yandere::new(policy)),
    ]
}

/// Fetch a post's permalink page and pull something out of it.
pub(crate) async fn from_permalink<T, F>(fetcher: &Fetcher, url: &Url, extract: F) -> Result<T>
where
    F: FnOnce(&Document) -> Result<T>,
{
    let page = fetcher.load_page(url).await?;
    extract(&page.document())
}

/// Item whose source and type are only known once the permalink page has been
/// fetched; `css` selects the `<img>` or `<video>` there.
pub(crate) fn permalink_item(fetcher: &Fetcher, permalink: Url, css: &'static str) -> MediaItem {
    let fetcher = fetcher.clone();
    MediaItem::deferred(move || {
        let fetcher = fetcher.clone();
        let permalink = permalink.clone();
        async move {
            let (src, media_type) = from_permalink(&fetcher, &permalink, |doc| {
                doc.select_first(css)?
                    .as_ref()
                    .and_then(media_from_element)
                    .with_context(|| format!("no media at `{css}`"))
            })
            .await?;
            Ok::<_, anyhow::Error>(MediaPayload::new(src).media_type(media_type).page_url(permalink))
        }
    })
}

/// Image/video element found on a permalink page.
pub(crate) fn media_from_element(el: &Element<'_>) -> Option<(Url, MediaType)> {
    if el.name() == "video" {
        let src = el
            .select_first("source")
            .ok()
            .flatten()
            .and_then(|s| s.url_attr("src"))
            .or_else(|| el.url_attr("src"))?;
        Some((src, MediaType::Video))
    } else {
        Some((el.url_attr("src")?, MediaType::Image))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::media::ResolvedMedia;

    pub fn page(url: &str, html: &str) -> Page {
        Page::new(Url::parse(url).unwrap(), html)
    }

    pub fn fetcher() -> Fetcher {
        let config = Config { fetch_retries: 0, ..Config::default() };
        Fetcher::new(&config).unwrap()
    }

    pub async fn resolve_all(refs: &[MediaReference]) -> Vec<ResolvedMedia> {
        let mut out = Vec::new();
        for r in refs {
            out.push(r.item.resolve().await.unwrap());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_list_matches_any_entry() {
        let rule = DomainRule::literals(["e621.net", "e926.net"]);
        assert!(rule.matches("e621.net"));
        assert!(rule.matches("e926.net"));
        assert!(rule.matches("sub.e621.net"));
        assert!(!rule.matches("notbooru.com"));
    }

    #[test]
    fn substring_policy_is_permissive() {
        let rule = DomainRule::literals(["e621.net"]);
        assert!(rule.matches("e621.net.evil.com"));
        assert!(rule.matches("E621.NET"));
    }

    #[test]
    fn suffix_and_exact_policies() {
        let suffix = DomainRule::literals(["e621.net"]).policy(HostMatching::Suffix);
        assert!(suffix.matches("e621.net"));
        assert!(suffix.matches("static1.e621.net"));
        assert!(!suffix.matches("e621.net.evil.com"));
        assert!(!suffix.matches("note621.net"));

        let exact = DomainRule::literals(["e621.net"]).policy(HostMatching::Exact);
        assert!(exact.matches("e621.net"));
        assert!(!exact.matches("static1.e621.net"));
    }

    #[test]
    fn regex_patterns_ignore_policy() {
        let rule = DomainRule::pattern(Regex::new(r"^(www\.)?gelbooru\.(com|us)$").unwrap())
            .with(DomainPattern::Literal("safebooru.org".into()))
            .policy(HostMatching::Exact);
        assert!(rule.matches("gelbooru.us"));
        assert!(rule.matches("www.gelbooru.com"));
        assert!(rule.matches("safebooru.org"));
        assert!(!rule.matches("gelbooru.com.evil"));
        assert_eq!(rule.to_string(), r"/^(www\.)?gelbooru\.(com|us)$/, safebooru.org");
    }

    #[test]
    fn builtin_order_is_stable() {
        let names: Vec<_> = builtin(&Config::default()).iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            ["e621", "furaffinity", "gelbooru", "inkbunny", "rule34", "local", "sankaku", "realbooru", "yandere"]
        );
    }
}
