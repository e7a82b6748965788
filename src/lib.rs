pub mod config;
pub mod debounce;
pub mod error;
pub mod feed;
pub mod http;
pub mod media;
pub mod page;
pub mod registry;
pub mod sites;
pub mod watch;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::debounce::{Cancelled, DebounceOptions, Debounced};
    pub use crate::feed::{Feed, FeedEntry, ItemState};
    pub use crate::media::{ElementHandle, Field, MediaItem, MediaPayload, MediaReference, MediaType, ResolvedMedia};
    pub use crate::page::Page;
    pub use crate::registry::AdapterRegistry;
    pub use crate::sites::{AdapterCapabilities, DomainRule, HostMatching, SiteAdapter};
    pub use crate::Lightbox;
}

pub use error::Error;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::feed::{resolve_references, Feed};
use crate::http::Fetcher;
use crate::media::MediaReference;
use crate::page::Page;
use crate::registry::AdapterRegistry;
use crate::sites::SiteAdapter;

/// Library entry point. Owns configuration, the HTTP client and the adapter
/// registry; turns page URLs into media feeds.
pub struct Lightbox {
    config: Config,
    fetcher: Fetcher,
    registry: AdapterRegistry,
}

impl Lightbox {
    /// Built-in adapters, filtered and tuned by `config`.
    pub fn new(config: Config) -> Result<Self> {
        let registry = AdapterRegistry::builtin(&config);
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: Config, registry: AdapterRegistry) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self { config, fetcher, registry })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn adapter_for(&self, url: &Url) -> Option<Arc<dyn SiteAdapter>> {
        self.registry.resolve(url)
    }

    pub async fn load_page(&self, url: &Url) -> Result<Page, Error> {
        self.fetcher.load_page(url).await.map_err(Error::Http)
    }

    /// Run `adapter` over `page`. A failing scan is logged and treated as a
    /// page without media. Duplicate element bindings are dropped.
    pub async fn scan(&self, adapter: &dyn SiteAdapter, page: &Page) -> Vec<MediaReference> {
        match self.try_scan(adapter, page).await {
            Ok(refs) => refs,
            Err(e) => {
                warn!(url = %page.url(), error = %e, "scan failed; treating page as empty");
                Vec::new()
            }
        }
    }

    /// Like [`Lightbox::scan`] but surfaces the failure.
    pub async fn try_scan(&self, adapter: &dyn SiteAdapter, page: &Page) -> Result<Vec<MediaReference>, Error> {
        let refs = adapter
            .scan(page, &self.fetcher)
            .await
            .map_err(|source| Error::Scan { adapter: adapter.name(), source })?;
        let mut seen = HashSet::new();
        let total = refs.len();
        let refs: Vec<_> = refs.into_iter().filter(|r| seen.insert(r.element)).collect();
        if refs.len() != total {
            warn!(adapter = adapter.name(), dropped = total - refs.len(), "duplicate element bindings in scan");
        }
        debug!(adapter = adapter.name(), count = refs.len(), "scan finished");
        Ok(refs)
    }

    /// Scan an already loaded page and resolve its items. `None` when no
    /// adapter handles the page.
    pub async fn collect_page(&self, page: &Page) -> Option<Feed> {
        let adapter = self.registry.resolve(page.url())?;
        Some(self.collect_with(adapter.as_ref(), page).await)
    }

    pub(crate) async fn collect_with(&self, adapter: &dyn SiteAdapter, page: &Page) -> Feed {
        let refs = self.scan(adapter, page).await;
        let entries = resolve_references(refs, self.config.resolve_concurrency).await;
        let (previous_page, next_page) = if adapter.capabilities().pagination {
            (adapter.previous_page(page), adapter.next_page(page))
        } else {
            (None, None)
        };
        let feed = Feed {
            adapter: adapter.name(),
            page_url: page.url().clone(),
            entries,
            previous_page,
            next_page,
        };
        info!(adapter = feed.adapter, url = %feed.page_url, items = feed.entries.len(), failed = feed.failed(), "collected feed");
        feed
    }

    /// Resolve the adapter for `url`, load the page and collect its feed.
    /// Pages no adapter handles are not fetched.
    pub async fn collect(&self, url: &Url) -> Result<Option<Feed>, Error> {
        let Some(adapter) = self.adapter_for(url) else {
            debug!(%url, "no adapter for host");
            return Ok(None);
        };
        let page = self.load_page(url).await?;
        Ok(Some(self.collect_with(adapter.as_ref(), &page).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ItemState;
    use crate::media::{ElementHandle, MediaPayload, MediaType};
    use crate::sites::{DomainRule, HostMatching};
    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Emits every `<img>` twice and fails on pages containing "explode".
    struct Sloppy {
        domains: DomainRule,
    }

    #[async_trait]
    impl SiteAdapter for Sloppy {
        fn name(&self) -> &'static str {
            "sloppy"
        }
        fn domains(&self) -> &DomainRule {
            &self.domains
        }
        async fn scan(&self, page: &Page, _fetcher: &Fetcher) -> Result<Vec<MediaReference>> {
            if page.html().contains("explode") {
                anyhow::bail!("unexpected markup");
            }
            let doc = page.document();
            let mut refs = Vec::new();
            for img in doc.select("img")? {
                let Some(src) = img.url_attr("src") else { continue };
                let payload = MediaPayload::new(src).media_type(MediaType::Image);
                refs.push(MediaReference::new(img.handle(), payload.clone()));
                refs.push(MediaReference::new(img.handle(), payload));
            }
            Ok(refs)
        }
    }

    fn lightbox() -> Lightbox {
        let registry = AdapterRegistry::from_adapters(vec![Arc::new(Sloppy {
            domains: DomainRule::literals(["127.0.0.1"]).policy(HostMatching::Substring),
        })]);
        Lightbox::with_registry(Config::default(), registry).unwrap()
    }

    #[tokio::test]
    async fn collect_fetches_scans_and_resolves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gallery"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<img src="/a.png"><p><img src="/b.png"></p><img src="/c.png">"#,
            ))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/gallery", server.uri())).unwrap();
        let feed = lightbox().collect(&url).await.unwrap().unwrap();
        assert_eq!(feed.adapter, "sloppy");
        let srcs: Vec<_> = feed.ready().map(|m| m.src.path().to_string()).collect();
        assert_eq!(srcs, ["/a.png", "/b.png", "/c.png"]);
        let handles: Vec<ElementHandle> = feed.entries.iter().map(|e| e.element).collect();
        assert!(handles.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(feed.failed(), 0);
        assert!(feed.next_page.is_none());
    }

    #[tokio::test]
    async fn unmatched_hosts_are_not_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        // Same server, reached through a host the adapter does not know.
        let port = Url::parse(&server.uri()).unwrap().port().unwrap();
        let url = Url::parse(&format!("http://localhost:{port}/")).unwrap();
        assert!(lightbox().collect(&url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_failure_reads_as_empty_page() {
        let lb = lightbox();
        let page = Page::new(Url::parse("http://127.0.0.1/x").unwrap(), "<p>explode</p>");
        let adapter = lb.adapter_for(page.url()).unwrap();
        assert!(matches!(
            lb.try_scan(adapter.as_ref(), &page).await,
            Err(Error::Scan { adapter: "sloppy", .. })
        ));

        let feed = lb.collect_page(&page).await.unwrap();
        assert!(feed.entries.is_empty());
        assert!(feed.entries.iter().all(|e| !matches!(e.state, ItemState::Failed { .. })));
    }

    #[tokio::test]
    async fn http_errors_surface_from_collect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let url = Url::parse(&server.uri()).unwrap();
        let config = Config { fetch_retries: 0, ..Config::default() };
        let lb = Lightbox::with_registry(config, lightbox().registry().clone()).unwrap();
        assert!(matches!(lb.collect(&url).await, Err(Error::Http(_))));
    }
}
