use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Image => f.write_str("image"),
            MediaType::Video => f.write_str("video"),
        }
    }
}

/// Position of an element in document order within one parsed page.
///
/// Only meaningful for the scan pass that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub(crate) usize);

impl ElementHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

type Resolver<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// A value that is either known at scan time or fetched on demand.
pub enum Field<T> {
    Literal(T),
    Deferred(Resolver<T>),
}

impl<T> Field<T>
where
    T: Clone + Send + 'static,
{
    pub fn deferred<F, Fut>(resolver: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Field::Deferred(Arc::new(move || resolver().boxed()))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Field::Deferred(_))
    }

    /// Literal values are cloned; deferred ones run their resolver again on
    /// every call.
    pub async fn resolve(&self) -> anyhow::Result<T> {
        match self {
            Field::Literal(v) => Ok(v.clone()),
            Field::Deferred(f) => f().await,
        }
    }
}

impl<T: Clone> Clone for Field<T> {
    fn clone(&self) -> Self {
        match self {
            Field::Literal(v) => Field::Literal(v.clone()),
            Field::Deferred(f) => Field::Deferred(f.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Field::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Literal(value)
    }
}

/// Unresolved media description as produced by a scan.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub src: Field<Url>,
    pub label: Option<Field<String>>,
    pub media_type: Option<Field<MediaType>>,
    pub page_url: Option<Field<Url>>,
}

impl MediaPayload {
    pub fn new(src: impl Into<Field<Url>>) -> Self {
        Self { src: src.into(), label: None, media_type: None, page_url: None }
    }

    pub fn label(mut self, label: impl Into<Field<String>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn media_type(mut self, media_type: impl Into<Field<MediaType>>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn page_url(mut self, page_url: impl Into<Field<Url>>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    /// Resolve every field concurrently. The first failing field fails the
    /// whole payload.
    pub async fn resolve(&self) -> Result<ResolvedMedia> {
        let (src, label, media_type, page_url) = futures::try_join!(
            async { self.src.resolve().await.map_err(Error::field("src")) },
            resolve_optional(self.label.as_ref(), "label"),
            resolve_optional(self.media_type.as_ref(), "type"),
            resolve_optional(self.page_url.as_ref(), "page_url"),
        )?;
        Ok(ResolvedMedia { src, label, media_type, page_url })
    }
}

async fn resolve_optional<T>(field: Option<&Field<T>>, name: &'static str) -> Result<Option<T>>
where
    T: Clone + Send + 'static,
{
    match field {
        Some(f) => f.resolve().await.map(Some).map_err(Error::field(name)),
        None => Ok(None),
    }
}

type PayloadResolver = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<MediaPayload>> + Send + Sync>;

/// Either a payload known at scan time or one that needs a secondary fetch
/// before even its shape is known.
#[derive(Clone)]
pub enum MediaItem {
    Ready(MediaPayload),
    Deferred(PayloadResolver),
}

impl MediaItem {
    pub fn deferred<F, Fut>(resolver: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<MediaPayload>> + Send + 'static,
    {
        MediaItem::Deferred(Arc::new(move || resolver().boxed()))
    }

    /// Whether resolving the item's source needs more than the scanned page.
    pub fn is_deferred(&self) -> bool {
        match self {
            MediaItem::Ready(p) => p.src.is_deferred(),
            MediaItem::Deferred(_) => true,
        }
    }

    pub async fn payload(&self) -> Result<MediaPayload> {
        match self {
            MediaItem::Ready(p) => Ok(p.clone()),
            MediaItem::Deferred(f) => f().await.map_err(Error::field("item")),
        }
    }

    pub async fn resolve(&self) -> Result<ResolvedMedia> {
        self.payload().await?.resolve().await
    }
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaItem::Ready(p) => f.debug_tuple("Ready").field(p).finish(),
            MediaItem::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<MediaPayload> for MediaItem {
    fn from(payload: MediaPayload) -> Self {
        MediaItem::Ready(payload)
    }
}

/// One discovered media unit and the element it was found on.
#[derive(Debug, Clone)]
pub struct MediaReference {
    pub element: ElementHandle,
    pub item: MediaItem,
}

impl MediaReference {
    pub fn new(element: ElementHandle, item: impl Into<MediaItem>) -> Self {
        Self { element, item: item.into() }
    }
}

/// Fully evaluated media record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub src: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<Url>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn literal_payload_resolves_as_is() {
        let payload = MediaPayload::new(url("https://static.example/a.png"))
            .media_type(MediaType::Image)
            .page_url(url("https://example/posts/1"));
        let resolved = payload.resolve().await.unwrap();
        assert_eq!(resolved.src.as_str(), "https://static.example/a.png");
        assert_eq!(resolved.media_type, Some(MediaType::Image));
        assert_eq!(resolved.label, None);
        assert_eq!(resolved.page_url, Some(url("https://example/posts/1")));
    }

    #[tokio::test]
    async fn deferred_fields_run_on_each_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let payload = MediaPayload::new(Field::<Url>::deferred(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(Url::parse("https://static.example/b.webm")?)
            }
        }))
        .media_type(Field::<MediaType>::deferred(|| async { Ok::<_, anyhow::Error>(MediaType::Video) }))
        .label("b.webm".to_string());

        let first = payload.resolve().await.unwrap();
        let second = payload.resolve().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.media_type, Some(MediaType::Video));
        assert_eq!(first.label.as_deref(), Some("b.webm"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_src_fails_whole_payload() {
        let payload = MediaPayload::new(Field::<Url>::deferred(|| async {
            Err::<Url, _>(anyhow::anyhow!("permalink page had no image"))
        }))
        .media_type(MediaType::Image);

        let err = payload.resolve().await.unwrap_err();
        match err {
            Error::FieldResolution { field, .. } => assert_eq!(field, "src"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn deferred_item_resolves_payload_first() {
        let item = MediaItem::deferred(|| async {
            let src = Url::parse("https://static.example/c.mp4")?;
            Ok::<_, anyhow::Error>(MediaPayload::new(src).media_type(MediaType::Video))
        });
        let resolved = item.resolve().await.unwrap();
        assert_eq!(resolved.media_type, Some(MediaType::Video));

        let broken = MediaItem::deferred(|| async { Err::<MediaPayload, _>(anyhow::anyhow!("404")) });
        assert!(matches!(
            broken.resolve().await,
            Err(Error::FieldResolution { field: "item", .. })
        ));
    }

    #[test]
    fn resolved_media_serializes_like_the_ui_expects() {
        let media = ResolvedMedia {
            src: url("https://static.example/a.png"),
            label: None,
            media_type: Some(MediaType::Image),
            page_url: None,
        };
        let json = serde_json::to_value(&media).unwrap();
        assert_eq!(json, serde_json::json!({ "src": "https://static.example/a.png", "type": "image" }));
    }
}
