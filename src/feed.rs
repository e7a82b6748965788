use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::media::{ElementHandle, MediaReference, ResolvedMedia};

/// Per-item view state handed to the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    Ready(ResolvedMedia),
    Failed { error: String },
}

impl ItemState {
    pub fn media(&self) -> Option<&ResolvedMedia> {
        match self {
            ItemState::Ready(m) => Some(m),
            ItemState::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub element: ElementHandle,
    #[serde(flatten)]
    pub state: ItemState,
}

/// Everything collected from one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub adapter: &'static str,
    pub page_url: Url,
    pub entries: Vec<FeedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<Url>,
}

impl Feed {
    pub fn ready(&self) -> impl Iterator<Item = &ResolvedMedia> {
        self.entries.iter().filter_map(|e| e.state.media())
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.state, ItemState::Failed { .. })).count()
    }
}

/// Resolve each reference on its own, at most `concurrency` at a time. Output
/// keeps input order; a failing item becomes [`ItemState::Failed`] and does
/// not affect the others.
pub async fn resolve_references(refs: Vec<MediaReference>, concurrency: usize) -> Vec<FeedEntry> {
    stream::iter(refs)
        .map(|r| async move {
            let state = match r.item.resolve().await {
                Ok(media) => ItemState::Ready(media),
                Err(e) => {
                    debug!(element = r.element.index(), error = %e, "item failed to resolve");
                    ItemState::Failed { error: format!("{e:#}") }
                }
            };
            FeedEntry { element: r.element, state }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
