use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

use crate::debounce::{DebounceOptions, Debounced};
use crate::feed::Feed;
use crate::sites::SiteAdapter;
use crate::Lightbox;

const FEED_BUFFER: usize = 16;

/// The only sender of a watcher's feed channel. Emptied on stop so the
/// receiver sees the channel close.
type FeedSlot = Arc<std::sync::Mutex<Option<mpsc::Sender<Feed>>>>;

/// Keeps one page under observation. Rescans run on the adapter's cadence
/// (or the configured poll interval) and on demand; both go through one
/// debouncer so bursts collapse into a single fetch.
pub struct Watcher {
    feeds: mpsc::Receiver<Feed>,
    rescan: Debounced<(), ()>,
    ticker: JoinHandle<()>,
    sender: FeedSlot,
}

impl Watcher {
    /// Start watching `url`. `None` when no adapter handles it.
    pub fn spawn(lightbox: Arc<Lightbox>, url: Url) -> Option<Self> {
        let adapter = lightbox.adapter_for(&url)?;
        let period = adapter
            .capabilities()
            .rescan_interval
            .unwrap_or_else(|| lightbox.config().poll_interval());
        let delay = lightbox.config().rescan_debounce();
        let (tx, feeds) = mpsc::channel(FEED_BUFFER);

        let sender: FeedSlot = Arc::new(std::sync::Mutex::new(Some(tx)));

        let rescan = rescan_fn(lightbox, adapter, url.clone(), sender.clone(), delay);
        let ticker = tokio::spawn(tick(rescan.clone(), period));
        info!(%url, period_ms = period.as_millis() as u64, "watching page");
        Some(Self { feeds, rescan, ticker, sender })
    }

    /// Wait for the next feed. `None` once the watcher is stopped and every
    /// buffered feed was consumed.
    pub async fn next(&mut self) -> Option<Feed> {
        self.feeds.recv().await
    }

    /// Request a rescan outside the regular cadence. No-op once stopped.
    pub fn trigger(&self) {
        if self.is_stopped() {
            return;
        }
        let rescan = self.rescan.clone();
        tokio::spawn(async move {
            let _ = rescan.call(()).await;
        });
    }

    /// Stop ticking, drop any pending rescan and close the feed channel. A
    /// fetch already in flight still completes but its feed is discarded.
    pub fn stop(&self) {
        self.ticker.abort();
        self.rescan.cancel();
        if self.sender.lock().unwrap().take().is_some() {
            debug!("watcher stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.sender.lock().unwrap().is_none()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick(rescan: Debounced<(), ()>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let _ = rescan.call(()).await;
    }
}

fn rescan_fn(
    lightbox: Arc<Lightbox>,
    adapter: Arc<dyn SiteAdapter>,
    url: Url,
    sender: FeedSlot,
    delay: Duration,
) -> Debounced<(), ()> {
    let last_html: Arc<Mutex<Option<String>>> = Arc::default();
    let options = DebounceOptions { max_wait: Some(delay * 4), reject_on_cancel: false };
    Debounced::with_options(
        move |()| {
            let lightbox = lightbox.clone();
            let adapter = adapter.clone();
            let url = url.clone();
            let sender = sender.clone();
            let last_html = last_html.clone();
            async move {
                let stopped = sender.lock().unwrap().is_none();
                if stopped {
                    return;
                }
                let page = match lightbox.load_page(&url).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(%url, error = %e, "rescan fetch failed");
                        return;
                    }
                };
                {
                    let mut last = last_html.lock().await;
                    if last.as_deref() == Some(page.html()) {
                        debug!(%url, "page unchanged");
                        return;
                    }
                    *last = Some(page.html().to_string());
                }
                let feed = lightbox.collect_with(adapter.as_ref(), &page).await;
                let tx = sender.lock().unwrap().clone();
                let Some(tx) = tx else {
                    debug!(%url, "watcher stopped during rescan");
                    return;
                };
                if tx.send(feed).await.is_err() {
                    debug!(%url, "feed receiver gone");
                }
            }
        },
        delay,
        options,
    )
}
