mod cli;

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use booru_lightbox::config::Config;
use booru_lightbox::feed::{Feed, ItemState};
use booru_lightbox::watch::Watcher;
use booru_lightbox::Lightbox;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booru_lightbox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let lightbox = Lightbox::new(config)?;

    match cli.command {
        Commands::Adapters => {
            for adapter in lightbox.registry().iter() {
                let caps = adapter.capabilities();
                let rescan = caps
                    .rescan_interval
                    .map(|d| format!("{}ms", d.as_millis()))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<12} {:<40} rescan={:<7} pagination={}",
                    adapter.name(),
                    adapter.domains().to_string(),
                    rescan,
                    caps.pagination
                );
            }
        }
        Commands::Match { url } => match lightbox.adapter_for(&url) {
            Some(adapter) => println!("{}", adapter.name()),
            None => println!("no adapter for {}", url),
        },
        Commands::Scan { url, json, no_resolve } => {
            let Some(adapter) = lightbox.adapter_for(&url) else {
                bail!("no adapter for {url}");
            };
            if no_resolve {
                let page = lightbox.load_page(&url).await?;
                let refs = lightbox.scan(adapter.as_ref(), &page).await;
                for r in &refs {
                    let kind = if r.item.is_deferred() { "deferred" } else { "ready" };
                    println!("element {:>6}  {}", r.element.index(), kind);
                }
                println!("{} item(s)", refs.len());
            } else if let Some(feed) = lightbox.collect(&url).await? {
                print_feed(&feed, json)?;
            }
        }
        Commands::Watch { url, json } => {
            let Some(mut watcher) = Watcher::spawn(Arc::new(lightbox), url.clone()) else {
                bail!("no adapter for {url}");
            };
            loop {
                tokio::select! {
                    feed = watcher.next() => match feed {
                        Some(feed) => print_feed(&feed, json)?,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("interrupted, stopping watcher");
                        break;
                    }
                }
            }
            watcher.stop();
        }
        Commands::Page { url, next, previous: _ } => {
            let Some(adapter) = lightbox.adapter_for(&url) else {
                bail!("no adapter for {url}");
            };
            if !adapter.capabilities().pagination {
                bail!("adapter `{}` does not paginate", adapter.name());
            }
            let page = lightbox.load_page(&url).await?;
            let target: Option<Url> = if next {
                adapter.next_page(&page)
            } else {
                adapter.previous_page(&page)
            };
            match target {
                Some(target) => println!("{target}"),
                None => println!("no {} page", if next { "next" } else { "previous" }),
            }
        }
    }
    Ok(())
}

fn print_feed(feed: &Feed, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(feed)?);
        return Ok(());
    }
    println!("{} via {}", feed.page_url, feed.adapter);
    for entry in &feed.entries {
        match &entry.state {
            ItemState::Ready(media) => {
                let kind = media.media_type.map(|t| t.to_string()).unwrap_or_else(|| "?".into());
                println!("  [{:>6}] {:<5} {}", entry.element.index(), kind, media.src);
                if let Some(label) = &media.label {
                    println!("           {label}");
                }
            }
            ItemState::Failed { error } => {
                println!("  [{:>6}] failed: {error}", entry.element.index());
            }
        }
    }
    if let Some(prev) = &feed.previous_page {
        println!("previous: {prev}");
    }
    if let Some(next) = &feed.next_page {
        println!("next: {next}");
    }
    println!("{} ready, {} failed", feed.entries.len() - feed.failed(), feed.failed());
    Ok(())
}
