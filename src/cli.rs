use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use url::Url;

/// Inspect how booru pages turn into media feeds
#[derive(Parser)]
#[command(name = "booru-lightbox")]
#[command(about = "Scan booru-style gallery pages for media", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the registered site adapters
    Adapters,
    /// Show which adapter handles a URL
    Match {
        url: Url,
    },
    /// Fetch a page and print its media
    Scan {
        url: Url,
        /// Print the feed as JSON
        #[arg(long)]
        json: bool,
        /// Only list the bound elements, skip item resolution
        #[arg(long)]
        no_resolve: bool,
    },
    /// Keep rescanning a page and print each changed feed
    Watch {
        url: Url,
        #[arg(long)]
        json: bool,
    },
    /// Print the previous or next listing page
    #[command(group(ArgGroup::new("direction").required(true).args(["next", "previous"])))]
    Page {
        url: Url,
        #[arg(long)]
        next: bool,
        #[arg(long)]
        previous: bool,
    },
}
