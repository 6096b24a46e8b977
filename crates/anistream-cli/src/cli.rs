use anistream_core::StreamCategory;
use clap::{Args, Parser, Subcommand};

/// Resolve anime catalog entries, episodes and stream sources
#[derive(Parser)]
#[command(name = "anistream")]
#[command(about = "Search anime sites and resolve playable streams", long_about = None)]
pub struct Cli {
    /// Provider to query
    #[arg(short, long, global = true, default_value = "animeowl")]
    pub provider: String,

    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags that override the `ANISTREAM_*` environment configuration
#[derive(Args)]
pub struct Settings {
    /// Cookie service endpoint
    #[arg(long, global = true)]
    pub cookie_api_url: Option<String>,

    /// Cookie service API key
    #[arg(long, global = true)]
    pub cookie_api_key: Option<String>,

    /// AnimeOwl mirror
    #[arg(long, global = true)]
    pub animeowl_url: Option<String>,

    /// AnimePahe mirror
    #[arg(long, global = true)]
    pub animepahe_url: Option<String>,

    /// Replacement deobfuscator script
    #[arg(long, global = true)]
    pub deobfuscator: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search the provider's catalog
    Search {
        /// Query to search for
        query: String,
        /// 1-based result page
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show a title with its merged episode list
    Info {
        /// Catalog id from `search`
        id: String,
    },
    /// List the servers offering an episode
    Servers {
        /// Episode id from `info`
        episode_id: String,
        /// Audio track (sub or dub)
        #[arg(short, long, default_value = "sub")]
        category: StreamCategory,
    },
    /// Resolve playable sources for an episode
    Sources {
        /// Episode id from `info`, or an already resolved server URL
        episode_id: String,
        /// Server name; defaults to the provider's primary backend
        #[arg(short, long)]
        server: Option<String>,
        /// Audio track (sub or dub)
        #[arg(short, long, default_value = "sub")]
        category: StreamCategory,
    },
    /// Resolve sources for every episode of a title, one at a time
    Season {
        /// Catalog id from `search`
        id: String,
        /// Audio track (sub or dub)
        #[arg(short, long, default_value = "sub")]
        category: StreamCategory,
        /// Pause between episodes, in milliseconds
        #[arg(long, default_value_t = 1500)]
        delay_ms: u64,
    },
}
