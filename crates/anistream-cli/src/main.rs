mod cli;

use std::time::Duration;

use anistream_core::config::load_deobfuscator;
use anistream_core::{Anistream, AnistreamConfig, resolve_season};
use clap::Parser;
use cli::{Cli, Commands, Settings};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = apply_settings(AnistreamConfig::from_env()?, cli.settings)?;
    let pipeline = Anistream::with_config(config)?;
    let provider = pipeline.provider(&cli.provider)?;

    let output: Value = match cli.command {
        Commands::Search { query, page } => {
            serde_json::to_value(provider.search(&query, page).await?)?
        }
        Commands::Info { id } => serde_json::to_value(provider.fetch_anime_info(&id).await?)?,
        Commands::Servers {
            episode_id,
            category,
        } => serde_json::to_value(
            provider
                .fetch_episode_servers(&episode_id, category)
                .await?,
        )?,
        Commands::Sources {
            episode_id,
            server,
            category,
        } => serde_json::to_value(
            provider
                .fetch_episode_sources(&episode_id, server.as_deref(), category)
                .await?,
        )?,
        Commands::Season {
            id,
            category,
            delay_ms,
        } => {
            let report = resolve_season(
                provider.as_ref(),
                &id,
                category,
                Duration::from_millis(delay_ms),
            )
            .await?;
            tracing::info!(
                resolved = report.resolved.len(),
                failed = report.failures.len(),
                "season done"
            );
            serde_json::to_value(report)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Layers command-line flags over an already loaded configuration
fn apply_settings(
    mut config: AnistreamConfig,
    settings: Settings,
) -> anistream_core::Result<AnistreamConfig> {
    if let Some(url) = settings.cookie_api_url {
        config.cookie_service.url = url;
    }
    if let Some(key) = settings.cookie_api_key {
        config.cookie_service.api_key = key;
    }
    if let Some(url) = settings.animeowl_url {
        config.animeowl.base_url = url;
    }
    if let Some(url) = settings.animepahe_url {
        config.set_animepahe_url(url);
    }
    if let Some(path) = settings.deobfuscator {
        config.animeowl.sandbox = load_deobfuscator(&path)?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_settings_come_only_from_flags() {
        let cli = parse(&["anistream", "search", "frieren"]);
        assert!(cli.settings.cookie_api_url.is_none());
        assert!(cli.settings.cookie_api_key.is_none());
        assert!(cli.settings.animeowl_url.is_none());
        assert!(cli.settings.animepahe_url.is_none());
        assert!(cli.settings.deobfuscator.is_none());
    }

    #[test]
    fn test_flags_override_environment() {
        let base = AnistreamConfig::from_lookup(|key| match key {
            "ANISTREAM_ANIMEOWL_URL" => Some("https://owl.env.example".to_string()),
            "ANISTREAM_COOKIE_API_KEY" => Some("env-key".to_string()),
            _ => None,
        })
        .unwrap();
        let cli = parse(&[
            "anistream",
            "--animeowl-url",
            "https://owl.flag.example",
            "search",
            "frieren",
        ]);

        let config = apply_settings(base, cli.settings).unwrap();
        assert_eq!(config.animeowl.base_url, "https://owl.flag.example");
        assert_eq!(config.cookie_service.api_key, "env-key");
    }

    #[test]
    fn test_missing_deobfuscator_flag_is_config_error() {
        let cli = parse(&[
            "anistream",
            "--deobfuscator",
            "/nonexistent/deobfuscate.js",
            "search",
            "frieren",
        ]);

        let result = apply_settings(AnistreamConfig::default(), cli.settings);
        assert!(matches!(result, Err(anistream_core::AnistreamError::Config(_))));
    }
}
