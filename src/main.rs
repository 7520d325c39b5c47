use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use addon_scraper::catalog::{CatalogBuilder, load_tracked_repos, write_catalog};
use addon_scraper::config::{self, DOWNLOAD_TIMEOUT_SECS, ScraperConfig};
use addon_scraper::logging;
use addon_scraper::release::{
    GitHubClient, LogIssueSink, ReleaseCache, ReleaseResolver, RepoId, ResolverOptions,
    TagSelector, XpiDownloader, open_store,
};

#[derive(Parser)]
#[command(name = "addon-scraper")]
#[command(version, about = "Resolve addon releases and publish a compatibility catalog")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Mirror logs into a daily rolling file (default location when no path is given)
    #[arg(long, global = true, num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bring the release cache up to date
    BuildCache {
        /// Reprocess every release, not only new ones
        #[arg(long)]
        full_rebuild: bool,

        /// Process at most N new releases per repository
        #[arg(long, value_name = "N")]
        max_releases: Option<usize>,

        /// Only these repositories (owner/name) instead of the input directory
        #[arg(long = "repo", value_name = "OWNER/NAME")]
        repos: Vec<String>,

        #[arg(long)]
        workers: Option<usize>,
    },
    /// Write the catalog from the release cache
    Scrape {
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Check a pinned release of one repository against a platform line
    Check {
        /// Repository as owner/name
        repo: String,

        /// `latest`, `pre` or a tag name
        #[arg(long, default_value = "latest")]
        tag: String,

        #[arg(long, default_value = "7")]
        target: String,
    },
    /// Print release cache statistics
    Stats,
}

fn load_config(cli: &Cli) -> anyhow::Result<ScraperConfig> {
    let mut config = match &cli.config {
        Some(path) => ScraperConfig::load(path)?,
        None => ScraperConfig::default(),
    };
    if let Some(token) = &cli.github_token {
        config.github.token = Some(token.clone());
    }
    Ok(config)
}

fn open_cache(config: &ScraperConfig) -> anyhow::Result<Arc<ReleaseCache>> {
    let store = open_store(&config.cache).context("Failed to open release cache")?;
    Ok(Arc::new(ReleaseCache::new(store)))
}

fn clients(config: &ScraperConfig) -> anyhow::Result<(Arc<GitHubClient>, Arc<XpiDownloader>)> {
    let source = GitHubClient::new(&config.github)?;
    let fetcher = XpiDownloader::new(&config.cache, Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))?;
    Ok((Arc::new(source), Arc::new(fetcher)))
}

fn tracked_repos(config: &ScraperConfig) -> anyhow::Result<Vec<String>> {
    load_tracked_repos(&config.input_dir)
        .inspect_err(|e| error!("{}", e))
        .map_err(Into::into)
}

async fn run(command: Command, mut config: ScraperConfig) -> anyhow::Result<()> {
    match command {
        Command::BuildCache {
            full_rebuild,
            max_releases,
            repos,
            workers,
        } => {
            config.full_rebuild |= full_rebuild;
            if max_releases.is_some() {
                config.max_releases_per_repo = max_releases;
            }
            if let Some(workers) = workers {
                config.max_workers = workers;
            }
            let repos = if repos.is_empty() {
                tracked_repos(&config)?
            } else {
                repos
            };

            let (source, fetcher) = clients(&config)?;
            let resolver = ReleaseResolver::new(
                source,
                fetcher,
                open_cache(&config)?,
                Arc::new(LogIssueSink),
                ResolverOptions::from(&config),
            );
            let stats = resolver.build_cache(&repos).await;

            info!(
                "Processed {} repos ({} failed), {} new releases, {} deleted",
                stats.repos_processed,
                stats.repos_failed,
                stats.new_releases_parsed,
                stats.releases_deleted
            );
        }
        Command::Scrape { output, input } => {
            if let Some(input) = input {
                config.input_dir = input;
            }
            if let Some(output) = output {
                config.output_file = output;
            }
            let repos = tracked_repos(&config)?;

            let (source, fetcher) = clients(&config)?;
            let builder = CatalogBuilder::new(
                source,
                fetcher,
                open_cache(&config)?,
                config.max_workers,
                config.previous_info_urls.clone(),
            );
            let catalog = builder.build(&repos).await;
            write_catalog(&config.output_file, &catalog)?;
        }
        Command::Check { repo, tag, target } => {
            let repo: RepoId = repo.parse()?;
            let selector: TagSelector = tag.parse()?;

            let (source, fetcher) = clients(&config)?;
            let resolver = ReleaseResolver::new(
                source,
                fetcher,
                open_cache(&config)?,
                Arc::new(LogIssueSink),
                ResolverOptions::from(&config),
            );

            match resolver.check_pinned_release(&repo, &selector, &target).await? {
                Some(pinned) => {
                    println!("repo:       {}", repo);
                    println!("tag:        {}", pinned.tag);
                    println!("released:   {}", pinned.release_date);
                    println!("download:   {}", pinned.download_url);
                    println!("addon id:   {}", pinned.detail.id.as_deref().unwrap_or_default());
                    println!("version:    {}", pinned.detail.version.as_deref().unwrap_or_default());
                    println!(
                        "range:      {} - {}",
                        pinned.detail.min_version, pinned.detail.max_version
                    );
                    println!("compatible: {} ({}.*)", pinned.compatible, pinned.target);
                }
                None => anyhow::bail!("No usable release {} for {}", selector, repo),
            }
        }
        Command::Stats => {
            let stats = open_cache(&config)?.stats();
            println!("repos:    {}", stats.repos);
            println!("releases: {}", stats.total_releases);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = cli
        .log_file
        .clone()
        .map(|path| path.unwrap_or_else(config::log_path));
    let _guard = logging::init(&cli.log_level, log_file.as_deref()).map_err(|e| anyhow::anyhow!(e))?;

    let config = load_config(&cli)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, config))
}
