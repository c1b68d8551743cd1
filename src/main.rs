use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use podharvest::{
    EpisodeCandidate, FfmpegTranscoder, HARVEST_LIST_FILENAME, HarvestOptions, Harvester,
    NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient, SharedProgressReporter,
    parse_feed_list, write_harvest_list,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "[#] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static COMPRESS: Emoji<'_, '_> = Emoji("🗜️  ", "[z] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");

/// Harvest recent podcast episodes, downloaded in batches and compressed below a size ceiling
#[derive(Parser, Debug)]
#[command(name = "podharvest")]
#[command(about = "Harvest recent podcast episodes from RSS feeds")]
#[command(version)]
struct Args {
    /// RSS feed URLs or paths to local RSS files
    feeds: Vec<String>,

    /// File with one feed per line (blank lines and # comments are ignored)
    #[arg(short = 'f', long)]
    feeds_file: Option<PathBuf>,

    /// Only consider episodes published within this many days
    #[arg(short, long, default_value = "1")]
    days: u32,

    /// Root directory for batch folders
    #[arg(short, long, default_value = "downloads")]
    output_dir: PathBuf,

    /// Maximum number of feeds fetched concurrently
    #[arg(short = 'c', long, default_value = "5")]
    concurrent: usize,

    /// Episodes per batch directory
    #[arg(short, long, default_value = "50")]
    batch_size: usize,

    /// Bitrate of compressed audio in kbit/s
    #[arg(long, default_value = "32")]
    bitrate: u32,

    /// Files above this size in MB are compressed
    #[arg(short = 'm', long, default_value = "20")]
    max_size_mb: f64,

    /// Timeout per feed and per connection in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// ffmpeg executable to use for compression
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Only scan the feeds and list the episodes found
    #[arg(long)]
    scan_only: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    titles: Mutex<HashMap<String, String>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Result<Self> {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar().template("{spinner:.green} {wide_msg}")?;

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Ok(Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            titles: Mutex::new(HashMap::new()),
            main_bar,
        })
    }

    /// Remember episode titles so download bars can be labelled by id
    fn remember(&self, episodes: &[EpisodeCandidate]) {
        if let Ok(mut titles) = self.titles.lock() {
            titles.extend(
                episodes
                    .iter()
                    .map(|e| (e.id.clone(), e.episode_title.clone())),
            );
        }
    }

    fn title_of(&self, episode_id: &str) -> String {
        self.titles
            .lock()
            .ok()
            .and_then(|titles| titles.get(episode_id).cloned())
            .unwrap_or_else(|| episode_id.to_string())
    }

    fn get_or_create_bar(&self, episode_id: &str) -> Option<ProgressBar> {
        let mut bars = self.bars.lock().ok()?;

        if let Some(bar) = bars.get(episode_id) {
            return Some(bar.clone());
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .ok()?
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(episode_id.to_string(), bar.clone());
        Some(bar)
    }

    fn finish_bar(&self, episode_id: &str) {
        if let Ok(mut bars) = self.bars.lock() {
            if let Some(bar) = bars.remove(episode_id) {
                bar.finish_and_clear();
            }
        }
    }

    fn clear(&self) {
        self.main_bar.finish_and_clear();
    }

    fn line(&self, message: String) {
        let _ = self.multi.println(message);
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ScanStarting { feed_count } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}Scanning {} feeds",
                    feed_count.to_string().cyan()
                ));
            }

            ProgressEvent::FeedScanned {
                source,
                episode_count,
            } => {
                self.line(format!(
                    "  {HEADPHONES}{} • {} new",
                    source.cyan(),
                    episode_count.to_string().yellow()
                ));
            }

            ProgressEvent::FeedFailed { source, error } => {
                self.line(format!("  {FAILURE}{} - {}", source.red(), error.dimmed()));
            }

            ProgressEvent::ScanCompleted {
                feed_count,
                failed_count,
                episode_count,
            } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}{} feeds scanned, {} failed, {} episodes found",
                    feed_count.to_string().cyan(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    },
                    episode_count.to_string().yellow()
                ));
            }

            ProgressEvent::BatchStarting {
                batch_number,
                total_batches,
                episode_count,
            } => {
                self.main_bar.set_message(format!(
                    "{PACKAGE}Batch {}/{} • {} episodes",
                    batch_number.to_string().cyan(),
                    total_batches.to_string().cyan(),
                    episode_count
                ));
            }

            ProgressEvent::DownloadStarting {
                episode_id,
                content_length,
            } => {
                let title = self.title_of(&episode_id);
                if let Some(bar) = self.get_or_create_bar(&episode_id) {
                    bar.set_length(content_length.unwrap_or(0));
                    bar.set_position(0);
                    bar.set_message(truncate_title(&title, 40));
                }
            }

            ProgressEvent::DownloadProgress {
                episode_id,
                bytes_downloaded,
                total_bytes,
            } => {
                if let Some(bar) = self.get_or_create_bar(&episode_id) {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }

            ProgressEvent::DownloadCompleted {
                episode_id,
                episode_title,
                ..
            } => {
                self.finish_bar(&episode_id);
                self.line(format!(
                    "  {SUCCESS}{}",
                    truncate_title(&episode_title, 50).green()
                ));
            }

            ProgressEvent::DownloadFailed {
                episode_id,
                episode_title,
                error,
            } => {
                self.finish_bar(&episode_id);
                self.line(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::CompressionStarting {
                episode_title,
                size_mb,
                ..
            } => {
                self.main_bar.set_message(format!(
                    "{COMPRESS}Compressing {} ({:.1} MB)",
                    truncate_title(&episode_title, 40),
                    size_mb
                ));
            }

            ProgressEvent::CompressionCompleted {
                episode_id,
                original_mb,
                compressed_mb,
            } => {
                self.line(format!(
                    "  {COMPRESS}{} {:.1} MB → {} MB",
                    truncate_title(&self.title_of(&episode_id), 40),
                    original_mb,
                    format!("{compressed_mb:.1}").green()
                ));
            }

            ProgressEvent::CompressionFailed {
                episode_title,
                error,
                ..
            } => {
                self.line(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::BatchCompleted {
                batch_number,
                total,
                downloaded,
                compressed,
            } => {
                self.line(format!(
                    "{PACKAGE}{} {}/{} downloaded, {}/{} ready",
                    format!("Batch {batch_number}:").bold(),
                    downloaded.to_string().green(),
                    total,
                    compressed.to_string().green(),
                    total
                ));
            }

            ProgressEvent::HarvestCompleted { total, usable } => {
                self.main_bar.finish_and_clear();
                let failed = total - usable;
                println!(
                    "\n{PARTY}{} {} ready, {} failed",
                    "Harvest complete:".bold().green(),
                    usable.to_string().green().bold(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("podharvest={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn collect_sources(args: &Args) -> Result<Vec<String>> {
    let mut sources = args.feeds.clone();
    if let Some(path) = &args.feeds_file {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read feeds file {}", path.display()))?;
        sources.extend(parse_feed_list(&contents));
    }
    if sources.is_empty() {
        bail!("No feeds given: pass feed URLs/paths or --feeds-file");
    }
    Ok(sources)
}

fn print_scan(episodes: &[EpisodeCandidate]) {
    for episode in episodes {
        println!(
            "  {} {} • {} ({})",
            episode.id.dimmed(),
            episode.podcast_title.cyan(),
            episode.episode_title.bold(),
            episode.published_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n{} episodes found", episodes.len().to_string().yellow());
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let sources = collect_sources(&args).await?;

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podharvest".bold().magenta(),
            "- Podcast Episode Harvester".dimmed()
        );
    }

    let timeout = Duration::from_secs(args.timeout);
    let client = ReqwestClient::with_timeout(timeout).context("Failed to build HTTP client")?;
    let transcoder = FfmpegTranscoder::with_program(&args.ffmpeg);

    let options = HarvestOptions {
        download_dir: args.output_dir.clone(),
        scan_concurrency: args.concurrent,
        batch_size: args.batch_size,
        target_bitrate_kbps: args.bitrate,
        size_ceiling_mb: args.max_size_mb,
        feed_timeout: timeout,
        ..HarvestOptions::default()
    };

    let display = (!args.quiet).then(IndicatifReporter::new).transpose()?.map(Arc::new);
    let reporter: SharedProgressReporter = match &display {
        Some(display) => display.clone(),
        None => NoopReporter::shared(),
    };
    let harvester = Harvester::new(client, transcoder, options, reporter)
        .await
        .context("Invalid harvest options")?;

    let episodes = harvester.scan(&sources, args.days).await;

    if args.scan_only || episodes.is_empty() {
        if let Some(display) = &display {
            display.clear();
        }
        if args.scan_only {
            print_scan(&episodes);
        } else if !args.quiet {
            println!("\nNo new episodes in the last {} day(s)", args.days);
        }
        return Ok(());
    }

    if let Some(display) = &display {
        display.remember(&episodes);
    }

    let found = episodes.len();
    let harvested = harvester
        .harvest(episodes)
        .await
        .context("Failed to harvest episodes")?;

    let list_path = args.output_dir.join(HARVEST_LIST_FILENAME);
    write_harvest_list(&harvested, &list_path)
        .await
        .with_context(|| format!("Failed to write {}", list_path.display()))?;

    if !args.quiet {
        println!(
            "\n{FOLDER}Output: {}\n",
            list_path.display().to_string().cyan()
        );
    }

    if harvested.is_empty() && found > 0 {
        std::process::exit(1);
    }

    Ok(())
}
