//! xtream-scout CLI.
//!
//! `channels` lists, filters and enriches live channels through the
//! day-keyed listing cache; `download` archives a full acquisition run
//! into a timestamped, credential-masked snapshot.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use xtream_scout::api::XtreamClient;
use xtream_scout::archive::{Archiver, Masker};
use xtream_scout::cache::{get_or_fetch, DiskCache};
use xtream_scout::config::{default_cache_dir, Credentials, DEFAULT_USER_AGENT};
use xtream_scout::enrich::Enricher;
use xtream_scout::epg;
use xtream_scout::error::ScoutError;
use xtream_scout::filter;
use xtream_scout::models::{Category, Channel};
use xtream_scout::output;
use xtream_scout::probe::{check_ffprobe, FfprobeProber, StreamProber};

#[derive(Parser)]
#[command(name = "xtream-scout", version, about = "Xtream IPTV provider inspector")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Xtream server URL or bare host
    #[arg(long)]
    server: String,

    /// Username for authentication
    #[arg(long)]
    user: String,

    /// Password for authentication
    #[arg(long)]
    pw: String,

    /// User-Agent header for provider requests
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    agent: String,

    /// Provider request attempts before giving up
    #[arg(long, default_value_t = 3)]
    retries: u32,
}

impl ConnectionArgs {
    fn credentials(&self) -> Credentials {
        Credentials::new(&self.server, &self.user, &self.pw)
            .with_user_agent(&self.agent)
            .with_retries(self.retries)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List live channels with optional filtering and enrichment
    Channels {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Bypass the day-keyed listing cache
        #[arg(long)]
        nocache: bool,

        /// Directory for listing cache records
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Keep only channels whose name contains this term
        #[arg(long)]
        channel: Option<String>,

        /// Keep only channels whose category name contains this term
        #[arg(long)]
        category: Option<String>,

        /// Count EPG entries per channel
        #[arg(long)]
        epgcheck: bool,

        /// Probe each stream with ffprobe
        #[arg(long)]
        check: bool,

        /// Per-stream probe timeout in seconds
        #[arg(long, default_value_t = 30)]
        probe_timeout: u64,

        /// Write results to this CSV file
        #[arg(long)]
        save: Option<String>,
    },

    /// Download all provider artifacts into a timestamped snapshot
    Download {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Root directory for snapshots (must exist)
        #[arg(long)]
        savedir: PathBuf,

        /// Keep credentials verbatim in saved artifacts
        #[arg(long)]
        saveraw: bool,

        /// Store JSON artifacts as received instead of pretty-printing
        #[arg(long)]
        no_format: bool,

        /// Keep only the newest N snapshots for this server
        #[arg(long)]
        prune: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let outcome = match cli.command {
        Commands::Channels {
            conn,
            nocache,
            cache_dir,
            channel,
            category,
            epgcheck,
            check,
            probe_timeout,
            save,
        } => run_channels(
            conn.credentials(),
            nocache,
            cache_dir,
            channel,
            category,
            epgcheck,
            check,
            probe_timeout,
            save,
        ),
        Commands::Download {
            conn,
            savedir,
            saveraw,
            no_format,
            prune,
        } => run_download(conn.credentials(), savedir, saveraw, no_format, prune),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[allow(clippy::too_many_arguments)]
fn run_channels(
    creds: Credentials,
    nocache: bool,
    cache_dir: Option<PathBuf>,
    channel_term: Option<String>,
    category_term: Option<String>,
    epgcheck: bool,
    check: bool,
    probe_timeout: u64,
    save: Option<String>,
) -> Result<(), ScoutError> {
    info!(
        "running for server {} on {}",
        creds.masked_server(),
        Local::now().format("%Y-%m-%d %H:%M")
    );

    // Fail fast when probing is requested but the tool is absent.
    let prober = if check {
        let path = check_ffprobe().map_err(ScoutError::ProbeUnavailable)?;
        Some(FfprobeProber::new(path, Duration::from_secs(probe_timeout)))
    } else {
        None
    };

    let client = XtreamClient::new(&creds);
    let cache = DiskCache::new(
        cache_dir.unwrap_or_else(default_cache_dir),
        &creds.server_key(),
    );

    let categories_raw = get_or_fetch(&cache, "live_categories", nocache, || {
        client.fetch_listing("get_live_categories", &[])
    })?;
    let streams_raw = get_or_fetch(&cache, "live_streams", nocache, || {
        client.fetch_listing("get_live_streams", &[])
    })?;

    let categories: Vec<Category> = parse_listing("live_categories", &categories_raw)?;
    let channels: Vec<Channel> = parse_listing("live_streams", &streams_raw)?;

    let selected: Vec<&Channel> = filter::select(
        &channels,
        &categories,
        channel_term.as_deref(),
        category_term.as_deref(),
    )
    .collect();
    info!("{} of {} channels selected", selected.len(), channels.len());

    let prober_ref: Option<&dyn StreamProber> =
        prober.as_ref().map(|p| p as &dyn StreamProber);
    let enricher = Enricher::new(&client, &creds, epgcheck, prober_ref);
    let mut warnings = Vec::new();
    let rows = enricher.enrich_all(&selected, &categories, &mut warnings);

    output::print_table(&rows);
    for warning in &warnings {
        warn!("{warning}");
    }

    if let Some(path) = save {
        match output::write_csv(&path, &rows) {
            Ok(()) => info!("output saved to {path}"),
            Err(e) => warn!("{e}"),
        }
    }

    Ok(())
}

fn run_download(
    creds: Credentials,
    savedir: PathBuf,
    saveraw: bool,
    no_format: bool,
    prune: Option<usize>,
) -> Result<(), ScoutError> {
    info!(
        "running for server {} on {}",
        creds.masked_server(),
        Local::now().format("%Y-%m-%d %H:%M")
    );

    if !savedir.is_dir() {
        return Err(ScoutError::Archive(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("save directory '{}' does not exist", savedir.display()),
        )));
    }

    let client = XtreamClient::new(&creds);
    let masker = Masker::new(&creds);
    let archiver = Archiver::new(savedir, &creds.server_key(), masker.clone(), saveraw);

    let mut snapshot = archiver.begin_snapshot().map_err(ScoutError::Archive)?;
    info!("writing snapshot {}", snapshot.dir().display());

    let mut warnings: Vec<String> = Vec::new();

    // user_info first: it doubles as the authentication check for the run.
    info!("retrieving user_info");
    let account = client.account_info()?;
    let account = if saveraw {
        account
    } else {
        masker.mask_account(account)
    };
    let user_info = if no_format {
        account.to_string()
    } else {
        serde_json::to_string_pretty(&account).unwrap_or_else(|_| account.to_string())
    };
    if let Err(w) = archiver.write_artifact(&snapshot, "user_info.json", user_info.as_bytes()) {
        warnings.push(w);
    }

    // Fixed acquisition order: categories, then listings, then the guide.
    let listings = [
        ("live_categories", "get_live_categories"),
        ("live_streams", "get_live_streams"),
        ("vod_categories", "get_vod_categories"),
        ("vod_streams", "get_vod_streams"),
        ("series_categories", "get_series_categories"),
        ("series", "get_series"),
    ];
    for (name, action) in listings {
        info!("retrieving {name}");
        let payload = client.fetch_listing(action, &[])?;
        let body = reformat_json(&payload, no_format);
        if let Err(w) =
            archiver.write_artifact(&snapshot, &format!("{name}.json"), body.as_bytes())
        {
            warnings.push(w);
        }
    }

    info!("retrieving EPG data");
    let guide = client.xmltv()?;
    let guide = epg::into_plain_xml(guide).map_err(|e| ScoutError::InvalidResponse {
        what: "xmltv".to_string(),
        reason: e,
    })?;
    match epg::parse_summary(&guide) {
        Ok(summary) => info!(
            "EPG guide: {} channels, {} programmes",
            summary.channel_count, summary.programme_count
        ),
        Err(e) => {
            return Err(ScoutError::InvalidResponse {
                what: "xmltv".to_string(),
                reason: e,
            })
        }
    }
    if let Err(w) = archiver.write_artifact(&snapshot, "epg.xml", &guide) {
        warnings.push(w);
    }

    snapshot.seal();
    info!("data saved in {}", snapshot.dir().display());

    // The sealed snapshot counts toward the retained set.
    if let Some(keep) = prune {
        if keep > 0 {
            warnings.extend(archiver.prune(keep));
        }
    }

    for warning in &warnings {
        warn!("{warning}");
    }
    Ok(())
}

fn parse_listing<T>(what: &str, payload: &str) -> Result<Vec<T>, ScoutError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(payload).map_err(|e| ScoutError::InvalidResponse {
        what: what.to_string(),
        reason: e.to_string(),
    })
}

fn reformat_json(payload: &str, no_format: bool) -> String {
    if no_format {
        return payload.to_string();
    }
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| payload.to_string()),
        Err(_) => payload.to_string(),
    }
}
