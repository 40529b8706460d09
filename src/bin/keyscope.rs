//! keyscope CLI

use clap::{Parser, Subcommand};
use keyscope::common::Config;
use keyscope::{Profiler, RedisStore};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "keyscope")]
#[command(about = "Profile the key-space of a Redis-compatible store")]
#[command(version)]
struct Cli {
    /// Config file (TOML); defaults to ./keyscope.toml if present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Logical database
    #[arg(long)]
    db: Option<i64>,

    /// ACL username
    #[arg(long)]
    user: Option<String>,

    /// Password
    #[arg(long, env = "KEYSCOPE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Send READONLY so a cluster replica serves the scan
    #[arg(long)]
    read_only: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover dominant key prefixes and report per-prefix statistics
    Prefix {
        /// SCAN match pattern
        #[arg(long)]
        scan_pattern: Option<String>,

        /// SCAN COUNT hint
        #[arg(long)]
        batch_size: Option<usize>,

        /// Minimum number of keys to sample
        #[arg(long)]
        prefix_samples: Option<u64>,

        /// Keep sampling past the target until this many first-level prefixes appear
        #[arg(long)]
        prefix_min: Option<u64>,

        /// Stop refining a prefix with this many members or fewer
        #[arg(long)]
        prefix_min_members: Option<usize>,

        /// Maximum detected prefix length (exclusive)
        #[arg(long)]
        prefix_max_detect: Option<usize>,

        /// Keep deeper refinements only if they yield more prefixes than this
        #[arg(long)]
        prefix_detail_level: Option<usize>,

        /// Suffix length a first-level branch must exceed to count while sampling
        #[arg(long)]
        branch_threshold: Option<usize>,

        /// Collect per-prefix size and type statistics
        #[arg(long)]
        stats: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.store.host = host;
    }
    if let Some(port) = cli.port {
        config.store.port = port;
    }
    if let Some(db) = cli.db {
        config.store.db = db;
    }
    if cli.user.is_some() {
        config.store.username = cli.user;
    }
    if cli.password.is_some() {
        config.store.password = cli.password;
    }
    if cli.read_only {
        config.store.read_only = true;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    // Logs go to stderr so the report on stdout stays clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Prefix {
            scan_pattern,
            batch_size,
            prefix_samples,
            prefix_min,
            prefix_min_members,
            prefix_max_detect,
            prefix_detail_level,
            branch_threshold,
            stats,
            json,
        } => {
            let profile = &mut config.profile;
            if let Some(pattern) = scan_pattern {
                profile.pattern = pattern;
            }
            if let Some(batch_size) = batch_size {
                profile.batch_size = batch_size;
            }
            if let Some(samples) = prefix_samples {
                profile.sample_target = samples;
            }
            if let Some(min) = prefix_min {
                profile.min_prefix_count = min;
            }
            if let Some(min_members) = prefix_min_members {
                profile.min_members = min_members;
            }
            if let Some(max_detect) = prefix_max_detect {
                profile.max_detect_length = max_detect;
            }
            if let Some(level) = prefix_detail_level {
                profile.detail_level = level;
            }
            if let Some(threshold) = branch_threshold {
                profile.branch_suffix_threshold = threshold;
            }
            if stats {
                profile.collect_stats = true;
            }

            tracing::info!(
                "keyscope {} profiling {}",
                keyscope::VERSION,
                config.store.display_addr()
            );
            let store = RedisStore::connect(&config.store).await?;
            let profiler = Profiler::new(store, config.profile.clone())?;

            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_signal(cancel.clone()));

            let discovery = match profiler.discover_prefixes(&cancel).await {
                Ok(discovery) => discovery,
                Err(e) => return exit_on(e),
            };
            if !json {
                print!("{}", discovery.report(profiler.config().collect_stats).render_table());
            }

            match profiler.complete(discovery, &cancel).await {
                Ok(report) => {
                    if json {
                        println!("{}", report.to_json()?);
                    } else {
                        print!("{}", report.render_table());
                    }
                }
                Err(e) if e.is_cancelled() => {
                    // Pass two never finished: show what pass one found.
                    if let Some(discovery) = profiler.discovered() {
                        let report = discovery.report(profiler.config().collect_stats);
                        if json {
                            println!("{}", report.to_json()?);
                        } else {
                            print!("{}", report.render_table());
                        }
                    }
                    return exit_on(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

/// Exit with 130 on cancellation, otherwise hand the error back to `main`.
fn exit_on(e: keyscope::Error) -> anyhow::Result<()> {
    if e.is_cancelled() {
        tracing::warn!("{}", e);
        std::process::exit(e.exit_code());
    }
    Err(e.into())
}

/// Cancel `token` on SIGINT, SIGTERM or SIGHUP.
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut term, mut hup) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(term), Ok(hup)) => (term, hup),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Cannot install signal handlers: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
                return;
            }
        };

        let name = tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = term.recv() => "SIGTERM",
            _ = hup.recv() => "SIGHUP",
        };
        tracing::warn!("Received {}, stopping after the current batch", name);
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Received Ctrl-C, stopping after the current batch");
    }

    token.cancel();
}
