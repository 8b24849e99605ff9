use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{fetch, process, LoadArgs};

#[derive(Parser)]
#[command(name = "ftr")]
#[command(about = "Flow totalizer consumption correction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Download minute totals from the historian tag view
    Fetch {
        #[command(flatten)]
        load: LoadArgs,

        /// Period start, `YYYY-MM-DD HH:MM:SS` (UTC). Overrides source.period.start.
        #[arg(long)]
        start: Option<String>,

        /// Period end, `YYYY-MM-DD HH:MM:SS` (UTC). Overrides source.period.end.
        #[arg(long)]
        end: Option<String>,
    },

    /// Correct a minute table and write consumption + anomaly columns
    Minutes {
        #[command(flatten)]
        load: LoadArgs,

        /// Minute table to correct. Default: newest all_minutes_*.csv in io.minute_dir.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Reconcile corrected minutes into hourly totals
    Hourly {
        #[command(flatten)]
        load: LoadArgs,

        /// Corrected minute table. Default: newest consumption_minutes_with_anom_*.csv
        /// in io.output_dir.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// minutes then hourly on the freshly written file
    Run {
        #[command(flatten)]
        load: LoadArgs,

        /// Fetch a new minute table first.
        #[arg(long, default_value_t = false)]
        fetch: bool,

        /// Minute table to correct (ignored with --fetch).
        #[arg(long, conflicts_with = "fetch")]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = ftr_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Fetch { load, start, end } => {
            let cfg = load.load(&[ftr_config::ConfigMode::Fetch])?;
            fetch::fetch(&cfg, start, end).await?;
        }

        Commands::Minutes { load, input } => {
            let cfg = load.load(&[ftr_config::ConfigMode::Minutes])?;
            process::minutes(&cfg, input)?;
        }

        Commands::Hourly { load, input } => {
            let cfg = load.load(&[ftr_config::ConfigMode::Hourly])?;
            process::hourly(&cfg, input)?;
        }

        Commands::Run {
            load,
            fetch: with_fetch,
            input,
        } => {
            use ftr_config::ConfigMode;

            let modes: &[ConfigMode] = if with_fetch {
                &[ConfigMode::Fetch, ConfigMode::Minutes, ConfigMode::Hourly]
            } else {
                &[ConfigMode::Minutes, ConfigMode::Hourly]
            };
            let cfg = load.load(modes)?;

            let input = if with_fetch {
                Some(fetch::fetch(&cfg, None, None).await?)
            } else {
                input
            };
            let minutes_path = process::minutes(&cfg, input)?;
            process::hourly(&cfg, Some(minutes_path))?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
