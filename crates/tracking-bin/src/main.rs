//! Tracking CLI - drive the attribution and event engine from the shell.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracking_core::Paths;

/// Tracking command-line interface.
#[derive(Parser)]
#[command(name = "tracking")]
#[command(about = "Marketing attribution capture and event delivery")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for stored state, config and logs. Defaults to ~/.tracking
    #[arg(long, global = true, env = "TRACKING_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Config file to use instead of <base-dir>/config.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Page URL the command runs on
    #[arg(long, global = true, default_value = "https://localhost/")]
    url: String,

    /// Referrer of the page load
    #[arg(long, global = true)]
    referrer: Option<String>,

    /// Treat the page load as a reload
    #[arg(long, global = true)]
    reload: bool,

    /// Pretend the network is down; events go to the offline queue
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file with the given endpoint
    Init {
        /// Collection endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
        /// Keep a local debug log of sent events
        #[arg(long)]
        debug: bool,
    },
    /// Load a page: capture attribution and send a page view
    Visit {
        /// Page title
        #[arg(long)]
        title: Option<String>,
        /// Page value (0-100)
        #[arg(long)]
        value: Option<f64>,
    },
    /// Send a custom event
    Track {
        /// snake_case event name
        name: String,
        /// Properties as a JSON object
        #[arg(long)]
        props: Option<String>,
    },
    /// Send a funnel step
    Funnel {
        /// Step name
        step: String,
        /// 1-based step number
        #[arg(long)]
        number: i64,
        /// Step value (0-100)
        #[arg(long)]
        value: Option<f64>,
        /// Properties as a JSON object
        #[arg(long)]
        props: Option<String>,
    },
    /// Send an identify event
    Identify {
        user_id: String,
        /// Traits as a JSON object
        #[arg(long)]
        traits: Option<String>,
    },
    /// Print stored attribution, session and debug events as JSON
    Export,
    /// Print engine health as JSON
    Health,
    /// Resend events from the offline queue
    Resync,
    /// Remove stored tracking data
    Clear {
        /// Only clear last touch and journey
        #[arg(long)]
        after_conversion: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir.clone() {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    if let Commands::Init { endpoint, debug } = &cli.command {
        tracking_core::init_logging(cli.log_level.as_deref().unwrap_or("info"));
        return app::write_config(&paths, endpoint.clone(), *debug);
    }

    let config = app::load_config(&paths, cli.config.as_deref())?;
    tracking_core::init_logging_with(tracking_core::LogConfig {
        default_level: cli.log_level.clone().unwrap_or_else(|| config.log_level.clone()),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    });

    let title = match &cli.command {
        Commands::Visit { title, .. } => title.clone(),
        _ => None,
    };
    let page = app::PageLoad {
        url: cli.url,
        referrer: cli.referrer,
        title,
        is_reload: cli.reload,
        online: !cli.offline,
    };
    let tracker = app::build_tracker(&paths, &config, &page).await?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Visit { value, .. } => {
            app::visit(&tracker, config, value).await?;
        }
        Commands::Track { name, props } => {
            app::track(&tracker, config, &name, props.as_deref()).await?;
        }
        Commands::Funnel {
            step,
            number,
            value,
            props,
        } => {
            app::funnel(&tracker, config, &step, number, value, props.as_deref()).await?;
        }
        Commands::Identify { user_id, traits } => {
            app::identify(&tracker, config, &user_id, traits.as_deref()).await?;
        }
        Commands::Export => {
            println!("{}", tracker.export_tracking_json().await);
        }
        Commands::Health => {
            let health = tracker.health().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Resync => {
            app::resync(&tracker).await;
        }
        Commands::Clear { after_conversion } => {
            app::clear(&tracker, after_conversion).await?;
        }
    }

    Ok(())
}
