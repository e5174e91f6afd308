mod config;
mod error;
mod events;
mod grove;
mod growth;
mod help;
mod layout;
mod settings;
mod terminal;
mod themes;
mod tree;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use config::{clamp_speed, GroveConfig, SimulateConfig, MIN_SPEED_MS};
use layout::RankDirection;
use settings::Settings;
use std::fs::{self, File};
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use themes::{theme_index, THEMES};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "termgrove")]
#[command(version)]
#[command(about = "Grow a branching idea tree in the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tend a tree interactively
    Grow {
        /// Milliseconds between automatic growth ticks
        #[arg(short, long)]
        speed: Option<u64>,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Theme id (see `termgrove themes`)
        #[arg(short, long)]
        theme: Option<String>,

        /// Start automatic growth immediately
        #[arg(short, long)]
        auto: bool,

        /// Rank direction: bottom-to-top or top-to-bottom
        #[arg(short, long)]
        direction: Option<String>,

        /// Write logs to the cache directory
        #[arg(long)]
        log: bool,
    },

    /// Run automatic growth without a screen and print the result
    Simulate {
        /// Number of growth ticks to run
        #[arg(short = 'n', long, default_value = "40")]
        ticks: u32,

        /// Milliseconds between growth ticks
        #[arg(short, long)]
        speed: Option<u64>,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Theme id used for the text rendering
        #[arg(short, long)]
        theme: Option<String>,

        /// Print a JSON report instead of a drawing
        #[arg(short, long)]
        json: bool,

        /// Milliseconds between weather changes
        #[arg(short, long)]
        weather_period: Option<u64>,

        /// Width of the text rendering
        #[arg(long, default_value = "100")]
        width: u16,

        /// Height of the text rendering
        #[arg(long, default_value = "30")]
        height: u16,
    },

    /// List the available themes
    Themes,
}

/// Headless runs log to stderr; interactive runs only log when asked, to a file.
fn init_tracing(log_file: Option<File>) {
    let filter = EnvFilter::try_from_env("TERMGROVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = match log_file {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).try_init(),
        None => builder.with_writer(io::stderr).try_init(),
    };
}

fn open_log_file() -> anyhow::Result<File> {
    let dir = dirs::cache_dir()
        .context("no cache directory on this system")?
        .join("termgrove");
    fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let path = dir.join("termgrove.log");
    File::create(&path).with_context(|| format!("cannot open {}", path.display()))
}

fn apply_theme(config: &mut GroveConfig, theme: Option<&str>) -> anyhow::Result<()> {
    if let Some(id) = theme {
        match theme_index(id) {
            Some(index) => config.theme = index,
            None => bail!("unknown theme '{}'; run `termgrove themes` for the list", id),
        }
    }
    Ok(())
}

fn parse_direction(s: &str) -> anyhow::Result<RankDirection> {
    match s.to_lowercase().as_str() {
        "bottom-to-top" | "bt" | "up" => Ok(RankDirection::BottomToTop),
        "top-to-bottom" | "tb" | "down" => Ok(RankDirection::TopToBottom),
        other => bail!("unknown direction '{}', expected bottom-to-top or top-to-bottom", other),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Grow {
            speed,
            seed,
            theme,
            auto,
            direction,
            log,
        } => {
            init_tracing(if log { Some(open_log_file()?) } else { None });

            let mut config = GroveConfig::from_settings(&Settings::load());
            if let Some(ms) = speed {
                config.growth_speed_ms = clamp_speed(ms);
            }
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(d) = direction.as_deref() {
                config.layout.direction = parse_direction(d)?;
            }
            apply_theme(&mut config, theme.as_deref())?;
            config.auto_start = auto;

            tracing::info!(speed_ms = config.growth_speed_ms, seed = ?config.seed, "starting grove");
            grove::run(config)?;
        }
        Commands::Simulate {
            ticks,
            speed,
            seed,
            theme,
            json,
            weather_period,
            width,
            height,
        } => {
            init_tracing(None);

            let mut grove_config = GroveConfig::from_settings(&Settings::load());
            if let Some(ms) = speed {
                grove_config.growth_speed_ms = clamp_speed(ms);
            }
            if seed.is_some() {
                grove_config.seed = seed;
            }
            if let Some(ms) = weather_period {
                grove_config.weather_period = Duration::from_millis(ms.max(MIN_SPEED_MS));
            }
            apply_theme(&mut grove_config, theme.as_deref())?;

            let config = SimulateConfig {
                grove: grove_config,
                ticks,
                json,
                width: width.max(20),
                height: height.max(10),
            };
            grove::simulate(&config, &mut io::stdout().lock())?;
        }
        Commands::Themes => {
            for theme in &THEMES {
                println!("{:<18} {}", theme.id, theme.name);
            }
        }
    }

    Ok(())
}
