// fixja entry point.
//
// Startup sequence:
// 1. Parse command line
// 2. Load config (copying defaults on first run)
// 3. Initialize tracing from the [logging] settings
// 4. Run the requested command and print its output

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use fixja::commands::{self, BuildOptions};
use fixja::config::{self, LoggingConfig};
use fixja_draw::builder::Schedule;
use fixja_draw::points::{MatchResult, Side};

#[derive(Parser, Debug)]
#[command(name = "fixja")]
#[command(version)]
#[command(about = "Generates draws, tournament plans and fixtures for competitions")]
struct Cli {
    /// Directory holding config/ and defaults/
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed a team list into pools and print the tournament plan
    Plan {
        /// CSV file with a `team` column, in seed order
        teams: PathBuf,
        #[arg(short, long)]
        days: u32,
        #[arg(long)]
        max_per_day: Option<u32>,
        #[arg(long)]
        min_per_day: Option<u32>,
    },

    /// Print a round robin draw format
    RoundRobin {
        teams: u32,
        #[arg(short, long)]
        rounds: Option<usize>,
    },

    /// Print a single elimination final series for the given number of pools
    Finals {
        pools: u32,
        /// Label of the third place play-off, if any
        #[arg(long)]
        bronze: Option<String>,
    },

    /// Check a draw format file
    Validate { file: PathBuf },

    /// Build a division from a JSON structure file
    Build {
        structure: PathBuf,
        /// Date the draw from the season start
        #[arg(long, default_value = "false")]
        dated: bool,
        /// Date the draw from this day (YYYY-MM-DD) instead of the season start
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Rounds to generate from each draw format
        #[arg(short, long)]
        rounds: Option<usize>,
        /// Added to the first stage's round numbers
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value = "false")]
        no_save: bool,
        #[arg(long, default_value = "false")]
        no_export: bool,
    },

    /// List stored divisions
    Divisions,

    /// List the stored matches of a division
    Matches { division: i64 },

    /// Score a single result with the configured points formula
    Points {
        #[arg(long, default_value_t = 0)]
        home: i64,
        #[arg(long, default_value_t = 0)]
        away: i64,
        #[arg(long, value_enum)]
        forfeit: Option<SideArg>,
        #[arg(long, default_value = "false")]
        bye: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SideArg {
    Home,
    Away,
}

impl From<SideArg> for Side {
    fn from(arg: SideArg) -> Self {
        match arg {
            SideArg::Home => Side::Home,
            SideArg::Away => Side::Away,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.base_dir).context("failed to load configuration")?;
    init_tracing(&cli.base_dir, &config.logging)?;
    info!("fixja starting up: season '{}'", config.season.title);

    let output = match cli.command {
        Command::Plan {
            teams,
            days,
            max_per_day,
            min_per_day,
        } => commands::plan(&config, &teams, days, max_per_day, min_per_day)?,
        Command::RoundRobin { teams, rounds } => commands::round_robin(teams, rounds),
        Command::Finals { pools, bronze } => commands::finals(pools, bronze.as_deref())?,
        Command::Validate { file } => commands::validate(&file)?,
        Command::Build {
            structure,
            dated,
            start,
            rounds,
            offset,
            no_save,
            no_export,
        } => {
            let schedule = (dated || start.is_some() || rounds.is_some() || offset > 0)
                .then_some(Schedule {
                    start,
                    rounds,
                    offset,
                });
            commands::build_division(
                &config,
                &cli.base_dir,
                &structure,
                &BuildOptions {
                    save: !no_save,
                    export: !no_export,
                    schedule,
                },
            )?
        }
        Command::Divisions => {
            commands::list_divisions(&commands::open_database(&config, &cli.base_dir)?)?
        }
        Command::Matches { division } => {
            commands::list_matches(&commands::open_database(&config, &cli.base_dir)?, division)?
        }
        Command::Points {
            home,
            away,
            forfeit,
            bye,
        } => {
            let result = MatchResult {
                home_score: Some(home),
                away_score: Some(away),
                is_bye: bye,
                is_forfeit: forfeit.is_some(),
                forfeit_winner: forfeit.map(Side::from),
            };
            commands::points(&config, &result)?
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the configured
/// filter; an empty `logging.file` logs to stderr.
fn init_tracing(base_dir: &std::path::Path, logging: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    if logging.file.is_empty() {
        let subscriber = builder.with_writer(std::io::stderr).finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set tracing subscriber")?;
    } else {
        let path = commands::resolve_path(base_dir, &logging.file);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        let subscriber = builder.with_writer(log_file).with_ansi(false).finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set tracing subscriber")?;
    }

    Ok(())
}
