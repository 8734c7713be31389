use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::eyre;
use commands::{clear, config, rate, show, undo, watch, MediaArgs};
use media_sync_config::{Config, PathManager};
use media_sync_models::PartialDate;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "watchsync")]
#[command(about = "WatchSync - Keep your watch lists in step with what you actually watched")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Service to act on (defaults to the primary service)
    #[arg(long, global = true)]
    service: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a finished movie or episode
    #[command(long_about = "Record that a movie or an episode was watched to the end. The list entry is fetched first and only moved forward: re-watching an old episode changes nothing, episode 1 of a completed show starts a rewatch.")]
    Watch {
        #[command(flatten)]
        media: MediaArgs,

        /// Episode that was watched (shows only)
        #[arg(short, long)]
        episode: Option<u32>,

        /// Number of episodes in the show, if known
        #[arg(long)]
        total_episodes: Option<u32>,

        /// Date the view finished: YYYY, YYYY-MM or YYYY-MM-DD (defaults to today)
        #[arg(long, value_parser = watch::parse_date)]
        date: Option<PartialDate>,
    },
    /// Undo the last recorded watch
    #[command(long_about = "Revert the most recent watch recorded for an item, using the list entry as it is now. Undoing the start of a rewatch restores the original completion date.")]
    Undo {
        #[command(flatten)]
        media: MediaArgs,
    },
    /// Rate an item from 1 to 10
    #[command(long_about = "Store a 1-10 rating. It is converted to the score format configured for the service (e.g. 8 becomes 80 on a 100 point scale).")]
    Rate {
        #[command(flatten)]
        media: MediaArgs,

        /// Rating from 1 to 10
        #[arg(value_parser = clap::value_parser!(u8).range(1..=10))]
        rating: u8,
    },
    /// List the entries of a service's list
    Show,
    /// Show or create the configuration
    #[command(long_about = "Manage the WatchSync configuration file. Running without a subcommand shows the current configuration.")]
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
    /// Clear stored lists and rewatch history
    #[command(long_about = "Clear locally stored data. Use --lists to empty the local lists, --original-dates to forget completion dates kept for undoing rewatches, or --all for both.")]
    Clear {
        /// Clear everything
        #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["lists", "original_dates"])]
        all: bool,

        /// Empty the local lists
        #[arg(long, action = ArgAction::SetTrue)]
        lists: bool,

        /// Forget stashed original completion dates
        #[arg(long, action = ArgAction::SetTrue)]
        original_dates: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing configuration file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Print where configuration, data and logs are kept
    Paths,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let paths = PathManager::default();
    let config_file = paths.config_file();
    let app_config = Config::load_or_default(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;

    logging::init_logging(cli.verbose, cli.quiet, &app_config.logging).map_err(|e| eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);
    let service = cli.service.as_deref();

    match cli.command {
        Commands::Watch {
            media,
            episode,
            total_episodes,
            date,
        } => {
            watch::run_watch(&app_config, &paths, service, &media, episode, total_episodes, date, &output).await
        }
        Commands::Undo { media } => undo::run_undo(&app_config, &paths, service, &media, &output).await,
        Commands::Rate { media, rating } => {
            rate::run_rate(&app_config, &paths, service, &media, rating, &output).await
        }
        Commands::Show => show::run_show(&app_config, &paths, service, &output).await,
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show);
            config::run_config(cmd, &app_config, &paths, &output)
        }
        Commands::Clear {
            all,
            lists,
            original_dates,
        } => clear::run_clear(&app_config, &paths, all, lists, original_dates, &output).await,
    }
}
