use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    auto_detect_game_path, backup_index, create_patch, extract_assets, install_mods, list_mods,
    repack_index, restore_index, set_game_path, show_config, unpack_index, ExtractAssetsArgs,
    ModSelectionArgs, RepackIndexArgs,
};
use miette::Result;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract packed assets to the Data folder
    Extract {
        /// Comma separated logical paths. Reuses the last request when omitted
        paths: Option<String>,

        /// Match whole paths instead of prefixes
        #[arg(long)]
        exact: bool,
    },
    /// Merge mods into the game files
    Install {
        /// Comma separated mod names, defaults to the enabled mods
        #[arg(short, long)]
        mods: Option<String>,
    },
    /// Rewrite mod files as patch scripts against the current game files
    CreatePatch {
        /// Comma separated mod names, defaults to the enabled mods
        #[arg(short, long)]
        mods: Option<String>,
    },
    /// List mods in priority order, optionally toggling them
    Mods {
        #[arg(long, value_delimiter = ',')]
        enable: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        disable: Vec<String>,
    },
    /// Copy Package/index to Package/index.backup
    BackupIndex,
    /// Restore Package/index from its backup
    RestoreIndex,
    /// Decode the index to readable markup
    UnpackIndex {
        /// Output file, defaults to Data/index.xml
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Encode readable markup back into an index
    RepackIndex {
        /// The markup file to encode
        input: String,

        /// Output file, defaults to Package/index (backed up first)
        #[arg(short, long)]
        output: Option<String>,

        /// Wrap the payload in a zip archive before encrypting
        #[arg(long)]
        archive: bool,
    },
    /// Show or change the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Set the game folder
    SetGamePath { path: String },
    /// Search the Steam libraries for the game
    AutoDetect,
}

fn parse_args() -> Args {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = parse_args();
    init_logging(args.verbose);

    match args.command {
        Commands::Extract { paths, exact } => extract_assets(ExtractAssetsArgs { paths, exact }),
        Commands::Install { mods } => install_mods(ModSelectionArgs { mods }),
        Commands::CreatePatch { mods } => create_patch(ModSelectionArgs { mods }),
        Commands::Mods { enable, disable } => list_mods(enable, disable),
        Commands::BackupIndex => backup_index(),
        Commands::RestoreIndex => restore_index(),
        Commands::UnpackIndex { output } => unpack_index(output),
        Commands::RepackIndex {
            input,
            output,
            archive,
        } => repack_index(RepackIndexArgs {
            input,
            output,
            archive,
        }),
        Commands::Config { command } => match command {
            ConfigCommands::Show => show_config(),
            ConfigCommands::SetGamePath { path } => set_game_path(path),
            ConfigCommands::AutoDetect => auto_detect_game_path(),
        },
    }
}
