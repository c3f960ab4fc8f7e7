use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{self, config};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;
use std::fs;
use tt_assets::AssetManager;
use tt_codec::IndexCodec;
use tt_markup::Document;

pub struct RepackIndexArgs {
    pub input: String,
    pub output: Option<String>,
    pub archive: bool,
}

fn asset_manager() -> Result<AssetManager> {
    let mut cfg = config::load_config();
    Ok(AssetManager::new(utils::game_layout(&mut cfg)?))
}

pub fn backup_index() -> Result<()> {
    let manager = asset_manager()?;
    let backup = manager.layout().index_backup();
    if manager.backup_index().map_err(CliError::from)? {
        println_pad!("{} {}", "✅ Index backed up to".bright_green().bold(), backup.as_str().bright_white());
    } else {
        println_pad!("{} {}", "⚠️  Backup already exists:".bright_yellow(), backup.as_str().bright_white());
    }
    Ok(())
}

pub fn restore_index() -> Result<()> {
    let manager = asset_manager()?;
    if manager.restore_index().map_err(CliError::from)? {
        println_pad!("{}", "✅ Index restored from backup".bright_green().bold());
    } else {
        println_pad!("{}", "Index already matches the backup".bright_white());
    }
    Ok(())
}

pub fn unpack_index(output: Option<String>) -> Result<()> {
    let manager = asset_manager()?;
    let layout = manager.layout();

    let mut codec = IndexCodec::new();
    let payload = codec
        .load(layout.index_file().as_std_path())
        .map_err(CliError::from)?;

    let output = output
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| layout.readable_index());
    if let Some(parent) = output.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CliError::io(parent.as_std_path(), e))?;
    }
    fs::write(&output, &payload).map_err(|e| CliError::io(output.as_std_path(), e))?;

    println_pad!(
        "{} {} {}",
        "✅ Index decoded to".bright_green().bold(),
        output.as_str().bright_white().bold(),
        (if codec.was_archived() { "(archived)" } else { "(plain)" }).dimmed()
    );
    Ok(())
}

pub fn repack_index(args: RepackIndexArgs) -> Result<()> {
    let input = Utf8PathBuf::from(&args.input);
    if !input.is_file() {
        return Err(CliError::file_not_found(input.into_std_path_buf()).into());
    }
    Document::open(&input).map_err(CliError::from)?;
    let text = fs::read_to_string(&input).map_err(|e| CliError::io(input.as_std_path(), e))?;

    let output = match args.output {
        Some(output) => Utf8PathBuf::from(output),
        None => {
            let manager = asset_manager()?;
            manager.backup_index().map_err(CliError::from)?;
            manager.layout().index_file()
        }
    };

    IndexCodec::new()
        .save(output.as_std_path(), text.as_bytes(), Some(args.archive))
        .map_err(CliError::from)?;

    println_pad!(
        "{} {}",
        "✅ Index encoded to".bright_green().bold(),
        output.as_str().bright_white().bold()
    );
    Ok(())
}
