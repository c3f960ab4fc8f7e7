use crate::errors::CliError;
use crate::utils::config::{self, AppConfig};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;
use tt_mod_core::{game_path, is_valid_game_path};

fn update_game_path_in_config(path: Utf8PathBuf) -> Result<()> {
    let mut cfg = config::load_config();
    cfg.game_path = Some(path);
    save(&cfg)
}

fn save(cfg: &AppConfig) -> Result<()> {
    config::save_config(cfg).map_err(|source| CliError::ConfigSave { source }.into())
}

pub fn show_config() -> Result<()> {
    let cfg = config::load_config();
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!();
    println!("  {} {}", "config_file:".bright_white(), config_path);

    match &cfg.game_path {
        Some(p) => {
            let status = if is_valid_game_path(p) {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            println!("  {} {} {}", "game_path:".bright_white(), p, status);
        }
        None => println!("  {} {}", "game_path:".bright_white(), "(not set)".bright_yellow()),
    }

    println!("  {} {}", "auto_extract:".bright_white(), cfg.auto_extract.join(", "));
    println!(
        "  {} {}",
        "manual_extract:".bright_white(),
        cfg.manual_extract.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  {} {}",
        "workers:".bright_white(),
        cfg.workers
            .map(|w| w.to_string())
            .unwrap_or_else(|| "(one per core)".to_string())
    );
    println!();
    Ok(())
}

pub fn set_game_path(path: String) -> Result<()> {
    let path = Utf8PathBuf::from(&path);
    if !is_valid_game_path(&path) {
        eprintln!(
            "  {}",
            "The path must point to the Troubleshooter game folder.".bright_yellow()
        );
        eprintln!(
            "  {}",
            "Example: C:\\Program Files (x86)\\Steam\\steamapps\\common\\Troubleshooter".bright_yellow()
        );
        eprintln!();
        eprintln!("  {} The folder does not exist", "•".bright_red());
        eprintln!("  {} The folder has no 'Package' directory", "•".bright_red());

        return Err(CliError::invalid_game_path(path.into_std_path_buf()).into());
    }

    update_game_path_in_config(path.clone())?;

    println!("{}", "✓ Game path set successfully!".bright_green().bold());
    println!();
    println!("  {} {}", "Path:".bright_white().bold(), path.as_str().bright_green());

    Ok(())
}

pub fn auto_detect_game_path() -> Result<()> {
    println!("{}", "Searching Steam libraries for Troubleshooter...".bright_cyan());
    println!();

    match game_path::auto_detect_game_path() {
        Some(detected_path) => {
            println!("{}", "✓ Found Troubleshooter!".bright_green().bold());
            println!();
            println!(
                "  {} {}",
                "Path:".bright_white().bold(),
                detected_path.as_str().bright_green()
            );
            println!();

            update_game_path_in_config(detected_path)?;

            println!("{}", "✓ Configuration updated successfully!".bright_green().bold());
        }
        None => {
            println!(
                "{}",
                "✗ Could not automatically detect a Troubleshooter installation"
                    .bright_red()
                    .bold()
            );
            println!();
            println!(
                "  {} Use 'troubletool config set-game-path <dir>' to set the path manually",
                "•".bright_cyan()
            );
        }
    }

    Ok(())
}
