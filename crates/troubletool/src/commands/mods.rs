use crate::println_pad;
use crate::errors::CliError;
use crate::utils::{self, config};
use colored::Colorize;
use miette::Result;
use tt_assets::GameLayout;
use tt_mod_core::{ModSession, ModSettings, SessionReport, SETTINGS_FILE};

use super::extract::print_report;

pub struct ModSelectionArgs {
    /// Comma separated mod names. Enabled mods from the settings when unset.
    pub mods: Option<String>,
}

/// Load the settings document and reconcile it with the mod folders.
fn load_settings(layout: &GameLayout) -> Result<ModSettings> {
    let mods_dir = layout.mods_dir();
    let mut settings = ModSettings::load(mods_dir.join(SETTINGS_FILE)).map_err(CliError::from)?;
    let before = settings.mods.clone();
    let added = settings.discover(&mods_dir).map_err(CliError::from)?;
    for name in &added {
        println_pad!("{} {}", "➕ New mod found:".bright_cyan(), name.bright_white());
    }
    if settings.mods != before {
        settings.save().map_err(CliError::from)?;
    }
    Ok(settings)
}

pub fn list_mods(enable: Vec<String>, disable: Vec<String>) -> Result<()> {
    let mut cfg = config::load_config();
    let layout = utils::game_layout(&mut cfg)?;
    let mut settings = load_settings(&layout)?;

    let mut changed = false;
    for (names, enabled) in [(&enable, true), (&disable, false)] {
        for name in names {
            if settings.set_enabled(name, enabled) {
                changed = true;
            } else {
                println_pad!("{} {}", "⚠️  Unknown mod:".bright_yellow(), name);
            }
        }
    }
    if changed {
        settings.save().map_err(CliError::from)?;
    }

    if settings.mods.is_empty() {
        println_pad!("{} {}", "No mods in".bright_yellow(), layout.mods_dir().as_str().bright_white());
        return Ok(());
    }
    for (position, entry) in settings.mods.iter().enumerate() {
        let status = if entry.enabled {
            "✓".bright_green()
        } else {
            "✗".bright_red()
        };
        println_pad!("{:>3}. {} {}", position + 1, status, entry.name.bright_white());
    }
    Ok(())
}

fn session_and_names(args: ModSelectionArgs) -> Result<Option<(ModSession, Vec<String>)>> {
    let mut cfg = config::load_config();
    let layout = utils::game_layout(&mut cfg)?;

    let names = match args.mods {
        Some(mods) => utils::split_list(&mods),
        None => load_settings(&layout)?.enabled(),
    };
    if names.is_empty() {
        println_pad!("{}", "⚠️  No mods selected or enabled".bright_yellow());
        return Ok(None);
    }

    let mut session = ModSession::new(layout).with_auto_extract(cfg.auto_extract.clone());
    if let Some(workers) = cfg.workers {
        session = session.with_workers(workers);
    }
    Ok(Some((session, names)))
}

pub fn install_mods(args: ModSelectionArgs) -> Result<()> {
    let Some((mut session, names)) = session_and_names(args)? else {
        return Ok(());
    };
    println_pad!("{} {}", "🧩 Installing:".bright_blue().bold(), names.join(", ").bright_cyan());

    let report = session.install(&names).map_err(CliError::from)?;
    print_session_report(&report, "written", report.written.len());
    Ok(())
}

pub fn create_patch(args: ModSelectionArgs) -> Result<()> {
    let Some((mut session, names)) = session_and_names(args)? else {
        return Ok(());
    };
    println_pad!("{} {}", "📝 Creating patches for:".bright_blue().bold(), names.join(", ").bright_cyan());

    let report = session.create_patch(&names).map_err(CliError::from)?;
    print_session_report(&report, "rewritten", report.patches.len());
    Ok(())
}

fn print_session_report(report: &SessionReport, verb: &str, count: usize) {
    if let Some(extraction) = &report.extraction {
        print_report(extraction);
    }
    println_pad!(
        "{} {} {}  {} {}",
        format!("{}:", verb).bright_green(),
        count,
        "files".dimmed(),
        "failed:".bright_red(),
        report.failed.len()
    );
    for failed in &report.failed {
        println_pad!("{} {}: {}", "•".bright_red(), failed.path.display(), failed.message);
    }
    if report.failed.is_empty() && !report.mods.is_empty() {
        println_pad!("{}", "✅ Done!".bright_green().bold());
    }
}
