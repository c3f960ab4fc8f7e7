use crate::errors::CliError;
use crate::utils::config::AppConfig;
use miette::Result;
use tt_assets::GameLayout;
use tt_mod_core::{auto_detect_game_path, is_valid_game_path};

pub mod config;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// Split a comma separated list, dropping empty items.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// The configured game layout, auto-detecting (and remembering) the game
/// path when none is configured.
pub fn game_layout(cfg: &mut AppConfig) -> Result<GameLayout> {
    if let Some(path) = &cfg.game_path {
        if !is_valid_game_path(path) {
            return Err(CliError::invalid_game_path(path.as_std_path()).into());
        }
        return Ok(GameLayout::new(path.clone()));
    }

    let detected = auto_detect_game_path().ok_or(CliError::GamePathNotSet)?;
    cfg.game_path = Some(detected.clone());
    if let Err(e) = config::save_config(cfg) {
        tracing::warn!("Failed to remember detected game path: {}", e);
    }
    Ok(GameLayout::new(detected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_empty() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list(" , ").is_empty());
    }
}
