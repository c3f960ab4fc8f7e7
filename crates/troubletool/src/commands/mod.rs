mod config;
mod extract;
mod index;
mod mods;

pub use config::{auto_detect_game_path, set_game_path, show_config};
pub use extract::{extract_assets, ExtractAssetsArgs};
pub use index::{backup_index, repack_index, restore_index, unpack_index, RepackIndexArgs};
pub use mods::{create_patch, install_mods, list_mods, ModSelectionArgs};
