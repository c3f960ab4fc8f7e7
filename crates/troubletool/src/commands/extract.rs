use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{self, config};
use colored::Colorize;
use miette::Result;
use tt_assets::{AssetManager, ExtractProgress, ExtractRequest, ExtractStage, ExtractionReport, MatchMode};

pub struct ExtractAssetsArgs {
    pub paths: Option<String>,
    pub exact: bool,
}

pub fn extract_assets(args: ExtractAssetsArgs) -> Result<()> {
    let mut cfg = config::load_config();
    let layout = utils::game_layout(&mut cfg)?;

    let text = match args.paths {
        Some(paths) => {
            if cfg.manual_extract.as_deref() != Some(paths.as_str()) {
                cfg.manual_extract = Some(paths.clone());
                if let Err(e) = config::save_config(&cfg) {
                    tracing::warn!("Failed to remember extract request: {}", e);
                }
            }
            paths
        }
        None => cfg.manual_extract.clone().ok_or(CliError::EmptyExtractRequest)?,
    };

    let mode = if args.exact { MatchMode::Exact } else { MatchMode::Prefix };
    let request = ExtractRequest::parse(&text, mode);
    if request.is_empty() {
        return Err(CliError::EmptyExtractRequest.into());
    }

    println_pad!(
        "{} {}",
        "📦 Extracting:".bright_blue().bold(),
        request.targets().iter().cloned().collect::<Vec<_>>().join(", ").bright_cyan()
    );

    let mut manager = AssetManager::new(layout).with_progress(print_progress);
    if let Some(workers) = cfg.workers {
        manager = manager.with_workers(workers);
    }
    let report = manager.extract(&request).map_err(CliError::from)?;
    print_report(&report);

    Ok(())
}

fn print_progress(progress: ExtractProgress) {
    match progress.stage {
        ExtractStage::LoadingIndex => println_pad!("{}", "🔓 Loading index...".bright_yellow()),
        ExtractStage::Scanning => println_pad!("{}", "🔍 Scanning entries...".bright_yellow()),
        ExtractStage::Extracting if progress.current == progress.total => {
            println_pad!("{} {} entries", "📁 Processed".bright_yellow(), progress.total)
        }
        ExtractStage::SavingIndex => println_pad!("{}", "💾 Saving index...".bright_yellow()),
        _ => {}
    }
}

pub(crate) fn print_report(report: &ExtractionReport) {
    println_pad!(
        "{} {}  {} {}  {} {}",
        "extracted:".bright_green(),
        report.extracted.len(),
        "skipped:".bright_white(),
        report.skipped.len(),
        "failed:".bright_red(),
        report.failed.len()
    );
    for failed in &report.failed {
        println_pad!("{} {}: {}", "•".bright_red(), failed.original, failed.message);
    }
    for target in &report.unmatched {
        println_pad!("{} {} {}", "•".bright_yellow(), "no match for".bright_yellow(), target);
    }
    if report.index_saved {
        println_pad!("{}", "✅ Index updated".bright_green().bold());
    }
    println_pad!("{} {:.2?}", "⏱ Took".dimmed(), report.elapsed);
}
