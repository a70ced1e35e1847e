mod commands;
mod filter;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use filter::EntryFilter;
use issue_indexer_core::config::non_overlapping_directories;
use issue_indexer_core::registry::Registry;
use issue_indexer_core::scanner::{discover, discover_files, discover_files_within};
use issue_indexer_core::{
    AppConfig, BatchRename, EntryStatus, FsRenamer, GeminiExtractor, IndexEngine, LibraryEntry,
    ProgressReporter, ScriptKind,
};
use progress::CliReporter;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let guard = logging::init_logger();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            drop(guard);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Scan { paths, retries }) => run_scan(&config, &paths, retries).await,
        Some(Commands::Rename {
            paths,
            yes,
            script,
            shell,
            python,
        }) => {
            let kind = if python {
                ScriptKind::Python
            } else if shell {
                ScriptKind::Shell
            } else {
                ScriptKind::Batch
            };
            run_rename(&config, &paths, yes, script.as_deref(), kind).await
        }
        Some(Commands::Edit {
            file,
            new_name,
            paths,
        }) => run_edit(&config, &paths, &file, &new_name).await,
        Some(Commands::List {
            paths,
            section,
            system,
            content_type,
            search,
            all,
        }) => {
            let filter = EntryFilter {
                section,
                system,
                content_type,
                search,
                include_pending: all,
            };
            run_list(&config, &paths, &filter).await
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        Some(Commands::Reset { yes }) => run_reset(&config, yes).await,
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }
}

async fn run_scan(config: &AppConfig, paths: &[String], retries: usize) -> Result<()> {
    let reporter = CliReporter::new();
    let mut engine = open_session(config, paths, &reporter).await?;

    let admissible = engine
        .store()
        .entries()
        .iter()
        .filter(|e| e.is_admissible())
        .count();
    if admissible == 0 {
        info!("Nothing to analyze, every file is already known");
    } else {
        let api_key = config
            .api_key()
            .context("No API key configured; set INDEXER__EXTRACTOR__API_KEY or API_KEY")?;
        let extractor = Arc::new(GeminiExtractor::new(&config.extractor, api_key)?);

        engine.run_analysis(extractor.clone(), &reporter).await;
        for round in 1..=retries {
            if engine.retry_errors() == 0 {
                break;
            }
            info!("Retry round {} of {}", round, retries);
            engine.run_analysis(extractor.clone(), &reporter).await;
        }
    }

    save_registry(config, &engine).await?;
    print_status_summary(engine.store().entries());

    let to_rename = engine
        .store()
        .entries()
        .iter()
        .filter(|e| e.needs_rename())
        .count();
    if to_rename > 0 {
        info!(
            "Run {} to apply {} suggested names",
            "issue-indexer rename".cyan(),
            format!("{}", to_rename).green()
        );
    }
    Ok(())
}

async fn run_rename(
    config: &AppConfig,
    paths: &[String],
    yes: bool,
    script: Option<&Path>,
    kind: ScriptKind,
) -> Result<()> {
    let reporter = CliReporter::new();
    let mut engine = open_session(config, paths, &reporter).await?;

    let to_rename = engine
        .store()
        .entries()
        .iter()
        .filter(|e| e.needs_rename())
        .count();
    if to_rename == 0 {
        info!("No analyzed files need a new name");
        return Ok(());
    }

    if let Some(target) = script {
        write_script(config, &mut engine, target, kind).await?;
        return save_registry(config, &engine).await;
    }

    if !yes && !prompt_confirm(&format!("Rename {} files?", to_rename), Some(false))? {
        info!("Rename cancelled");
        return Ok(());
    }

    match engine.rename_batch(&FsRenamer, &reporter).await {
        BatchRename::Offline { pending } => {
            warn!(
                "No write access to the scanned files; generating an offline script for {} files",
                pending
            );
            write_script(config, &mut engine, Path::new(kind.file_name()), kind).await?;
        }
        BatchRename::Completed(report) => {
            info!(
                "{} renamed, {} failed",
                format!("{}", report.renamed.len()).green(),
                format!("{}", report.failed.len()).red()
            );
            for (id, reason) in &report.failed {
                let name = engine
                    .store()
                    .get(*id)
                    .map(|e| e.original_name.as_str())
                    .unwrap_or("?");
                warn!("{}: {}", name.red(), reason);
            }
        }
    }

    save_registry(config, &engine).await
}

async fn run_edit(config: &AppConfig, paths: &[String], file: &str, new_name: &str) -> Result<()> {
    if new_name.trim().is_empty() {
        bail!("The new name cannot be empty");
    }
    let reporter = CliReporter::new();
    let mut engine = open_session(config, paths, &reporter).await?;

    let Some(id) = engine.find(file) else {
        bail!("No cataloged file matches '{}'", file);
    };
    engine.manual_edit(id, new_name)?;
    save_registry(config, &engine).await?;

    info!("{} -> {}", file.cyan(), new_name.trim().green());
    Ok(())
}

async fn run_list(config: &AppConfig, paths: &[String], filter: &EntryFilter) -> Result<()> {
    let reporter = CliReporter::new();
    let engine = open_session(config, paths, &reporter).await?;

    let shown: Vec<&LibraryEntry> = engine
        .store()
        .entries()
        .iter()
        .filter(|e| filter.matches(e))
        .collect();

    for entry in &shown {
        let updated = entry
            .log
            .last()
            .map(|line| line.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:<9} {} -> {}  {}",
            colored_status(entry.status),
            entry.relative_path,
            entry.suggested_name.bold(),
            updated.dimmed()
        );
        if let Some(meta) = &entry.metadata {
            println!(
                "          [{}] ({}) {} - {}",
                meta.rpg_system, meta.content_type, meta.magazine_section, meta.official_title
            );
        }
        if let Some(reason) = &entry.last_error {
            println!("          {}", reason.red());
        }
    }

    info!("{} of {} entries shown", shown.len(), engine.store().len());
    Ok(())
}

async fn run_reset(config: &AppConfig, yes: bool) -> Result<()> {
    let registry_path = Path::new(&config.registry_path);
    if !registry_path.exists() {
        info!("No registry at {}, nothing to reset", registry_path.display());
        return Ok(());
    }

    if !yes
        && !prompt_confirm(
            "Are you SURE you want to forget every cataloged issue?",
            Some(false),
        )?
    {
        return Ok(());
    }

    tokio::fs::remove_file(registry_path)
        .await
        .with_context(|| format!("Failed to remove {}", registry_path.display()))?;
    info!("Registry {} removed", registry_path.display());
    Ok(())
}

/// Build a session: import the registry file if present, then discover every
/// requested path and merge it against that history.
async fn open_session(
    config: &AppConfig,
    paths: &[String],
    reporter: &dyn ProgressReporter,
) -> Result<IndexEngine> {
    let mut engine = IndexEngine::new(config);

    if let Some(json) = read_registry(&config.registry_path).await? {
        engine
            .import_registry(&json)
            .with_context(|| format!("Registry {} could not be imported", config.registry_path))?;
    }

    let requested = if paths.is_empty() {
        config.root_paths.clone()
    } else {
        paths.to_vec()
    };
    if requested.is_empty() {
        bail!("No paths given and no root_paths configured");
    }

    let mut selected_files = Vec::new();
    let mut added = 0;
    let mut restored = 0;
    for path in non_overlapping_directories(requested) {
        let path = PathBuf::from(path);
        if path.is_dir() {
            let files = discover(&path, &config.ignore_patterns, config.read_only)?;
            let result = engine.load_discovered(files);
            added += result.added;
            restored += result.restored;
        } else {
            selected_files.push(path);
        }
    }
    if !selected_files.is_empty() {
        let files = match containing_root(config, &selected_files) {
            Some(root) => discover_files_within(&root, &selected_files, config.read_only)?,
            None => discover_files(&selected_files, config.read_only)?,
        };
        let result = engine.load_discovered(files);
        added += result.added;
        restored += result.restored;
    }

    reporter.on_discovery_complete(added, restored);
    Ok(engine)
}

/// The configured root holding every selected file, so single files keep the
/// fingerprint a folder scan gives them.
fn containing_root(config: &AppConfig, files: &[PathBuf]) -> Option<PathBuf> {
    let files: Vec<PathBuf> = files
        .iter()
        .filter_map(|f| std::fs::canonicalize(f).ok())
        .collect();
    config
        .root_paths
        .iter()
        .filter_map(|root| std::fs::canonicalize(root).ok())
        .find(|root| !files.is_empty() && files.iter().all(|f| f.starts_with(root)))
}

async fn read_registry(path: &str) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => Ok(Some(json)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("Failed to read registry {}", path)),
    }
}

async fn save_registry(config: &AppConfig, engine: &IndexEngine) -> Result<()> {
    let records = engine.export_registry(Utc::now());
    let json = Registry::to_json_pretty(&records)?;
    tokio::fs::write(&config.registry_path, json)
        .await
        .with_context(|| format!("Failed to write registry {}", config.registry_path))?;
    info!(
        "{} records written to {} ({} from this session)",
        records.len(),
        config.registry_path,
        engine.store().len()
    );
    Ok(())
}

async fn write_script(
    config: &AppConfig,
    engine: &mut IndexEngine,
    target: &Path,
    kind: ScriptKind,
) -> Result<()> {
    let script = engine.rename_script(kind);
    tokio::fs::write(target, script)
        .await
        .with_context(|| format!("Failed to write script {}", target.display()))?;
    let marked = engine.mark_script_renamed(kind);
    info!(
        "Script {} written for {} files; run it from the scanned folder",
        target.display().to_string().cyan(),
        marked
    );
    if kind == ScriptKind::Python {
        info!(
            "Run it as: python3 {} {}",
            target.display(),
            config.registry_path
        );
    }
    Ok(())
}

fn print_status_summary(entries: &[LibraryEntry]) {
    let count = |status: EntryStatus| entries.iter().filter(|e| e.status == status).count();
    info!(
        "{} done, {} renamed, {} failed, {} pending",
        format!("{}", count(EntryStatus::Done)).green(),
        format!("{}", count(EntryStatus::Renamed)).cyan(),
        format!("{}", count(EntryStatus::Error)).red(),
        format!("{}", count(EntryStatus::Pending)).yellow(),
    );
}

fn colored_status(status: EntryStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        EntryStatus::Done => label.green(),
        EntryStatus::Renamed => label.cyan(),
        EntryStatus::Error => label.red(),
        EntryStatus::Pending | EntryStatus::Analyzing => label.yellow(),
        EntryStatus::Skipped => label.dimmed(),
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
