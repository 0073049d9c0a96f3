//! Command-line host that scans one media root and prints a summary.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use vaultscan::{
    app_dirs, config, logging,
    media_roots::{FastHasher, MediaRoot, RootId, SqliteScanStore},
    scanner::{
        MediaFileProcessor, NullExtractor, ResumeOutcome, ScanCallbacks, ScanOptions,
        ScanOrchestrator, ScanStatus,
    },
};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

struct Options {
    root: PathBuf,
    incremental: bool,
    resume: bool,
    db_path: Option<PathBuf>,
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let settings = config::load_or_default().map_err(|err| err.to_string())?;
    let db_path = match options.db_path.or_else(|| settings.store_path.clone()) {
        Some(path) => path,
        None => app_dirs::default_scan_db_path().map_err(|err| err.to_string())?,
    };
    let store = SqliteScanStore::open(&db_path)
        .map_err(|err| format!("Open scan database {} failed: {err}", db_path.display()))?;

    let scan_options = ScanOptions::from(&settings);
    let processor = MediaFileProcessor::new(
        FastHasher::new(scan_options.hash_chunk_bytes),
        Box::new(NullExtractor),
    );
    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let callbacks = ScanCallbacks::new()
        .on_file(|outcome| {
            if let Some(error) = &outcome.error {
                eprintln!("  failed {}: {error}", outcome.relative_path.display());
            }
        })
        .on_classified(|_, summary| {
            println!(
                "Changes: {} new, {} modified, {} unchanged, {} deleted",
                summary.new, summary.modified, summary.unchanged, summary.deleted
            );
        })
        .on_error({
            let failure = Arc::clone(&failure);
            move |_, message| {
                if let Ok(mut slot) = failure.lock() {
                    *slot = Some(message.to_string());
                }
            }
        });
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store),
        Arc::new(processor),
        scan_options,
        callbacks,
    );

    let canonical = options
        .root
        .canonicalize()
        .map_err(|err| format!("Cannot open {}: {err}", options.root.display()))?;
    let root = MediaRoot::new_with_id(
        RootId::from_string(canonical.to_string_lossy()),
        canonical,
    );
    let root_id = root.id.clone();

    if options.resume {
        orchestrator.roots().register_root(root);
        match orchestrator.resume(&root_id).map_err(|err| err.to_string())? {
            ResumeOutcome::NothingToDo => {
                println!("Nothing to resume; the last scan completed.");
                return Ok(());
            }
            ResumeOutcome::Resumed(run_id) => println!("Resumed scan {run_id}"),
        }
    } else if options.incremental {
        orchestrator
            .start_incremental(root)
            .map_err(|err| err.to_string())?;
    } else {
        orchestrator.start(root).map_err(|err| err.to_string())?;
    }

    orchestrator.wait_idle(&root_id, Duration::MAX);
    if let Some(message) = failure.lock().ok().and_then(|slot| slot.clone()) {
        return Err(format!("Scan failed: {message}"));
    }
    let state = orchestrator
        .status(&root_id)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "Scan finished without saving state".to_string())?;
    let failed = state.progress.processed - state.outputs.len().min(state.progress.processed);
    let duplicates = state
        .outputs
        .iter()
        .filter(|asset| asset.duplicate_of.is_some())
        .count();
    println!(
        "{} {}: {}/{} files processed, {} failed, {} duplicates",
        state.root_name,
        state.status,
        state.progress.processed,
        state.progress.total,
        failed,
        duplicates
    );
    for warning in &state.warnings {
        println!("  warning: {warning}");
    }
    if state.status != ScanStatus::Completed {
        return Err(format!("Scan ended as {}", state.status));
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(None);
    }
    let mut root = None;
    let mut incremental = false;
    let mut resume = false;
    let mut db_path = None;
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--incremental" => incremental = true,
            "--resume" => resume = true,
            "--db" => {
                let value = it
                    .next()
                    .ok_or_else(|| "Missing value for --db".to_string())?;
                db_path = Some(PathBuf::from(value));
            }
            flag if flag.starts_with("--") => return Err(format!("Unknown argument: {arg}")),
            _ if root.is_none() => root = Some(PathBuf::from(arg)),
            _ => return Err(format!("Unexpected argument: {arg}")),
        }
    }
    let root = root.ok_or_else(|| "Missing media root; see --help".to_string())?;
    Ok(Some(Options {
        root,
        incremental,
        resume,
        db_path,
    }))
}

fn print_help() {
    println!("Usage: vaultscan <root> [--incremental | --resume] [--db <path>]");
    println!();
    println!("Options:");
    println!("  --incremental  Only process files that are new or changed since the last scan");
    println!("  --resume       Continue the last paused or interrupted scan of <root>");
    println!("  --db <path>    Scan database (defaults to the app data dir)");
}
