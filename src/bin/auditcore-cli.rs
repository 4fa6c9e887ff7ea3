//! auditcore CLI - compliance pipeline automation
//!
//! Provides command-line access to:
//! - Document ingestion into the policy library
//! - Standards catalog import
//! - Policy-to-control mapping
//! - Scheduled assessment runs
//!
//! Usage:
//!   auditcore-cli ingest <file>
//!   auditcore-cli import-standard <name> <xlsx>
//!   auditcore-cli map-control <control_id> [--attach]
//!   auditcore-cli run-schedule <schedule_id>
//!   auditcore-cli stats

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use auditcore::ai::HttpEmbeddingClient;
use auditcore::config::{default_db_path, ServiceConfig};
use auditcore::db::Database;
use auditcore::ingest::{DocumentIngestor, StandardImporter};
use auditcore::mapping::{MapOutcome, PolicyMapper};
use auditcore::schedule::ScheduleEngine;

/// CLI command structure
#[derive(Debug)]
enum Command {
    Ingest { file: PathBuf },
    ImportStandard { name: String, file: PathBuf },
    MapControl { control_id: String, attach: bool },
    RunSchedule { schedule_id: String },
    Stats,
    Help,
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    match parse_args(&args) {
        Ok(cmd) => match run_command(cmd).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    if args.len() < 2 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "help" | "--help" | "-h" => Ok(Command::Help),
        "version" | "--version" | "-V" => Ok(Command::Version),

        "ingest" => {
            let file = args
                .get(2)
                .map(PathBuf::from)
                .ok_or("Missing file path. Use: ingest <file>")?;
            Ok(Command::Ingest { file })
        }

        "import-standard" => {
            let name = args
                .get(2)
                .cloned()
                .ok_or("Missing standard name. Use: import-standard <name> <xlsx>")?;
            let file = args
                .get(3)
                .map(PathBuf::from)
                .ok_or("Missing xlsx path. Use: import-standard <name> <xlsx>")?;
            Ok(Command::ImportStandard { name, file })
        }

        "map-control" => {
            let control_id = args
                .get(2)
                .cloned()
                .ok_or("Missing control id. Use: map-control <control_id> [--attach]")?;
            let attach = args.iter().any(|a| a == "--attach" || a == "-a");
            Ok(Command::MapControl { control_id, attach })
        }

        "run-schedule" => {
            let schedule_id = args
                .get(2)
                .cloned()
                .ok_or("Missing schedule id. Use: run-schedule <schedule_id>")?;
            Ok(Command::RunSchedule { schedule_id })
        }

        "stats" => Ok(Command::Stats),

        other => Err(format!("Unknown command: {}", other)),
    }
}

async fn run_command(cmd: Command) -> Result<(), String> {
    match cmd {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            println!("auditcore-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Ingest { file } => run_ingest(&file).await,
        Command::ImportStandard { name, file } => run_import_standard(&name, &file).await,
        Command::MapControl { control_id, attach } => run_map_control(&control_id, attach).await,
        Command::RunSchedule { schedule_id } => run_schedule(&schedule_id),
        Command::Stats => run_stats(),
    }
}

fn print_help() {
    println!(
        r#"auditcore CLI - compliance pipeline automation

USAGE:
    auditcore-cli <COMMAND> [OPTIONS]

COMMANDS:
    ingest <FILE>                   Ingest a policy document (pdf, txt, md)

    import-standard <NAME> <XLSX>   Import a control catalog spreadsheet

    map-control <ID>                Scan the policy library for a control
        --attach, -a                Attach the best match as Pending evidence

    run-schedule <ID>               Run a scheduled assessment now

    stats                           Show library statistics

    help                            Show this help message
    version                         Show version information

ENVIRONMENT:
    EMBEDDING_API_KEY    Required for ingest/import-standard/map-control
    MODEL_API_KEY        Required for evidence validation
    AUDITCORE_DB         Database path (defaults to the user data dir)

EXAMPLES:
    auditcore-cli ingest ./policies/access-control.pdf
    auditcore-cli import-standard "CMMC Level 1" ./catalogs/cmmc-l1.xlsx
    auditcore-cli map-control 4f1c... --attach
    auditcore-cli run-schedule 9a2b...
"#
    );
}

fn open_database(path: &std::path::Path) -> Result<Database, String> {
    let db = Database::open(path).map_err(|e| format!("Failed to open database: {}", e))?;
    db.initialize()
        .map_err(|e| format!("Failed to initialize database: {}", e))?;
    Ok(db)
}

/// DB path for commands that do not need service credentials
fn db_path_from_env() -> PathBuf {
    env::var("AUDITCORE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_db_path())
}

async fn run_ingest(file: &std::path::Path) -> Result<(), String> {
    let config = ServiceConfig::from_env().map_err(|e| e.to_string())?;
    let db = open_database(&config.db_path)?;
    let embedder = HttpEmbeddingClient::new(&config).map_err(|e| e.to_string())?;

    let summary = DocumentIngestor::new(&db, &embedder)
        .ingest_file(file)
        .await
        .map_err(|e| e.to_string())?;

    println!(
        "Ingested document {} ({} chunks)",
        summary.document_id, summary.chunk_count
    );
    Ok(())
}

async fn run_import_standard(name: &str, file: &std::path::Path) -> Result<(), String> {
    let config = ServiceConfig::from_env().map_err(|e| e.to_string())?;
    let db = open_database(&config.db_path)?;
    let embedder = HttpEmbeddingClient::new(&config).map_err(|e| e.to_string())?;

    let summary = StandardImporter::new(&db, &embedder)
        .import_xlsx(file, name)
        .await
        .map_err(|e| e.to_string())?;

    println!(
        "Imported standard {} ({} controls, {} rows skipped)",
        summary.standard_id, summary.imported, summary.skipped
    );
    Ok(())
}

async fn run_map_control(control_id: &str, attach: bool) -> Result<(), String> {
    let config = ServiceConfig::from_env().map_err(|e| e.to_string())?;
    let db = open_database(&config.db_path)?;
    let embedder = HttpEmbeddingClient::new(&config).map_err(|e| e.to_string())?;

    let mapper = PolicyMapper::new(&db, &embedder);
    match mapper.map_control(control_id).await.map_err(|e| e.to_string())? {
        MapOutcome::NotFound => {
            println!("No matching policy section found.");
        }
        MapOutcome::Found(policy_match) => {
            println!(
                "Matched '{}' ({}% confidence)",
                policy_match.document_name, policy_match.confidence
            );
            if attach {
                let evidence = mapper
                    .attach_evidence(control_id, &policy_match)
                    .map_err(|e| e.to_string())?;
                println!("Attached as Pending evidence {}", evidence.id);
            }
        }
    }
    Ok(())
}

fn run_schedule(schedule_id: &str) -> Result<(), String> {
    let db = open_database(&db_path_from_env())?;

    let summary = ScheduleEngine::new(&db)
        .run(schedule_id)
        .map_err(|e| e.to_string())?;

    println!(
        "Created assessment {} ({} controls cloned, next run {})",
        summary.assessment_id, summary.controls_cloned, summary.next_run
    );
    Ok(())
}

fn run_stats() -> Result<(), String> {
    let db = open_database(&db_path_from_env())?;

    let documents = db.document_count().map_err(|e| e.to_string())?;
    let chunks = db.chunk_count().map_err(|e| e.to_string())?;

    println!("Policy library:");
    println!("  Documents: {}", documents);
    println!("  Chunks:    {}", chunks);
    Ok(())
}
