// ==========================================
// NEXO work-planning - command line entry point
// ==========================================
// Thin shell over the import API, one subcommand per workflow step:
//
//   nexo-planning register <db> <kind>=<path> [<kind>=<path> ...]
//   nexo-planning start <db> <import_log_id> <started_by>
//   nexo-planning status <db> <import_log_id>
//   nexo-planning recent <db> [limit]
//
// <kind> is one of interventionsSe, interventionsBudgetSe,
// rehabAqConception, rehabEgConception.
// ==========================================

use anyhow::{anyhow, bail, Context};
use nexo_planning::domain::import_log::ImportLog;
use nexo_planning::{logging, FileUpload, ImportApi, NexoFileType};
use std::path::Path;

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(e) = run().await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("missing command, expected register|start|status|recent"))?;

    match command.as_str() {
        "register" => {
            let (db_path, specs) = rest
                .split_first()
                .ok_or_else(|| anyhow!("usage: register <db> <kind>=<path> ..."))?;
            if specs.is_empty() {
                bail!("usage: register <db> <kind>=<path> ...");
            }
            let mut uploads = Vec::with_capacity(specs.len());
            for spec in specs {
                uploads.push(upload_from_spec(spec)?);
            }
            let api = ImportApi::new(db_path)?;
            let log = api.register_import(uploads, &operator()).await?;
            println!("{}", log.id);
        }
        "start" => {
            let [db_path, import_log_id, started_by] = rest else {
                bail!("usage: start <db> <import_log_id> <started_by>");
            };
            let api = ImportApi::new(db_path)?;
            api.start_import(import_log_id, started_by).await?;
            println!("started {}", import_log_id);
        }
        "status" => {
            let [db_path, import_log_id] = rest else {
                bail!("usage: status <db> <import_log_id>");
            };
            let api = ImportApi::new(db_path)?;
            let log = api.get_import_log(import_log_id).await?;
            print_log(&log);
        }
        "recent" => {
            let (db_path, limit) = match rest {
                [db_path] => (db_path, 10),
                [db_path, limit] => (db_path, limit.parse().context("invalid limit")?),
                _ => bail!("usage: recent <db> [limit]"),
            };
            let api = ImportApi::new(db_path)?;
            for log in api.list_recent_imports(limit).await? {
                println!("{}  {}  files={}", log.id, log.status, log.files.len());
            }
        }
        other => bail!("unknown command: {}", other),
    }
    Ok(())
}

fn operator() -> String {
    std::env::var("USER").unwrap_or_else(|_| "cli".to_string())
}

fn upload_from_spec(spec: &str) -> anyhow::Result<FileUpload> {
    let (kind, path) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("expected <kind>=<path>, got: {}", spec))?;
    let file_type =
        NexoFileType::parse(kind).ok_or_else(|| anyhow!("unknown file kind: {}", kind))?;
    let data = std::fs::read(path).with_context(|| format!("reading {}", path))?;
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let content_type = if data.starts_with(b"PK") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else {
        "text/csv"
    };
    Ok(FileUpload {
        name,
        content_type: content_type.to_string(),
        file_type,
        data,
    })
}

fn print_log(log: &ImportLog) {
    println!("import {}  status={}", log.id, log.status);
    for file in &log.files {
        println!(
            "  {}  {}  status={}  items={}  errors={}",
            file.file_type,
            file.name,
            file.derived_status(),
            file.number_of_items
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            file.file_errors.len(),
        );
        for error in &file.file_errors {
            println!("    {}", error.description());
        }
        for entry in &file.intervention_log_entries {
            if entry.import_status == nexo_planning::ImportStatus::Failure {
                for error in &entry.element_errors {
                    println!("    [{}] {}", entry.id, error.description());
                }
            }
        }
    }
}
