use anyhow::Context;
use clap::{Parser, Subcommand};
use docflat::{CollectionSchema, EventManager, InMemoryAnalytics, SharedSchema};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Resolve collection schemas and flatten nested JSON documents
#[derive(Parser, Debug)]
#[command(name = "docflat")]
#[command(about = "Resolve collection schemas and flatten nested documents", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a collection definition and print it with every default filled in
    Resolve {
        /// Path to the collection definition (JSON)
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Flatten JSON lines documents against a collection definition
    Flatten {
        /// Path to the collection definition (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// JSON lines input, stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Treat every missing nested field as optional
        #[arg(long)]
        missing_ok: bool,

        /// Print the learned schema after the documents
        #[arg(long)]
        print_schema: bool,
    },

    /// Ingest JSON lines analytics events and print a summary
    Events {
        /// JSON lines input, stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct EventSummary {
    accepted: usize,
    rejected: usize,
    suggestions: u64,
    clicks: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting docflat v{}", env!("CARGO_PKG_VERSION"));

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match args.command {
        Command::Resolve { schema } => {
            let schema = load_schema(&schema)?;
            serde_json::to_writer_pretty(&mut out, &schema.to_json())?;
            writeln!(out)?;
        }
        Command::Flatten {
            schema,
            input,
            missing_ok,
            print_schema,
        } => {
            let shared = SharedSchema::new(load_schema(&schema)?);
            let mut documents = read_documents(open_input(input.as_deref())?)?;
            info!("Flattening {} documents", documents.len());

            let results = shared.ingest(&mut documents, missing_ok);
            let mut failed = 0;
            for (line, (document, result)) in documents.iter().zip(results).enumerate() {
                match result {
                    Ok(_) => {
                        serde_json::to_writer(&mut out, document)?;
                        writeln!(out)?;
                    }
                    Err(e) => {
                        failed += 1;
                        warn!("Document {} rejected: {}", line + 1, e);
                    }
                }
            }
            info!("Flattened {} documents, {} rejected", documents.len() - failed, failed);

            if print_schema {
                serde_json::to_writer_pretty(&mut out, &shared.snapshot())?;
                writeln!(out)?;
            }
        }
        Command::Events { input } => {
            let sink = Arc::new(InMemoryAnalytics::new());
            let events = EventManager::new(sink.clone());
            let mut summary = EventSummary {
                accepted: 0,
                rejected: 0,
                suggestions: 0,
                clicks: 0,
            };

            for (line, raw) in open_input(input.as_deref())?.lines().enumerate() {
                let raw = raw?;
                if raw.trim().is_empty() {
                    continue;
                }
                let accepted = serde_json::from_str::<Value>(&raw)
                    .map_err(|e| e.to_string())
                    .and_then(|event| events.add_event(&event).map_err(|e| e.to_string()));
                match accepted {
                    Ok(()) => summary.accepted += 1,
                    Err(e) => {
                        summary.rejected += 1;
                        warn!("Event {} rejected: {}", line + 1, e);
                    }
                }
            }

            summary.suggestions = sink.total_suggestions();
            summary.clicks = sink.clicks().len();
            serde_json::to_writer_pretty(&mut out, &summary)?;
            writeln!(out)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn load_schema(path: &Path) -> anyhow::Result<CollectionSchema> {
    let schema = CollectionSchema::from_file(path)
        .with_context(|| format!("failed to load collection definition {:?}", path))?;
    info!("Loaded schema `{}` with {} fields", schema.name(), schema.fields().len());
    Ok(schema)
}

fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn read_documents(reader: Box<dyn BufRead>) -> anyhow::Result<Vec<Map<String, Value>>> {
    let mut documents = Vec::new();
    for (line, raw) in reader.lines().enumerate() {
        let raw = raw?;
        if raw.trim().is_empty() {
            continue;
        }
        let document: Map<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("line {} is not a JSON object", line + 1))?;
        documents.push(document);
    }
    Ok(documents)
}
