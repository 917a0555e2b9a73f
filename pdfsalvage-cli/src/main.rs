use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdfsalvage::parser::{IndirectObject, ParseOptions, PdfDocument, PdfObject, Severity};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pdfsalvage",
    about = "Load damaged PDF files and report what had to be repaired",
    version,
    author
)]
struct Cli {
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, page count and document dictionary
    Info {
        /// Input PDF file
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Resolve every object and decode every stream first
        #[arg(long)]
        decompress: bool,
    },

    /// List the pages in document order
    Pages {
        /// Input PDF file
        input: PathBuf,
    },

    /// List the objects resolved by the load
    Objects {
        /// Input PDF file
        input: PathBuf,

        /// Resolve every referenced object first
        #[arg(short, long)]
        force: bool,
    },

    /// Print every warning and error collected while loading
    Diagnostics {
        /// Input PDF file
        input: PathBuf,

        /// Resolve every object and decode every stream first
        #[arg(long)]
        decompress: bool,
    },
}

#[derive(Serialize)]
struct Info {
    file: String,
    version: String,
    pages: usize,
    root: Option<String>,
    info: Option<String>,
    id: Option<Vec<String>>,
    objects: usize,
    deferred: usize,
    warnings: usize,
    errors: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info {
            input,
            json,
            decompress,
        } => {
            let document = open(&input, decompress)?;
            let info = info(&input, &document);
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("PDF Information for: {}", info.file);
                println!("==========================================");
                println!("PDF Version: {}", info.version);
                println!("Pages: {}", info.pages);
                println!("Root: {}", info.root.as_deref().unwrap_or("-"));
                println!("Info: {}", info.info.as_deref().unwrap_or("-"));
                match &info.id {
                    Some(id) => println!("ID: [{}]", id.join(", ")),
                    None => println!("ID: -"),
                }
                println!("Objects resolved: {}", info.objects);
                println!("Objects deferred: {}", info.deferred);
                println!(
                    "Diagnostics: {} warnings, {} errors",
                    info.warnings, info.errors
                );
            }
        }

        Commands::Pages { input } => {
            let document = open(&input, false)?;
            for (index, page) in document.pages().iter().enumerate() {
                let id = page
                    .id
                    .map_or_else(|| "inline".to_string(), |id| format!("{id} R"));
                match page.media_box {
                    Some([llx, lly, urx, ury]) => println!(
                        "Page {}: {id} MediaBox [{llx} {lly} {urx} {ury}] ({}x{})",
                        index + 1,
                        page.width(),
                        page.height()
                    ),
                    None => println!("Page {}: {id} (no MediaBox)", index + 1),
                }
            }
        }

        Commands::Objects { input, force } => {
            let mut document = open(&input, false)?;
            if force {
                document
                    .force_all()
                    .with_context(|| format!("Failed to resolve objects in {}", input.display()))?;
            }
            let mut objects: Vec<&IndirectObject> = document.reader().registry().resolved().collect();
            objects.sort_by_key(|object| object.id);
            for object in objects {
                println!("{} obj {}", object.id, describe(&object.object));
            }
        }

        Commands::Diagnostics { input, decompress } => {
            let document = open(&input, decompress)?;
            if document.diagnostics().is_empty() {
                println!("No problems found");
            }
            for diagnostic in document.diagnostics().iter() {
                println!("{diagnostic}");
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: &Path, decompress: bool) -> Result<PdfDocument> {
    tracing::debug!(path = %path.display(), decompress, "loading");
    let options = ParseOptions::default().with_decompress(decompress);
    PdfDocument::open(path, options).with_context(|| format!("Failed to load {}", path.display()))
}

fn info(path: &Path, document: &PdfDocument) -> Info {
    let count = |severity: Severity| {
        document
            .diagnostics()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    };
    let id = document.id().and_then(PdfObject::as_array).map(|array| {
        array
            .iter()
            .map(|part| match part.as_string() {
                Some(text) => hex(text.as_bytes()),
                None => describe(part),
            })
            .collect()
    });

    Info {
        file: path.display().to_string(),
        version: document.version().to_string(),
        pages: document.page_count(),
        root: document.root().map(|id| format!("{id} R")),
        info: document.info().map(|id| format!("{id} R")),
        id,
        objects: document.resolved_count(),
        deferred: document.deferred_count(),
        warnings: count(Severity::Warning),
        errors: count(Severity::Error),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// One-line summary of a value
fn describe(object: &PdfObject) -> String {
    match object {
        PdfObject::Null => "null".to_string(),
        PdfObject::Boolean(value) => value.to_string(),
        PdfObject::Integer(value) => value.to_string(),
        PdfObject::Real(value) => value.to_string(),
        PdfObject::String(text) => match text.as_str() {
            Ok(text) => format!("({text})"),
            Err(_) => format!("<{}>", hex(text.as_bytes())),
        },
        PdfObject::Name(name) => format!("/{}", name.as_str()),
        PdfObject::Array(array) => format!("array [{} items]", array.len()),
        PdfObject::Dictionary(dict) => match dict.get_type() {
            Some(kind) => format!("dict /{kind} [{} keys]", dict.len()),
            None => format!("dict [{} keys]", dict.len()),
        },
        PdfObject::Stream(stream) => format!(
            "stream [{} keys, {} bytes]",
            stream.dict.len(),
            stream.raw_data().len()
        ),
        PdfObject::Reference(id) => format!("{id} R"),
    }
}
