use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tixi_rs::{
    Cli, Command, ConfigManager, OpenMode, SchemaSource, TixiBackend, TixiDocument, native,
};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate().map_err(|message| anyhow!(message))?;

    let config = ConfigManager::load_config(&cli).context("Failed to load configuration")?;
    init_tracing(&config.logging.level);

    let backend = native::initialize(&config.library)?;
    let mut document = TixiDocument::with_backend(backend);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&cli.command, &mut document, &mut out)?;
    out.flush()?;
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn failure<B: TixiBackend>(document: &TixiDocument<B>, operation: &str) -> anyhow::Error {
    let status = document.last_error();
    if status.is_success() {
        anyhow!("{} failed: invalid arguments", operation)
    } else {
        anyhow!("{} failed: {} ({})", operation, status, status.description())
    }
}

fn open<B: TixiBackend>(
    document: &mut TixiDocument<B>,
    file: &Path,
    mode: OpenMode,
) -> Result<()> {
    if !document.open(file, mode) {
        return Err(failure(document, "open").context(format!("{}", file.display())));
    }
    info!(file = %file.display(), "Opened document");
    Ok(())
}

fn run<B: TixiBackend>(
    command: &Command,
    document: &mut TixiDocument<B>,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Version => {
            writeln!(out, "{}", document.version())?;
            return Ok(());
        }
        Command::Export { file, recursive } => {
            let mode = if *recursive {
                OpenMode::Recursive
            } else {
                OpenMode::Plain
            };
            open(document, file, mode)?;
            let xml = document.export_as_string();
            if xml.is_empty() {
                return Err(failure(document, "export"));
            }
            writeln!(out, "{}", xml)?;
        }
        Command::GetText { file, path } => {
            open(document, file, OpenMode::Plain)?;
            let text = document.get_text_element(path);
            if !document.last_error().is_success() {
                return Err(failure(document, "get-text"));
            }
            writeln!(out, "{}", text)?;
        }
        Command::GetDouble { file, path } => {
            open(document, file, OpenMode::Plain)?;
            let value = document.get_double_element(path);
            // 0.0 is also the failure sentinel
            if !document.last_error().is_success() {
                return Err(failure(document, "get-double"));
            }
            writeln!(out, "{}", value)?;
        }
        Command::Count { file, path, child } => {
            open(document, file, OpenMode::Plain)?;
            let count = document.get_named_children_count(path, child);
            if !document.last_error().is_success() {
                return Err(failure(document, "count"));
            }
            writeln!(out, "{}", count)?;
        }
        Command::Xpath {
            file,
            expression,
            index,
        } => {
            open(document, file, OpenMode::Plain)?;
            let matches = document.xpath_evaluate_node_number(expression);
            if !document.last_error().is_success() {
                return Err(failure(document, "xpath"));
            }
            let indices = match index {
                Some(index) => *index..=*index,
                None => 1..=matches,
            };
            for index in indices {
                let text = document.xpath_get_text_by_index(expression, index);
                if !document.last_error().is_success() {
                    return Err(failure(document, "xpath"));
                }
                writeln!(out, "{}", text)?;
            }
        }
        Command::Validate {
            file,
            schema,
            with_defaults,
        } => {
            open(document, file, OpenMode::Plain)?;
            let source = if *with_defaults {
                SchemaSource::FileWithDefaults(schema)
            } else {
                SchemaSource::File(schema)
            };
            if !document.schema_validate(source) {
                return Err(failure(document, "validate"));
            }
            writeln!(out, "{}: valid", file.display())?;
        }
    }

    if !document.close() {
        return Err(failure(document, "close"));
    }
    Ok(())
}
