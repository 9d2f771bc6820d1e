use crate::config::{get_config_path, Config};
use crate::export::{write_export, CalendarRecord, CalendarSerializer};
use crate::parser::{EventBuilder, ResolverChain};
use crate::table::{csv_source, normalize_rows, normalize_with_headers, ColumnMapping, TableEvent};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CalendMe - turn phrases and schedule tables into calendar events
#[derive(Debug, Parser)]
#[command(name = "calendme")]
#[command(
    about = "Turn free-text phrases and schedule tables into iCalendar files",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Command to execute (if not specified, enters interactive mode)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a phrase such as "Monday 10am Team Meeting" and print the event
    Parse {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Read a CSV schedule and print the events it contains
    Import {
        /// CSV file
        #[arg(required = true)]
        path: PathBuf,

        /// Comma-separated keywords; only matching rows are kept
        #[arg(long, default_value = "")]
        filters: String,

        /// Treat the first row as headers and infer the column mapping from it
        #[arg(long, conflicts_with = "mapping")]
        headers: bool,

        /// Column mapping, e.g. "course=0,title=1,date=2,time=3,location=4"
        #[arg(long, default_value = DEFAULT_MAPPING)]
        mapping: String,

        /// Write an .ics file instead of printing JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a JSON list of events to an .ics file
    Export {
        /// JSON file holding an array of events
        #[arg(required = true)]
        events: PathBuf,

        /// Output file (defaults to a timestamped file in the export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the HTTP API
    Serve {
        /// Address to bind, e.g. 127.0.0.1:5000
        #[arg(long)]
        addr: Option<String>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigActions {
    /// Show configuration
    #[command(aliases = ["list", "get"])]
    Show,

    /// Print the config file location
    Path,
}

const DEFAULT_MAPPING: &str = "course=0,title=1,date=2,time=3,location=4";

/// Parse `field=index` pairs into a mapping. Fields not named stay unmapped.
pub fn parse_mapping(spec: &str) -> Result<ColumnMapping> {
    let mut mapping = ColumnMapping::default();
    for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, index) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected field=index, got '{}'", pair))?;
        let index: usize = index
            .trim()
            .parse()
            .with_context(|| format!("Invalid column index in '{}'", pair))?;
        let slot = match field.trim().to_lowercase().as_str() {
            "course" => &mut mapping.course,
            "title" => &mut mapping.title,
            "date" => &mut mapping.date,
            "time" => &mut mapping.time,
            "location" => &mut mapping.location,
            other => bail!("Unknown field '{}'", other),
        };
        *slot = Some(index);
    }
    Ok(mapping)
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

pub fn builder_for(config: &Config) -> EventBuilder {
    EventBuilder::new(Arc::new(ResolverChain::standard()), config.parser.defaults())
}

/// Run a one-shot subcommand
pub fn execute(command: Commands, config: &Config, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Parse { text } => {
            let input = text.join(" ");
            let event = builder_for(config).parse(&input)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        Commands::Import { path, filters, headers, mapping, output } => {
            let events = import_table(&path, &filters, headers, &mapping)?;
            match output {
                Some(output) => {
                    let records: Vec<CalendarRecord> =
                        events.iter().map(CalendarRecord::from).collect();
                    export_records(config, &records, Some(&output))?;
                }
                None => println!("{}", serde_json::to_string_pretty(&events)?),
            }
        }
        Commands::Export { events, output } => {
            let content = fs::read_to_string(&events)
                .with_context(|| format!("Failed to read {}", events.display()))?;
            let records: Vec<CalendarRecord> =
                serde_json::from_str(&content).context("Failed to parse events JSON")?;
            export_records(config, &records, output.as_deref())?;
        }
        Commands::Serve { addr } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(crate::api_server::start_api_server(config.clone(), addr))?;
        }
        Commands::Config { action } => match action {
            ConfigActions::Show => print!("{}", toml::to_string_pretty(config)?),
            ConfigActions::Path => {
                let path = match config_path {
                    Some(path) => path.to_path_buf(),
                    None => get_config_path()?,
                };
                println!("{}", path.display());
            }
        },
    }
    Ok(())
}

/// Read a CSV file and normalize it with either inferred or explicit column mapping
pub fn import_table(
    path: &Path,
    filters: &str,
    headers: bool,
    mapping: &str,
) -> Result<Vec<TableEvent>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let rows = csv_source::read_rows(&bytes)?;
    let events = if headers {
        let (mapping, events) = normalize_with_headers(&rows, filters);
        info!("Inferred column mapping: {:?}", mapping);
        events
    } else {
        normalize_rows(&rows, &parse_mapping(mapping)?, filters)
    };
    info!("Imported {} events from {}", events.len(), path.display());
    Ok(events)
}

/// Serialize and write records, either to `output` or to the configured export directory
pub fn export_records(
    config: &Config,
    records: &[CalendarRecord],
    output: Option<&Path>,
) -> Result<PathBuf> {
    let export = CalendarSerializer::new(config.export.settings()).serialize(records)?;
    let path = match output {
        Some(path) => {
            fs::write(path, &export.text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path.to_path_buf()
        }
        None => write_export(&config.export.directory(), &export, Local::now())
            .context("Failed to write calendar file")?,
    };
    println!(
        "Exported {} events to {} ({} skipped)",
        export.emitted,
        path.display(),
        export.skipped
    );
    Ok(path)
}
