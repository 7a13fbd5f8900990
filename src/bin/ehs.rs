//! ehs CLI - Command-line interface for the ecosystem health engine
//!
//! Commands:
//! - compute: Score a batch of raw records into the region table
//! - validate: Validate raw record schema
//! - doctor: Diagnose configuration and environment
//! - schema: Print input or output schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ecosystem_health::encoder::{TableEncoder, TABLE_VERSION};
use ecosystem_health::schema::{RawRecord, RawRecordAdapter, SCHEMA_VERSION};
use ecosystem_health::types::{RegionTable, COLUMNS};
use ecosystem_health::{
    ComputeError, Dataset, EngineConfig, HealthEngine, ENGINE_VERSION, PRODUCER_NAME,
};

/// ehs - Ecosystem health scoring for identity-registration activity
#[derive(Parser)]
#[command(name = "ehs")]
#[command(author = "Synheart AI Inc")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score regional enrolment and update activity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the region table from raw records (batch mode)
    Compute {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Engine configuration (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Print an archetype and top-region summary to stderr
        #[arg(long)]
        summary: bool,
    },

    /// Validate raw record schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Full table envelope as compact JSON
    Json,
    /// Full table envelope, pretty-printed
    JsonPretty,
    /// Rows only, one per line
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (ingest.raw_record.v1)
    Input,
    /// Output schema (region_health.v1)
    Output,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays clean for table output
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ehs=info,ecosystem_health=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), EhsCliError> {
    match cli.command {
        Commands::Compute {
            input,
            input_format,
            config,
            output,
            output_format,
            summary,
        } => cmd_compute(
            &input,
            input_format,
            config.as_deref(),
            &output,
            output_format,
            summary,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_compute(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    output: &Path,
    output_format: OutputFormat,
    summary: bool,
) -> Result<(), EhsCliError> {
    let engine = match config {
        Some(path) => HealthEngine::from_config_json(&fs::read_to_string(path)?)?,
        None => HealthEngine::new(),
    };

    let records = read_records(input, input_format)?;
    if records.is_empty() {
        return Err(EhsCliError::NoRecords);
    }
    debug!(records = records.len(), "parsed input");

    let table = engine.compute_raw(&records)?;

    let output_data = match output_format {
        OutputFormat::Json => TableEncoder::to_json(&table)?,
        OutputFormat::JsonPretty => TableEncoder::to_json_pretty(&table)?,
        OutputFormat::Ndjson => TableEncoder::to_ndjson(&table)?,
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data.trim_end());
    } else {
        fs::write(output, output_data)?;
        info!(path = %output.display(), rows = table.rows.len(), "wrote region table");
    }

    if summary {
        print_summary(&table);
    }

    Ok(())
}

fn print_summary(table: &RegionTable) {
    eprintln!("Region Health Summary");
    eprintln!("=====================");
    eprintln!("Regions:          {}", table.national.regions);
    eprintln!("Enrolment:        {}", table.national.totals.enrolment);
    eprintln!("Updates:          {}", table.national.total_updates);
    eprintln!("Youth ratio:      {:.3}", table.national.youth_update_ratio);
    eprintln!("Dropped records:  {}", table.dropped.total());

    eprintln!("\nArchetypes:");
    for (archetype, count) in table.archetype_counts() {
        eprintln!("  {:<32} {}", archetype.as_str(), count);
    }

    eprintln!("\nTop regions by health:");
    for row in table.top_by_health(5) {
        eprintln!("  {:<32} {:>6.1}  {}", row.region, row.health_score, row.archetype);
    }
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), EhsCliError> {
    let records = read_records(input, input_format)?;
    let results = RawRecordAdapter::validate_records(&records);

    let datasets = Dataset::ALL
        .iter()
        .map(|&dataset| {
            let total = records.iter().filter(|r| r.dataset == dataset).count();
            let invalid = results.iter().filter(|r| r.dataset == dataset).count();
            DatasetCounts {
                dataset: dataset.as_str().to_string(),
                total,
                valid: total - invalid,
                invalid,
            }
        })
        .collect();

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        datasets,
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                dataset: r.dataset.as_str().to_string(),
                region: r.region.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        println!("\nBy dataset:");
        for counts in &report.datasets {
            println!(
                "  {:<12} {} valid, {} invalid",
                counts.dataset, counts.valid, counts.invalid
            );
        }

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - {} record for {:?} (index {}): {}",
                    err.dataset, err.region, err.index, err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(EhsCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), EhsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Engine version {}", ENGINE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}, output table: {}", SCHEMA_VERSION, TABLE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "parallel".to_string(),
        status: CheckStatus::Ok,
        message: if cfg!(feature = "parallel") {
            "Region stages run in parallel".to_string()
        } else {
            "Region stages run sequentially (build with --features parallel to enable)".to_string()
        },
    });

    match config {
        Some(path) if path.exists() => {
            let check = match fs::read_to_string(path) {
                Ok(content) => match EngineConfig::from_json(&content) {
                    Ok(config) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Configuration valid (bucketing {:?}, region filter {})",
                            config.bucketing,
                            config
                                .min_region_enrolment
                                .map(|min| format!("> {}", min))
                                .unwrap_or_else(|| "off".to_string())
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read configuration file: {}", e),
                },
            };
            checks.push(check);
        }
        Some(_) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist".to_string(),
        }),
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default policy".to_string(),
        }),
    }

    // Check stdin is available (for `--input -`)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("ehs Doctor Report");
        println!("=================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EhsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), EhsCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One record per (dataset, region, sub-region, date):");
                println!("- dataset: enrolment | biometric | demographic");
                println!("- region (alias state), sub_region (alias district)");
                println!("- date: DD-MM-YYYY, DD/MM/YYYY, DD.MM.YYYY or YYYY-MM-DD");
                println!("- counts: non-negative whole numbers keyed by bracket");
                println!();
                for dataset in Dataset::ALL {
                    println!("  {:<12} {}", dataset.as_str(), dataset.brackets().join(", "));
                }
                println!();
                println!("Malformed records are dropped and counted per dataset.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", output_json_schema());
            } else {
                println!("Output Schema: {}", TABLE_VERSION);
                println!();
                println!("- table_version, producer {{ name, version, instance_id }}, computed_at_utc");
                println!("- national: {{ totals, total_updates, youth_update_ratio, regions }}");
                println!("- dropped: {{ enrolment, biometric, demographic }}");
                println!("- rows: one per region, columns in order:");
                for column in COLUMNS {
                    println!("    {}", column);
                }
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, EhsCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_records(input: &Path, input_format: InputFormat) -> Result<Vec<RawRecord>, EhsCliError> {
    let input_data = read_input(input)?;
    let records = match input_format {
        InputFormat::Ndjson => RawRecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RawRecordAdapter::parse_array(&input_data)?,
    };
    Ok(records)
}

fn input_json_schema() -> String {
    let datasets: Vec<&str> = Dataset::ALL.iter().map(|d| d.as_str()).collect();
    let brackets: serde_json::Map<String, serde_json::Value> = Dataset::ALL
        .iter()
        .map(|d| (d.as_str().to_string(), serde_json::json!(d.brackets())))
        .collect();

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Raw enrolment and update record",
        "type": "object",
        "required": ["dataset", "region", "sub_region", "date", "counts"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "dataset": { "type": "string", "enum": datasets },
            "region": { "type": "string", "minLength": 1 },
            "sub_region": { "type": "string", "minLength": 1 },
            "date": { "type": "string" },
            "counts": {
                "type": "object",
                "additionalProperties": { "type": "integer", "minimum": 0 }
            }
        },
        "x-brackets": brackets
    })
    .to_string()
}

fn output_json_schema() -> String {
    let row_properties: serde_json::Map<String, serde_json::Value> = COLUMNS
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let kind = match *column {
                "region" | "archetype" => serde_json::json!({ "type": "string" }),
                _ if idx <= 11 => serde_json::json!({ "type": "integer", "minimum": 0 }),
                _ => serde_json::json!({ "type": "number" }),
            };
            (column.to_string(), kind)
        })
        .collect();

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": TABLE_VERSION,
        "description": "Region health table",
        "type": "object",
        "required": ["table_version", "producer", "computed_at_utc", "national", "dropped", "rows"],
        "properties": {
            "table_version": { "type": "string", "const": TABLE_VERSION },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "computed_at_utc": { "type": "string", "format": "date-time" },
            "national": { "type": "object" },
            "dropped": {
                "type": "object",
                "properties": {
                    "enrolment": { "type": "integer" },
                    "biometric": { "type": "integer" },
                    "demographic": { "type": "integer" }
                }
            },
            "rows": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": COLUMNS,
                    "properties": row_properties
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum EhsCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for EhsCliError {
    fn from(e: io::Error) -> Self {
        EhsCliError::Io(e)
    }
}

impl From<ComputeError> for EhsCliError {
    fn from(e: ComputeError) -> Self {
        EhsCliError::Compute(e)
    }
}

impl From<serde_json::Error> for EhsCliError {
    fn from(e: serde_json::Error) -> Self {
        EhsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EhsCliError> for CliError {
    fn from(e: EhsCliError) -> Self {
        match e {
            EhsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EhsCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::EmptyDataset(_) => (
                        "EMPTY_DATASET",
                        "Every dataset needs at least one valid record; run 'ehs validate'",
                    ),
                    ComputeError::NoRegions(_) => (
                        "NO_REGIONS",
                        "Lower min_region_enrolment in the configuration",
                    ),
                    ComputeError::CountOverflow => (
                        "COUNT_OVERFLOW",
                        "Split the input into smaller batches",
                    ),
                    ComputeError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        "Run 'ehs doctor --config <file>' for details",
                    ),
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure input matches the ingest.raw_record.v1 schema",
                    ),
                    ComputeError::EncodingError(_) => ("ENCODING_ERROR", "Report this as a bug"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            EhsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EhsCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            EhsCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            EhsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    datasets: Vec<DatasetCounts>,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct DatasetCounts {
    dataset: String,
    total: usize,
    valid: usize,
    invalid: usize,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    dataset: String,
    region: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
