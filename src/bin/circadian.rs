//! Circadian CLI - Command-line interface for Synheart Circadian
//!
//! Commands:
//! - report: Compute a sleep report from a sleep history
//! - validate: Validate raw sleep records
//! - doctor: Diagnose installation and configuration
//! - config: Print the default model configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use synheart_circadian::encoder::ReportEncoder;
use synheart_circadian::pipeline::{analyze_history, load_raw_records};
use synheart_circadian::schema::{
    parse_local_datetime, HistoryParser, RawSleepRecord, ValidationPolicy, SCHEMA_VERSION,
};
use synheart_circadian::{ComputeError, ModelConfig, CIRCADIAN_VERSION, PRODUCER_NAME};

/// Circadian - On-device sleep debt, chronotype and energy modeling
#[derive(Parser)]
#[command(name = "circadian")]
#[command(author = "Synheart AI Inc")]
#[command(version = CIRCADIAN_VERSION)]
#[command(about = "Turn nightly sleep history into a personal sleep report", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a sleep report from a sleep history
    Report {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Where the input comes from
        #[arg(long, default_value = "records")]
        source: Source,

        /// Input format for raw records; vendor payloads are always JSON
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Local date-time to report at, e.g. 2024-03-24T11:00 (defaults to now)
        #[arg(long)]
        now: Option<String>,

        /// Sleep need in hours, overriding the estimated baseline
        #[arg(long)]
        sleep_need: Option<f64>,

        /// Fail on the first invalid or duplicate record instead of dropping it
        #[arg(long)]
        strict: bool,

        /// Model configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Validate raw sleep records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose installation and configuration
    Doctor {
        /// Check a model configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default model configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    /// Raw sleep records (sleep.raw_record.v1)
    Records,
    /// Garmin Connect sleep payload
    Garmin,
    /// WHOOP sleep payload
    Whoop,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

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

/// `RUST_LOG` wins; otherwise warnings, or debug with `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CircadianCliError> {
    match cli.command {
        Commands::Report {
            input,
            output,
            source,
            input_format,
            now,
            sleep_need,
            strict,
            config,
            output_format,
        } => cmd_report(ReportArgs {
            input: &input,
            output: &output,
            source,
            input_format,
            now: now.as_deref(),
            sleep_need,
            strict,
            config: config.as_deref(),
            output_format,
        }),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Config => cmd_config(),
    }
}

struct ReportArgs<'a> {
    input: &'a Path,
    output: &'a Path,
    source: Source,
    input_format: InputFormat,
    now: Option<&'a str>,
    sleep_need: Option<f64>,
    strict: bool,
    config: Option<&'a Path>,
    output_format: OutputFormat,
}

fn cmd_report(args: ReportArgs<'_>) -> Result<(), CircadianCliError> {
    let config = match args.config {
        Some(path) => ModelConfig::from_json(&fs::read_to_string(path)?)?,
        None => ModelConfig::default(),
    };

    let now = match args.now {
        Some(value) => parse_now(value)?,
        None => Local::now().naive_local(),
    };

    let input_data = read_input(args.input)?;
    let source = match (args.source, args.input_format) {
        (Source::Records, InputFormat::Json) => "records",
        (Source::Records, InputFormat::Ndjson) => "records-ndjson",
        (Source::Garmin, _) => "garmin",
        (Source::Whoop, _) => "whoop",
    };
    let raw = load_raw_records(source, &input_data)?;
    if raw.is_empty() {
        return Err(CircadianCliError::NoRecords);
    }

    let policy = if args.strict {
        ValidationPolicy::Strict
    } else {
        ValidationPolicy::Lenient
    };
    let parsed = HistoryParser::into_history(&raw, policy)?;
    info!(
        records = parsed.records.len(),
        rejected = parsed.rejected.len(),
        %now,
        "Computing sleep report"
    );

    let report = analyze_history(&parsed.records, now, args.sleep_need, &config);
    let envelope = ReportEncoder::new().encode(report, parsed.rejected);

    let output_data = match args.output_format {
        OutputFormat::Json => serde_json::to_string(&envelope)? + "\n",
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&envelope)? + "\n",
    };

    if args.output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(args.output, output_data)?;
        debug!(path = %args.output.display(), "Wrote report");
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), CircadianCliError> {
    let input_data = read_input(input)?;
    let records = parse_records(&input_data, input_format)?;
    let failures = HistoryParser::validate_records(&records);

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_records: records.len(),
        valid_records: records.len() - failures.len(),
        invalid_records: failures.len(),
        errors: failures
            .into_iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                date: r.date,
                error: r.reason,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:          {}", report.schema_version);
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Record {} (index {}): {}", err.date, err.index, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(CircadianCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), CircadianCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck {
            name: "circadian_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Circadian version {}", CIRCADIAN_VERSION),
        },
        DoctorCheck {
            name: "schema_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Input schema: {}", SCHEMA_VERSION),
        },
    ];

    if let Some(config_path) = config {
        checks.push(check_config_file(config_path));
    }

    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (use --input - to read it)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CIRCADIAN_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Circadian Doctor Report");
        println!("=======================");
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
        Err(CircadianCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_config_file(path: &Path) -> DoctorCheck {
    let (status, message) = if !path.exists() {
        (CheckStatus::Warning, "Config file does not exist".to_string())
    } else {
        match fs::read_to_string(path) {
            Ok(content) => match ModelConfig::from_json(&content) {
                Ok(config) => (
                    CheckStatus::Ok,
                    format!(
                        "Config valid (debt window {} days, decay tau {} days)",
                        config.debt.window_days, config.debt.decay_tau_days
                    ),
                ),
                Err(e) => (CheckStatus::Error, format!("Invalid config: {}", e)),
            },
            Err(e) => (CheckStatus::Error, format!("Cannot read config file: {}", e)),
        }
    };

    DoctorCheck {
        name: "config".to_string(),
        status,
        message,
    }
}

fn cmd_config() -> Result<(), CircadianCliError> {
    println!("{}", ModelConfig::default().to_json()?);
    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, CircadianCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_records(
    input_data: &str,
    input_format: InputFormat,
) -> Result<Vec<RawSleepRecord>, CircadianCliError> {
    let records = match input_format {
        InputFormat::Ndjson => HistoryParser::parse_ndjson(input_data)?,
        InputFormat::Json => HistoryParser::parse_array(input_data)?,
    };
    Ok(records)
}

fn parse_now(value: &str) -> Result<NaiveDateTime, CircadianCliError> {
    parse_local_datetime(value).ok_or_else(|| CircadianCliError::InvalidNow(value.to_string()))
}

// Error types

#[derive(Debug)]
enum CircadianCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoRecords,
    InvalidNow(String),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for CircadianCliError {
    fn from(e: io::Error) -> Self {
        CircadianCliError::Io(e)
    }
}

impl From<ComputeError> for CircadianCliError {
    fn from(e: ComputeError) -> Self {
        CircadianCliError::Compute(e)
    }
}

impl From<serde_json::Error> for CircadianCliError {
    fn from(e: serde_json::Error) -> Self {
        CircadianCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CircadianCliError> for CliError {
    fn from(e: CircadianCliError) -> Self {
        match e {
            CircadianCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CircadianCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidRecord { .. } => (
                        "INVALID_RECORD",
                        "Run 'circadian validate' for details, or drop --strict",
                    ),
                    ComputeError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        "Run 'circadian config' for a valid starting point",
                    ),
                    ComputeError::UnsupportedSource(_) => {
                        ("UNSUPPORTED_SOURCE", "Use --source records, garmin or whoop")
                    }
                    _ => (
                        "PARSE_ERROR",
                        "Ensure input matches the sleep.raw_record.v1 schema",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CircadianCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CircadianCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No sleep records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            CircadianCliError::InvalidNow(value) => CliError {
                code: "INVALID_NOW".to_string(),
                message: format!("Cannot parse --now value: {}", value),
                hint: Some("Use a local date-time such as 2024-03-24T11:00".to_string()),
            },
            CircadianCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            CircadianCliError::DoctorFailed => CliError {
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
    schema_version: String,
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    date: String,
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
