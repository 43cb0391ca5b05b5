//! cauth CLI - Command-line interface for cauth-core
//!
//! Commands:
//! - features: Replay a recorded sensor trace into feature vectors
//! - enroll: Enroll from the captures of a trace
//! - verify: Score the captures of a trace against the enrolled embedding
//! - doctor: Diagnose model, credential and configuration files
//! - schema: Print the feature vector layout

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cauth_core::credential::FileCredentialStore;
use cauth_core::embedding::LinearEmbedding;
use cauth_core::features::FeatureVectorBuilder;
use cauth_core::trace::{parse_ndjson, replay};
use cauth_core::{
    AuthConfig, AuthError, Authenticator, CaptureSession, FeatureVector, InferenceError,
    StorageError, CAUTH_VERSION, FEATURE_VECTOR_LEN, PRODUCER_NAME,
};

/// cauth - Behavioural authentication from motion sensor traces
#[derive(Parser)]
#[command(name = "cauth")]
#[command(version = CAUTH_VERSION)]
#[command(about = "Enroll and verify users from motion sensor traces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// Configuration file (JSON); missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Samples kept per stream and phase
    #[arg(long)]
    window_capacity: Option<usize>,

    /// Vectors averaged during verification
    #[arg(long)]
    authentication_window: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace and print one feature vector per capture
    Features {
        /// Trace file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Enroll from the captures of a trace
    Enroll {
        /// Trace file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Embedding model file (JSON)
        #[arg(long)]
        model: PathBuf,

        /// Credential file to write
        #[arg(long)]
        credentials: PathBuf,

        /// Number of trials to average (defaults to every capture in the trace)
        #[arg(long)]
        trials: Option<usize>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Score the captures of a trace against the enrolled embedding
    Verify {
        /// Trace file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Embedding model file (JSON)
        #[arg(long)]
        model: PathBuf,

        /// Credential file holding the enrollment
        #[arg(long)]
        credentials: PathBuf,

        /// Distance below which an attempt is reported genuine
        #[arg(long)]
        threshold: Option<f32>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Diagnose model, credential and configuration files
    Doctor {
        /// Check embedding model file
        #[arg(long)]
        model: Option<PathBuf>,

        /// Check credential file
        #[arg(long)]
        credentials: Option<PathBuf>,

        /// Check configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature vector layout
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

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

fn run(cli: Cli) -> Result<(), CauthCliError> {
    match cli.command {
        Commands::Features {
            input,
            output_format,
            config,
        } => cmd_features(&input, output_format, &config),

        Commands::Enroll {
            input,
            model,
            credentials,
            trials,
            config,
        } => cmd_enroll(&input, &model, &credentials, trials, &config),

        Commands::Verify {
            input,
            model,
            credentials,
            threshold,
            output_format,
            config,
        } => cmd_verify(&input, &model, &credentials, threshold, output_format, &config),

        Commands::Doctor {
            model,
            credentials,
            config,
            json,
        } => cmd_doctor(model.as_deref(), credentials.as_deref(), config.as_deref(), json),

        Commands::Schema { json } => cmd_schema(json),
    }
}

fn cmd_features(
    input: &Path,
    output_format: OutputFormat,
    args: &ConfigArgs,
) -> Result<(), CauthCliError> {
    let config = load_config(args)?;
    let vectors = replay_trace(input, &config)?;
    print!("{}", format_output(&vectors, &output_format)?);
    Ok(())
}

fn cmd_enroll(
    input: &Path,
    model: &Path,
    credentials: &Path,
    trials: Option<usize>,
    args: &ConfigArgs,
) -> Result<(), CauthCliError> {
    let mut config = load_config(args)?;
    let vectors = replay_trace(input, &config)?;
    let count = trials.unwrap_or(vectors.len());
    config.enrollment_trials = count;
    // Extra captures beyond the requested trial count are ignored
    let selected = vectors.get(..count).unwrap_or(&vectors);

    let store = FileCredentialStore::with_key(credentials, config.credential_key.clone());
    let mut authenticator = Authenticator::with_config(config, load_model(model)?, store)?;
    let embedding = authenticator.enroll(selected)?;

    let record = authenticator.store().load_record()?;
    let summary = EnrollSummary {
        credential_id: record.map(|r| r.credential_id.to_string()),
        trials: selected.len(),
        dimension: embedding.dimension(),
        credentials: credentials.display().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_verify(
    input: &Path,
    model: &Path,
    credentials: &Path,
    threshold: Option<f32>,
    output_format: OutputFormat,
    args: &ConfigArgs,
) -> Result<(), CauthCliError> {
    let mut config = load_config(args)?;
    if threshold.is_some() {
        config.decision_threshold = threshold;
    }
    let vectors = replay_trace(input, &config)?;

    let store = FileCredentialStore::with_key(credentials, config.credential_key.clone());
    let mut authenticator = Authenticator::with_config(config, load_model(model)?, store)?;

    let mut outcomes = Vec::with_capacity(vectors.len());
    for vector in vectors {
        outcomes.push(authenticator.verify(vector)?);
    }
    print!("{}", format_output(&outcomes, &output_format)?);
    Ok(())
}

fn cmd_doctor(
    model: Option<&Path>,
    credentials: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), CauthCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("cauth-core version {}", CAUTH_VERSION),
    });

    checks.push(DoctorCheck {
        name: "feature_layout".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} values per capture", FEATURE_VECTOR_LEN),
    });

    let mut model_dimension = None;
    if let Some(path) = model {
        let check = match fs::read_to_string(path) {
            Ok(content) => match LinearEmbedding::from_json(&content) {
                Ok(model) => {
                    model_dimension = Some(model.dimension());
                    DoctorCheck::ok(
                        "model",
                        format!("Model valid ({} output dimensions)", model.dimension()),
                    )
                }
                Err(e) => DoctorCheck::error("model", e.to_string()),
            },
            Err(e) => DoctorCheck::error("model", format!("Cannot read model file: {}", e)),
        };
        checks.push(check);
    }

    if let Some(path) = credentials {
        let check = if !path.exists() {
            DoctorCheck::warning(
                "credentials",
                "Credential file does not exist; enroll first".to_string(),
            )
        } else {
            match FileCredentialStore::new(path).load_record() {
                Ok(Some(record)) => match model_dimension {
                    Some(dimension) if dimension != record.dimension => DoctorCheck::error(
                        "credentials",
                        format!(
                            "Enrolled embedding has {} dimensions but the model produces {}",
                            record.dimension, dimension
                        ),
                    ),
                    _ => DoctorCheck::ok(
                        "credentials",
                        format!(
                            "Enrolled {} ({} dimensions, id {})",
                            record.enrolled_at.to_rfc3339(),
                            record.dimension,
                            record.credential_id
                        ),
                    ),
                },
                Ok(None) => DoctorCheck::warning(
                    "credentials",
                    "No enrolled embedding stored".to_string(),
                ),
                Err(e) => DoctorCheck::error("credentials", e.to_string()),
            }
        };
        checks.push(check);
    }

    if let Some(path) = config {
        let check = match fs::read_to_string(path) {
            Ok(content) => match AuthConfig::from_json(&content) {
                Ok(config) => DoctorCheck::ok(
                    "config",
                    format!(
                        "Configuration valid ({} trials, window {})",
                        config.enrollment_trials, config.authentication_window
                    ),
                ),
                Err(e) => DoctorCheck::error("config", e.to_string()),
            },
            Err(e) => DoctorCheck::error("config", format!("Cannot read config file: {}", e)),
        };
        checks.push(check);
    }

    // Traces are usually piped in
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (pass traces with --input <file>)".to_string())
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe (--input - ready)".to_string())
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CAUTH_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("cauth Doctor Report");
        println!("===================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CauthCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(json: bool) -> Result<(), CauthCliError> {
    let labels: Vec<String> = (0..FEATURE_VECTOR_LEN)
        .filter_map(FeatureVectorBuilder::layout_label)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&labels)?);
    } else {
        println!("Feature vector layout ({} values)", labels.len());
        println!();
        println!("Per stream (accelerometer, gyroscope, magnetometer):");
        println!("  pre, post and diff (post - pre) phases");
        println!("  x, y, z and magnitude components");
        println!("  mean, std_dev, min and max of each component");
        println!();
        for (index, label) in labels.iter().enumerate() {
            println!("{:>3}  {}", index, label);
        }
    }
    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, CauthCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(args: &ConfigArgs) -> Result<AuthConfig, CauthCliError> {
    let mut config = match &args.config {
        Some(path) => AuthConfig::from_json(&fs::read_to_string(path)?)?,
        None => AuthConfig::default(),
    };
    if let Some(capacity) = args.window_capacity {
        config.window_capacity = capacity;
    }
    if let Some(window) = args.authentication_window {
        config.authentication_window = window;
    }
    config.validate()?;
    Ok(config)
}

fn load_model(path: &Path) -> Result<LinearEmbedding, CauthCliError> {
    let content = fs::read_to_string(path)?;
    Ok(LinearEmbedding::from_json(&content)?)
}

fn replay_trace(input: &Path, config: &AuthConfig) -> Result<Vec<FeatureVector>, CauthCliError> {
    let events = parse_ndjson(&read_input(input)?)?;
    let session = CaptureSession::new(config);
    let vectors = replay(&events, &session)?;
    if vectors.is_empty() {
        return Err(CauthCliError::NoCaptures);
    }
    tracing::debug!(events = events.len(), captures = vectors.len(), "trace replayed");
    Ok(vectors)
}

fn format_output<T: serde::Serialize>(
    records: &[T],
    format: &OutputFormat,
) -> Result<String, CauthCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum CauthCliError {
    Io(io::Error),
    Auth(AuthError),
    Json(serde_json::Error),
    NoCaptures,
    DoctorFailed,
}

impl From<io::Error> for CauthCliError {
    fn from(e: io::Error) -> Self {
        CauthCliError::Io(e)
    }
}

impl From<AuthError> for CauthCliError {
    fn from(e: AuthError) -> Self {
        CauthCliError::Auth(e)
    }
}

impl From<InferenceError> for CauthCliError {
    fn from(e: InferenceError) -> Self {
        CauthCliError::Auth(e.into())
    }
}

impl From<StorageError> for CauthCliError {
    fn from(e: StorageError) -> Self {
        CauthCliError::Auth(e.into())
    }
}

impl From<serde_json::Error> for CauthCliError {
    fn from(e: serde_json::Error) -> Self {
        CauthCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: &str) -> Self {
        CliError {
            code: code.to_string(),
            message,
            hint: Some(hint.to_string()),
        }
    }
}

impl From<CauthCliError> for CliError {
    fn from(e: CauthCliError) -> Self {
        match e {
            CauthCliError::Io(e) => CliError::new(
                "IO_ERROR",
                e.to_string(),
                "Check file paths and permissions",
            ),
            CauthCliError::Json(e) => {
                CliError::new("JSON_ERROR", e.to_string(), "Check JSON syntax")
            }
            CauthCliError::NoCaptures => CliError::new(
                "NO_CAPTURES",
                "Trace contains no completed captures".to_string(),
                "Each action needs a begin_capture and an end_capture line",
            ),
            CauthCliError::DoctorFailed => CliError::new(
                "DOCTOR_FAILED",
                "One or more health checks failed".to_string(),
                "Review the doctor report for details",
            ),
            CauthCliError::Auth(e) => {
                let message = e.to_string();
                match e {
                    AuthError::NotEnrolled => {
                        CliError::new("NOT_ENROLLED", message, "Run 'cauth enroll' first")
                    }
                    AuthError::ParseError(_) | AuthError::JsonError(_) => CliError::new(
                        "PARSE_ERROR",
                        message,
                        "Ensure the trace is NDJSON sample/begin_capture/end_capture lines",
                    ),
                    AuthError::InvalidConfig(_) => CliError::new(
                        "CONFIG_ERROR",
                        message,
                        "Run 'cauth doctor --config <file>' for details",
                    ),
                    AuthError::PrematureStateTransition { .. } => CliError::new(
                        "CAPTURE_ORDER",
                        message,
                        "Check that capture markers alternate and trial counts match",
                    ),
                    AuthError::Inference(_) => CliError::new(
                        "MODEL_ERROR",
                        message,
                        "Run 'cauth doctor --model <file>' for details",
                    ),
                    AuthError::Storage(_) => CliError::new(
                        "STORAGE_ERROR",
                        message,
                        "Run 'cauth doctor --credentials <file>' for details",
                    ),
                    _ => CliError::new("AUTH_ERROR", message, "Check input values"),
                }
            }
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct EnrollSummary {
    credential_id: Option<String>,
    trials: usize,
    dimension: usize,
    credentials: String,
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

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        }
    }

    fn warning(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message,
        }
    }

    fn error(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
