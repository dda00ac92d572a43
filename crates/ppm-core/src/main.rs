//! Predictive process monitoring CLI.
//!
//! Reads an event log, replays model outputs over every prefix of every
//! case, and writes predicted activities, roles and timestamps.

use clap::{Args, Parser, Subcommand};
use ppm_common::{
    format_batch_human, format_error_human, Error, OutputFormat, Result, RunId, SCHEMA_VERSION,
};
use ppm_config::{
    resolve_config, Config, ConfigPaths, DecodeVariant, ModelParameters, RunConfig, VectorizerKind,
};
use ppm_core::exit_codes::ExitCode;
use ppm_core::logging::{event_names, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage};
use ppm_core::output::{write_batch, write_jsonl, IngestReport};
use ppm_core::schema::{available_schemas, format_schema, generate_all_schemas, generate_schema, SchemaFormat};
use ppm_core::{BatchEngine, BatchPlan, EventLog, LogReader, ReplayPredictor};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ppm")]
#[command(author, version, about = "Batch next-event prediction over process event logs")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr: human or jsonl
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read an event log and report its cases
    Ingest(IngestArgs),

    /// Run batch prediction over every prefix of every selected case
    Predict(PredictArgs),

    /// Validate model parameters and run configuration
    Check(ConfigArgs),

    /// Print JSON schemas of input and output documents
    Schema(SchemaArgs),

    /// Show version information
    Version,
}

#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Model parameter file (JSON)
    #[arg(long)]
    params: Option<PathBuf>,

    /// Run configuration (TOML, YAML or JSON)
    #[arg(long)]
    run_config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Event log (.csv, .csv.gz or .zip)
    log: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Emit the raw per-case transitions instead of the case overview
    #[arg(long)]
    raw: bool,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Event log (.csv, .csv.gz or .zip)
    log: PathBuf,

    /// Recorded model outputs (JSONL, one line per case and prefix length)
    #[arg(long)]
    predictions: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Override the decoding variant
    #[arg(long, value_parser = parse_variant)]
    variant: Option<DecodeVariant>,

    /// Override the predictions per step of the multi variants
    #[arg(long)]
    multiprednum: Option<usize>,

    /// Override the sampling seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of cases processed concurrently
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Write results to this file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Type name to print
    name: Option<String>,

    /// List available schema names
    #[arg(long, conflicts_with = "all")]
    list: bool,

    /// Print every schema as one JSON object
    #[arg(long)]
    all: bool,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

fn parse_variant(s: &str) -> std::result::Result<DecodeVariant, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| {
        format!("unknown variant '{s}' (expected arg_max, random_choice, multi_pred or multi_pred_rand)")
    })
}

fn main() {
    let cli = Cli::parse();

    let level = LogLevel::from_verbosity(cli.global.quiet, cli.global.verbose);
    init_logging(&LogConfig::from_env(level, cli.global.log_format));

    let result = match &cli.command {
        Commands::Ingest(args) => run_ingest(&cli.global, args),
        Commands::Predict(args) => run_predict(&cli.global, args),
        Commands::Check(args) => run_check(&cli.global, args),
        Commands::Schema(args) => run_schema(args),
        Commands::Version => print_version(&cli.global),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => {
            report_error(&cli.global, &err);
            ExitCode::from(&err)
        }
    };
    std::process::exit(exit_code.as_i32());
}

fn report_error(global: &GlobalOpts, err: &Error) {
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let payload = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "error",
                "error": ppm_common::StructuredError::from(err),
            });
            println!("{payload}");
        }
        _ => eprintln!("{}", format_error_human(err, std::io::stderr().is_terminal())),
    }
}

/// Write to `path` when given, stdout otherwise.
fn with_output<F>(path: Option<&Path>, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    match path {
        Some(path) => {
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            write(&mut file)?;
            file.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write(&mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn feature_columns(params: Option<&ModelParameters>) -> Vec<String> {
    match params {
        Some(p) if p.vectorizer == VectorizerKind::Inter => p.inter_features.clone(),
        _ => Vec::new(),
    }
}

fn run_ingest(global: &GlobalOpts, args: &IngestArgs) -> Result<ExitCode> {
    let ctx = LogContext::new(RunId::new());
    let paths = resolve_config(args.config.params.as_deref(), args.config.run_config.as_deref());
    let run = match paths.run.as_deref() {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    let params = paths
        .params
        .as_deref()
        .map(ModelParameters::from_file)
        .transpose()?;
    let columns = feature_columns(params.as_ref());

    let log = read_log(&ctx, &run, &columns, &args.log)?;
    if args.raw {
        let raw = log.raw_traces();
        match global.format {
            OutputFormat::Jsonl => {
                let transitions: Vec<_> = raw.into_values().flatten().collect();
                with_output(None, |out| write_jsonl(out, &transitions))?;
            }
            _ => with_output(None, |out| {
                serde_json::to_writer_pretty(&mut *out, &raw)?;
                writeln!(out)?;
                Ok(())
            })?,
        }
    } else {
        let report = IngestReport::from_log(&args.log.display().to_string(), &log);
        with_output(None, |out| report.write(out, global.format))?;
    }
    Ok(ExitCode::Clean)
}

fn read_log(ctx: &LogContext, run: &RunConfig, columns: &[String], path: &Path) -> Result<EventLog> {
    let _span = ctx.span(Stage::Ingest).entered();
    let shown = path.display().to_string();
    ppm_core::log_event!(
        ctx,
        INFO,
        event_names::INGEST_STARTED,
        Stage::Ingest,
        "reading event log",
        path = shown.as_str()
    );
    LogReader::new(&run.read_options)
        .with_feature_columns(columns)
        .read_path(path)
}

fn load_config(ctx: &LogContext, args: &ConfigArgs) -> Result<(ConfigPaths, Config)> {
    let paths = resolve_config(args.params.as_deref(), args.run_config.as_deref());
    let config = Config::load(&paths)?;
    if config.snapshot.run_is_default() {
        ppm_core::log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no run configuration found, using defaults"
        );
    }
    let source = paths.params_source.to_string();
    ppm_core::log_event!(
        ctx,
        INFO,
        event_names::CONFIG_LOADED,
        Stage::Init,
        "configuration loaded",
        params_source = source.as_str(),
        params_hash = config.snapshot.params_hash.as_str()
    );
    Ok((paths, config))
}

fn run_predict(global: &GlobalOpts, args: &PredictArgs) -> Result<ExitCode> {
    let run_id = RunId::new();
    let ctx = LogContext::new(run_id.clone());
    let (_, mut config) = load_config(&ctx, &args.config)?;

    if let Some(variant) = args.variant {
        config.run.variant = variant;
    }
    if let Some(n) = args.multiprednum {
        config.run.multiprednum = n;
    }
    if let Some(seed) = args.seed {
        config.run.seed = Some(seed);
    }
    if let Some(n) = args.max_parallel {
        config.run.max_parallel = n;
    }
    // overrides are validated again by the plan
    let plan = BatchPlan::new(&config.params, &config.run)?;

    let columns = feature_columns(Some(&config.params));
    let log = read_log(&ctx, &config.run, &columns, &args.log)?;
    let predictor = ReplayPredictor::from_file(&args.predictions)?;

    let engine = BatchEngine::new(plan, predictor)
        .with_run_id(run_id)
        .with_snapshot(config.snapshot.clone());
    let batch = engine.run(&log)?;

    {
        let _span = ctx.span(Stage::Output).entered();
        with_output(args.output.as_deref(), |out| write_batch(out, &batch, global.format))?;
        ppm_core::log_event!(
            ctx,
            INFO,
            event_names::OUTPUT_WRITTEN,
            Stage::Output,
            "results written",
            records = batch.records.len(),
            format = global.format.to_string().as_str()
        );
    }

    if batch.summary.cases.failed > 0 {
        if !matches!(global.format, OutputFormat::Json | OutputFormat::Jsonl) {
            eprint!(
                "{}",
                format_batch_human(
                    &batch.summary.cases,
                    &batch.summary.failures,
                    std::io::stderr().is_terminal()
                )
            );
        }
        Ok(ExitCode::PartialFail)
    } else {
        Ok(ExitCode::Clean)
    }
}

fn run_check(global: &GlobalOpts, args: &ConfigArgs) -> Result<ExitCode> {
    let paths = resolve_config(args.params.as_deref(), args.run_config.as_deref());
    let mut checks = Vec::new();
    let mut all_ok = true;

    let mut record = |check: &str, path: Option<&Path>, outcome: std::result::Result<(), Error>| {
        let mut entry = serde_json::json!({ "check": check });
        if let Some(path) = path {
            entry["path"] = serde_json::json!(path.display().to_string());
        }
        match outcome {
            Ok(()) => entry["status"] = serde_json::json!("ok"),
            Err(err) => {
                all_ok = false;
                entry["status"] = serde_json::json!("failed");
                entry["error"] = serde_json::json!(ppm_common::StructuredError::from(&err));
            }
        }
        checks.push(entry);
    };

    let params = match paths.params.as_deref() {
        Some(path) => {
            let (outcome, parsed) = match ModelParameters::from_file(path) {
                Ok(p) => (
                    ppm_config::validate::validate_params(&p).map_err(Error::from),
                    Some(p),
                ),
                Err(err) => (Err(err.into()), None),
            };
            record("params", Some(path), outcome);
            parsed
        }
        None => {
            record(
                "params",
                None,
                Err(ppm_config::ValidationError::MissingField(
                    "model parameter file (pass --params or set PPM_PARAMS)".to_string(),
                )
                .into()),
            );
            None
        }
    };

    let run = match paths.run.as_deref() {
        Some(path) => {
            let (outcome, parsed) = match RunConfig::from_file(path) {
                Ok(run) => (Ok(()), Some(run)),
                Err(err) => (Err(err.into()), None),
            };
            record("run_config", Some(path), outcome);
            parsed
        }
        None => Some(RunConfig::default()),
    };

    if let (Some(params), Some(run)) = (params.as_ref(), run.as_ref()) {
        record("plan", None, BatchPlan::new(params, run).map(|_| ()));
    }

    let status = if all_ok { "ok" } else { "failed" };
    match global.format {
        OutputFormat::Summary => {
            for check in &checks {
                let ok = check["status"] == "ok";
                println!(
                    "[{}] {}",
                    check["check"].as_str().unwrap_or_default(),
                    if ok { "OK" } else { "FAILED" }
                );
            }
        }
        _ => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": status,
                "params_source": paths.params_source.to_string(),
                "run_source": paths.run_source.to_string(),
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(if all_ok {
        ExitCode::Clean
    } else {
        ExitCode::ConfigError
    })
}

fn run_schema(args: &SchemaArgs) -> Result<ExitCode> {
    let format = if args.compact {
        SchemaFormat::JsonCompact
    } else {
        SchemaFormat::Json
    };

    if args.list {
        for (name, description) in available_schemas() {
            println!("{name:<18} {description}");
        }
        return Ok(ExitCode::Clean);
    }
    if args.all {
        let all = serde_json::Value::Object(generate_all_schemas().into_iter().collect());
        println!("{}", format_schema(&all, format));
        return Ok(ExitCode::Clean);
    }

    match args.name.as_deref() {
        Some(name) => match generate_schema(name) {
            Some(schema) => {
                println!("{}", format_schema(&schema, format));
                Ok(ExitCode::Clean)
            }
            None => {
                let known: Vec<&str> = available_schemas().into_iter().map(|(n, _)| n).collect();
                eprintln!("unknown schema '{name}'; available: {}", known.join(", "));
                Ok(ExitCode::ArgsError)
            }
        },
        None => {
            eprintln!("pass a schema name, --list or --all");
            Ok(ExitCode::ArgsError)
        }
    }
}

fn print_version(global: &GlobalOpts) -> Result<ExitCode> {
    let version = env!("CARGO_PKG_VERSION");
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "version": version,
                "rust_version": env!("CARGO_PKG_RUST_VERSION"),
            });
            println!("{output}");
        }
        _ => println!("ppm {version}"),
    }
    Ok(ExitCode::Clean)
}
