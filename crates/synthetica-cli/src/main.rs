mod registry;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use registry::{RunContext, RunPaths, init_run_logging, start_run, write_json};
use serde::Serialize;
use settings::{DEFAULT_SETTINGS_PATH, Settings, SettingsError};
use synthetica_config::{ConfigError, config_json_schema, load_config, required_tables};
use synthetica_core::{
    COMPILATION_VERSION, CompilationResult, Error as CoreError, GraphReport, TableRegistry, compile,
};
use synthetica_eval::{EvalError, EvaluationEngine};
use synthetica_io::{DataError, DataLoader, DataWriter, OutputFormat};
use synthetica_synth::{EmpiricalSynthesizer, SynthError, Synthesizer};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("compilation error: {0}")]
    Core(#[from] CoreError),
    #[error("synthesis error: {0}")]
    Synth(#[from] SynthError),
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "synthetica", version, about = "Synthetica CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile the rule configuration against the source tables.
    Compile(CompileArgs),
    /// Compile, synthesize, write and evaluate.
    Generate(GenerateArgs),
    /// Print the JSON Schema of the rule configuration.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Settings file (TOML). Missing file means defaults.
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,
    /// Rule configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding `<table>.csv|json|jsonl` source files.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompileArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Directory for synthesized tables (defaults to `<run>/data`).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format: csv, json or jsonl.
    #[arg(long)]
    format: Option<OutputFormat>,
    /// Rows per table.
    #[arg(long, conflicts_with = "scale")]
    rows: Option<u64>,
    /// Rows per table as a multiple of the source row count.
    #[arg(long)]
    scale: Option<f64>,
    /// Run seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Fail when the evaluation finds violations.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write the schema to a file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Content of `compilation.json`.
#[derive(Debug, Serialize)]
struct CompilationArtifact<'a> {
    compilation_version: &'a str,
    graph: GraphReport,
    #[serde(flatten)]
    compilation: &'a CompilationResult,
}

/// Loaded inputs and the compiled bundle of one run.
struct Compiled {
    paths: RunPaths,
    settings: Settings,
    tables: TableRegistry,
    compilation: CompilationResult,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Compile(args) => run_compile(args),
        Command::Generate(args) => run_generate(args),
        Command::Schema(args) => run_schema(args),
    }
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = config_json_schema();
    match args.out {
        Some(path) => write_json(&path, &schema)?,
        None => println!("{}", serde_json::to_string_pretty(&schema)?),
    }
    Ok(())
}

fn run_compile(args: CompileArgs) -> Result<(), CliError> {
    let settings = resolve_settings(&args.input)?;
    let compiled = compile_run("compile", settings)?;

    print_compilation(&compiled.compilation);
    println!("run: {}", compiled.paths.root.display());
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let mut settings = resolve_settings(&args.input)?;
    if let Some(out) = args.out {
        settings.output_dir = Some(out);
    }
    if let Some(format) = args.format {
        settings.format = format;
    }
    if let Some(rows) = args.rows {
        settings.rows = Some(rows);
    }
    if let Some(scale) = args.scale {
        settings.rows = None;
        settings.scale = scale;
    }
    if let Some(seed) = args.seed {
        settings.synthesis.seed = seed;
    }
    if args.strict {
        settings.evaluation.strict = true;
    }

    let Compiled {
        paths,
        settings,
        tables,
        compilation,
    } = compile_run("generate", settings)?;

    let timer = Instant::now();
    tracing::info!(event = "synthesis_started", seed = settings.synthesis.seed);
    let synthesis = EmpiricalSynthesizer::new(settings.synthesis.clone()).synthesize(
        &tables,
        &compilation,
        settings.row_count(),
    )?;
    write_json(&paths.generation_report_path, &synthesis.report)?;
    tracing::info!(
        event = "synthesis_finished",
        retries = synthesis.report.retries_total,
        fallbacks = synthesis.report.fallback_count,
        path = %paths.generation_report_path.display()
    );

    let out_dir = settings
        .output_dir
        .clone()
        .unwrap_or_else(|| paths.data_dir.clone());
    let written = DataWriter::new(&out_dir, settings.format).write(&synthesis.tables)?;
    for table in &written {
        tracing::info!(
            event = "table_written",
            table = %table.table,
            rows = table.rows,
            bytes = table.bytes,
            path = %table.path.display()
        );
    }

    let evaluation = EvaluationEngine::new(settings.evaluation.clone()).run(
        &tables,
        &synthesis.tables,
        &compilation,
        Some(&synthesis.report),
        &paths.root,
    )?;
    tracing::info!(
        event = "run_finished",
        violations = evaluation.violations.len(),
        duration_ms = timer.elapsed().as_millis() as u64
    );

    print_compilation(&compilation);
    for table in &written {
        println!("  {} rows -> {}", table.rows, table.path.display());
    }
    println!("violations: {}", evaluation.violations.len());
    println!("report: {}", evaluation.report_path.display());
    println!("run: {}", paths.root.display());
    Ok(())
}

fn resolve_settings(input: &InputArgs) -> Result<Settings, CliError> {
    let mut settings = Settings::load(&input.settings)?;
    if let Some(config) = &input.config {
        settings.config = config.clone();
    }
    if let Some(data_dir) = &input.data_dir {
        settings.data_dir = data_dir.clone();
    }
    if let Some(run_dir) = &input.run_dir {
        settings.run_dir = run_dir.clone();
    }
    Ok(settings)
}

/// Start a run directory, load config and tables, compile and write
/// `compilation.json`.
fn compile_run(command: &str, settings: Settings) -> Result<Compiled, CliError> {
    let run_id = Uuid::new_v4().to_string();
    let ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        command: command.to_string(),
        config_path: settings.config.clone(),
        data_dir: settings.data_dir.clone(),
        run_dir: settings.run_dir.clone(),
        settings,
    };

    let paths = start_run(&ctx)?;
    init_run_logging(&paths.logs_path)?;
    let settings = ctx.settings;

    tracing::info!(event = "run_started", run_id = %run_id, command = %command);

    let rules = load_config(&settings.config)?;
    let tables = load_tables(&settings.data_dir, &required_tables(&rules))?;
    let compilation = compile(&tables, &rules, &settings.compile)?;

    let artifact = CompilationArtifact {
        compilation_version: COMPILATION_VERSION,
        graph: compilation.graph_report(),
        compilation: &compilation,
    };
    write_json(&paths.compilation_path, &artifact)?;
    tracing::info!(
        event = "compilation_written",
        fingerprint = %compilation.fingerprint(),
        path = %paths.compilation_path.display()
    );

    Ok(Compiled {
        paths,
        settings,
        tables,
        compilation,
    })
}

fn load_tables(data_dir: &Path, names: &[String]) -> Result<TableRegistry, CliError> {
    let tables = DataLoader::new(data_dir).load(names)?;
    tracing::info!(
        event = "tables_loaded",
        requested = names.len(),
        loaded = tables.len(),
        data_dir = %data_dir.display()
    );
    Ok(tables)
}

fn print_compilation(compilation: &CompilationResult) {
    let graph = compilation.graph_report();
    println!("fingerprint: {}", compilation.fingerprint());
    println!(
        "tables: {}  relationships: {}  constraints: {}",
        compilation.schema().tables.len(),
        compilation.relationships().len(),
        compilation.constraints().len()
    );
    if let Some(order) = graph.topo_order {
        println!("generation order: {}", order.join(" -> "));
    }
    for edge in compilation.relationships() {
        println!("  fk {edge}");
    }
    for descriptor in compilation.constraints() {
        println!("  {} on {}", descriptor.kind(), descriptor.table());
    }
}
