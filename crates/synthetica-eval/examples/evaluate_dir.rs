use std::env;
use std::path::PathBuf;

use synthetica_config::{load_config, required_tables};
use synthetica_core::{CompileOptions, compile};
use synthetica_eval::{EvaluateOptions, EvaluationEngine};
use synthetica_io::DataLoader;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut source_dir: Option<PathBuf> = None;
    let mut synthetic_dir: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next().map(PathBuf::from),
            "--source" => source_dir = args.next().map(PathBuf::from),
            "--synthetic" => synthetic_dir = args.next().map(PathBuf::from),
            "--out" => out_dir = args.next().map(PathBuf::from),
            _ => return Err(format!("unexpected argument: {arg}").into()),
        }
    }

    let config_path = config_path.ok_or("missing --config path")?;
    let source_dir = source_dir.ok_or("missing --source directory")?;
    let synthetic_dir = synthetic_dir.ok_or("missing --synthetic directory")?;
    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("."));

    let rules = load_config(&config_path)?;
    let names = required_tables(&rules);
    let source = DataLoader::new(source_dir).load(&names)?;
    let synthetic = DataLoader::new(synthetic_dir).load(&names)?;
    let compilation = compile(&source, &rules, &CompileOptions::default())?;

    let engine = EvaluationEngine::new(EvaluateOptions::default());
    let result = engine.run(&source, &synthetic, &compilation, None, &out_dir)?;

    println!("metrics_path={}", result.metrics_path.display());
    println!("report_path={}", result.report_path.display());
    println!("violations={}", result.violations.len());
    Ok(())
}
