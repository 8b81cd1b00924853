use std::collections::{HashMap, HashSet};
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use synthetica_core::{CompilationResult, Table, TableRegistry, Value};
use tracing::{info, warn};

use crate::checks::{TableChecks, value_key};
use crate::errors::{Result, SynthError};
use crate::foreign::{ForeignContext, InMemoryForeignContext};
use crate::model::{GenerationReport, RowCount, Synthesis, SynthOptions, TableReport};
use crate::planner::{TablePlan, draw_null};

const SELF_REFERENCE_SALT: u64 = 0x5e1f_5e1f_5e1f_5e1f;

/// A synthesis engine: consumes source tables and a compilation result and
/// produces new tables of the same shape.
pub trait Synthesizer {
    fn synthesize(
        &self,
        tables: &TableRegistry,
        compilation: &CompilationResult,
        rows: RowCount,
    ) -> Result<Synthesis>;
}

/// Baseline engine that resamples the empirical distribution of each column
/// while honoring keys and compiled constraints.
#[derive(Debug, Clone, Default)]
pub struct EmpiricalSynthesizer {
    options: SynthOptions,
}

impl EmpiricalSynthesizer {
    pub fn new(options: SynthOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SynthOptions {
        &self.options
    }
}

impl Synthesizer for EmpiricalSynthesizer {
    fn synthesize(
        &self,
        tables: &TableRegistry,
        compilation: &CompilationResult,
        rows: RowCount,
    ) -> Result<Synthesis> {
        let start = Instant::now();
        let graph = compilation.graph_report();
        let order = graph.topo_order.ok_or_else(|| {
            SynthError::Unsatisfiable(format!(
                "relationship cycle between tables: {}",
                graph.cycle.unwrap_or_default().join(", ")
            ))
        })?;

        let mut report = GenerationReport::new(self.options.seed, compilation.fingerprint());
        report.table_order = order.clone();
        let mut foreign = InMemoryForeignContext::new();
        let mut generated: HashMap<String, Table> = HashMap::new();

        info!(
            seed = self.options.seed,
            tables = order.len(),
            fingerprint = %compilation.fingerprint(),
            "synthesis started"
        );

        for name in &order {
            let table_start = Instant::now();
            let source = tables.get(name).ok_or_else(|| {
                SynthError::InvalidInput(format!("table '{name}' has no source data"))
            })?;
            let schema = compilation.schema().table(name).ok_or_else(|| {
                SynthError::InvalidInput(format!("table '{name}' missing from schema"))
            })?;

            let requested = rows.resolve(source.row_count());
            let plan = TablePlan::build(source, schema, compilation, &self.options, &mut report)?;
            let checks = TableChecks::compile(compilation.constraints_for(name), source, schema)?;
            let table_seed = hash_seed(self.options.seed, name);

            let (table, retries) =
                generate_table(&plan, &checks, &foreign, table_seed, requested, &self.options)?;
            foreign.ingest_table(&table, schema);

            report.tables.push(TableReport {
                table: name.clone(),
                rows_source: source.row_count() as u64,
                rows_requested: requested,
                rows_generated: table.row_count() as u64,
                retries,
            });
            report.retries_total += retries;

            info!(
                table = %name,
                rows_generated = table.row_count(),
                retries,
                duration_ms = table_start.elapsed().as_millis() as u64,
                "table synthesized"
            );
            generated.insert(name.clone(), table);
        }

        let mut output = TableRegistry::new();
        for source in tables.iter() {
            if let Some(table) = generated.remove(source.name()) {
                output.insert(table)?;
            }
        }

        info!(
            tables = output.len(),
            retries_total = report.retries_total,
            duration_ms = start.elapsed().as_millis() as u64,
            "synthesis completed"
        );

        Ok(Synthesis {
            tables: output,
            report,
        })
    }
}

fn generate_table<F: ForeignContext>(
    plan: &TablePlan,
    checks: &TableChecks,
    foreign: &F,
    table_seed: u64,
    rows: u64,
    options: &SynthOptions,
) -> Result<(Table, u64)> {
    let mut table = Table::new(plan.table.clone(), plan.columns.clone());
    let mut keys: HashSet<String> = HashSet::new();
    let mut retries = 0_u64;
    let max_attempts = options.max_attempts_row.max(1);

    for row_index in 0..rows {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let mut rng = ChaCha8Rng::seed_from_u64(hash_row_seed(table_seed, row_index, attempt));
            let row = plan.sample_row(row_index, &mut rng, foreign)?;

            let rejection = if let Some(violation) = checks.first_violation(&plan.columns, &row) {
                Some(violation.message)
            } else if let Some(pk) = plan.primary_key {
                let key = value_key(&row[pk]);
                if row[pk].is_null() {
                    Some(format!("primary key {} is null", plan.columns[pk]))
                } else if keys.contains(&key) {
                    Some(format!("duplicate primary key {} = {key}", plan.columns[pk]))
                } else {
                    None
                }
            } else {
                None
            };

            match rejection {
                None => {
                    if let Some(pk) = plan.primary_key {
                        keys.insert(value_key(&row[pk]));
                    }
                    table.push_row(row)?;
                    break;
                }
                Some(reason) if attempt >= max_attempts => {
                    warn!(
                        table = %plan.table,
                        row = row_index,
                        attempts = attempt,
                        reason = %reason,
                        "row rejected too many times"
                    );
                    return Err(SynthError::Unsatisfiable(format!(
                        "table '{}' row {row_index} failed {attempt} attempts: {reason}",
                        plan.table
                    )));
                }
                Some(_) => retries += 1,
            }
        }
    }

    fill_self_references(plan, &mut table, table_seed)?;
    Ok((table, retries))
}

/// Point each self-referencing column at an earlier row's key, so the
/// hierarchy is acyclic. The first row always gets null.
fn fill_self_references(plan: &TablePlan, table: &mut Table, table_seed: u64) -> Result<()> {
    let references = plan.self_references();
    if references.is_empty() {
        return Ok(());
    }

    let mut rows: Vec<Vec<Value>> = table.rows().to_vec();
    for row_index in 0..rows.len() {
        let mut rng = ChaCha8Rng::seed_from_u64(hash_row_seed(
            table_seed ^ SELF_REFERENCE_SALT,
            row_index as u64,
            0,
        ));
        for (column, parent, null_rate) in &references {
            let value = if row_index == 0 || draw_null(&mut rng, *null_rate) {
                Value::Null
            } else {
                let target = rng.random_range(0..row_index);
                rows[target][*parent].clone()
            };
            rows[row_index][*column] = value;
        }
    }

    *table = Table::from_rows(plan.table.clone(), plan.columns.clone(), rows)?;
    Ok(())
}

pub(crate) fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hash_row_seed(table_seed: u64, row_index: u64, attempt: u32) -> u64 {
    let mut hash = table_seed ^ row_index.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= attempt as u64;
    hash = hash.wrapping_mul(0x100000001b3);
    hash
}
