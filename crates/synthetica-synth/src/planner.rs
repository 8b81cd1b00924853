use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rand::Rng;
use rand_regex::Regex as RandRegex;
use regex_syntax::hir::{Capture, Class, ClassUnicode, ClassUnicodeRange, Hir, HirKind, Repetition};
use synthetica_core::{
    CompilationResult, ConstraintDescriptor, RangeConstraint, SemanticType, Table, TableSchema,
    Value, parse_timestamp,
};
use tracing::{debug, warn};

use crate::checks::{anchored_regex, combination_columns};
use crate::errors::{Result, SynthError};
use crate::foreign::ForeignContext;
use crate::model::{GenerationIssue, GenerationReport, SynthOptions};

const MAX_DECIMALS: usize = 6;

/// Output layout for generated datetime values, taken from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatetimeLayout {
    Date,
    Spaced,
    Iso,
    Rfc3339,
}

impl DatetimeLayout {
    fn detect(raw: &str) -> Self {
        let raw = raw.trim();
        if DateTime::parse_from_rfc3339(raw).is_ok() {
            DatetimeLayout::Rfc3339
        } else if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
            DatetimeLayout::Date
        } else if raw.contains('T') {
            DatetimeLayout::Iso
        } else {
            DatetimeLayout::Spaced
        }
    }

    fn format(self, value: NaiveDateTime) -> String {
        match self {
            DatetimeLayout::Date => value.format("%Y-%m-%d").to_string(),
            DatetimeLayout::Spaced => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            DatetimeLayout::Iso => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
            DatetimeLayout::Rfc3339 => value.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

/// How one column's values are produced.
#[derive(Debug, Clone)]
pub enum ColumnSampler {
    /// Integer primary key `1..=n`.
    Sequence,
    /// Text primary key `<column>_<n>`.
    Labelled { prefix: String },
    /// Value drawn from the generated keys of another table.
    ForeignKey {
        parent_table: String,
        parent_column: String,
        null_rate: f64,
    },
    /// Reference into the table itself, filled after all rows exist.
    SelfReference { parent: usize, null_rate: f64 },
    /// Filled jointly by a combination group.
    Combination,
    Pattern {
        regex: Option<RandRegex>,
        fallback: Vec<Value>,
    },
    Integer { low: i64, high: i64, null_rate: f64 },
    Float {
        low: f64,
        high: f64,
        decimals: usize,
        null_rate: f64,
    },
    Datetime {
        low: i64,
        high: i64,
        layout: DatetimeLayout,
        null_rate: f64,
    },
    Resample { values: Vec<Value>, null_rate: f64 },
    Null,
}

/// Columns sampled together from combinations observed in the source.
#[derive(Debug, Clone)]
pub struct CombinationGroup {
    pub indices: Vec<usize>,
    pub combos: Vec<Vec<Value>>,
}

/// Everything needed to generate rows for one table.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub table: String,
    pub columns: Vec<String>,
    pub samplers: Vec<ColumnSampler>,
    pub groups: Vec<CombinationGroup>,
    pub primary_key: Option<usize>,
}

impl TablePlan {
    pub fn build(
        source: &Table,
        schema: &TableSchema,
        compilation: &CompilationResult,
        options: &SynthOptions,
        report: &mut GenerationReport,
    ) -> Result<Self> {
        let table = source.name();
        let descriptors: Vec<&ConstraintDescriptor> = compilation.constraints_for(table).collect();
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut primary_key = None;

        let mut groups = Vec::new();
        for descriptor in &descriptors {
            let ConstraintDescriptor::FixedCombination(fixed) = descriptor else {
                continue;
            };
            let combined = combination_columns(fixed, schema);
            if combined.len() < fixed.columns.len() {
                let keys: Vec<&str> = fixed
                    .columns
                    .iter()
                    .map(String::as_str)
                    .filter(|column| !combined.contains(column))
                    .collect();
                warn!(
                    table = %table,
                    columns = %keys.join(", "),
                    "key columns left out of fixed combination"
                );
                report.record_warning(GenerationIssue {
                    level: "warning".to_string(),
                    code: "fixed_combination_key_columns".to_string(),
                    message: format!(
                        "key columns ({}) are generated independently of the combination",
                        keys.join(", ")
                    ),
                    table: Some(table.to_string()),
                    column: None,
                });
            }
            let indices: Vec<usize> = combined
                .iter()
                .filter_map(|column| source.column_index(column))
                .filter(|idx| !claimed.contains(idx))
                .collect();
            if indices.is_empty() {
                continue;
            }
            claimed.extend(indices.iter().copied());
            let combos = source
                .rows()
                .iter()
                .map(|row| indices.iter().map(|idx| row[*idx].clone()).collect())
                .collect();
            groups.push(CombinationGroup { indices, combos });
        }

        let mut samplers = Vec::with_capacity(source.columns().len());
        for (idx, column) in source.columns().iter().enumerate() {
            let column_schema = schema.column(column).ok_or_else(|| {
                SynthError::InvalidInput(format!("column {table}.{column} missing from schema"))
            })?;
            let values: Vec<&Value> = source.column_values(column).into_iter().flatten().collect();
            let pattern = descriptors.iter().find_map(|descriptor| match descriptor {
                ConstraintDescriptor::Pattern(pattern) if pattern.column == *column => {
                    Some(pattern.pattern.as_str())
                }
                _ => None,
            });
            let range = descriptors.iter().find_map(|descriptor| match descriptor {
                ConstraintDescriptor::Range(range) if range.column == *column => Some(range),
                _ => None,
            });

            let sampler = if column_schema.is_primary_key {
                primary_key = Some(idx);
                match pattern {
                    Some(pattern) => pattern_sampler(table, column, pattern, &values, options, report)?,
                    None if is_integral(&values) => ColumnSampler::Sequence,
                    None => ColumnSampler::Labelled {
                        prefix: column.clone(),
                    },
                }
            } else if let Some(edge) = compilation.relationships().edge_for(table, column) {
                if edge.is_self_reference() {
                    let parent = source.column_index(&edge.parent_column).ok_or_else(|| {
                        SynthError::InvalidInput(format!("{edge}: parent column not loaded"))
                    })?;
                    ColumnSampler::SelfReference {
                        parent,
                        null_rate: null_rate(&values),
                    }
                } else {
                    ColumnSampler::ForeignKey {
                        parent_table: edge.parent_table.clone(),
                        parent_column: edge.parent_column.clone(),
                        null_rate: null_rate(&values),
                    }
                }
            } else if claimed.contains(&idx) {
                ColumnSampler::Combination
            } else if let Some(pattern) = pattern {
                pattern_sampler(table, column, pattern, &values, options, report)?
            } else if let Some(range) = range {
                range_sampler(range, &values)?
            } else {
                empirical_sampler(column_schema.semantic_type, &values)
            };

            debug!(table = %table, column = %column, sampler = sampler_name(&sampler), "column planned");
            samplers.push(sampler);
        }

        Ok(Self {
            table: table.to_string(),
            columns: source.columns().to_vec(),
            samplers,
            groups,
            primary_key,
        })
    }

    /// Build one candidate row. Self references are left null.
    pub fn sample_row<R, F>(&self, row_index: u64, rng: &mut R, foreign: &F) -> Result<Vec<Value>>
    where
        R: Rng,
        F: ForeignContext,
    {
        let mut row = vec![Value::Null; self.columns.len()];

        for group in &self.groups {
            if group.combos.is_empty() {
                continue;
            }
            let pick = &group.combos[rng.random_range(0..group.combos.len())];
            for (slot, value) in group.indices.iter().zip(pick) {
                row[*slot] = value.clone();
            }
        }

        for (idx, sampler) in self.samplers.iter().enumerate() {
            let value = match sampler {
                ColumnSampler::Combination | ColumnSampler::SelfReference { .. } => continue,
                ColumnSampler::Sequence => Value::Int(row_index as i64 + 1),
                ColumnSampler::Labelled { prefix } => {
                    Value::Text(format!("{prefix}_{}", row_index + 1))
                }
                ColumnSampler::ForeignKey {
                    parent_table,
                    parent_column,
                    null_rate,
                } => {
                    if draw_null(rng, *null_rate) {
                        Value::Null
                    } else {
                        foreign.pick(parent_table, parent_column, rng)?
                    }
                }
                ColumnSampler::Pattern { regex, fallback } => match regex {
                    Some(regex) => Value::Text(rng.sample(regex)),
                    None => fallback[rng.random_range(0..fallback.len())].clone(),
                },
                ColumnSampler::Integer {
                    low,
                    high,
                    null_rate,
                } => {
                    if draw_null(rng, *null_rate) {
                        Value::Null
                    } else {
                        Value::Int(rng.random_range(*low..=*high))
                    }
                }
                ColumnSampler::Float {
                    low,
                    high,
                    decimals,
                    null_rate,
                } => {
                    if draw_null(rng, *null_rate) {
                        Value::Null
                    } else {
                        Value::Float(round_to(rng.random_range(*low..=*high), *decimals))
                    }
                }
                ColumnSampler::Datetime {
                    low,
                    high,
                    layout,
                    null_rate,
                } => {
                    if draw_null(rng, *null_rate) {
                        Value::Null
                    } else {
                        let seconds = rng.random_range(*low..=*high);
                        match DateTime::from_timestamp(seconds, 0) {
                            Some(moment) => Value::Text(layout.format(moment.naive_utc())),
                            None => Value::Null,
                        }
                    }
                }
                ColumnSampler::Resample { values, null_rate } => {
                    if values.is_empty() || draw_null(rng, *null_rate) {
                        Value::Null
                    } else {
                        values[rng.random_range(0..values.len())].clone()
                    }
                }
                ColumnSampler::Null => Value::Null,
            };
            row[idx] = value;
        }

        Ok(row)
    }

    /// Columns referencing the table's own primary key: `(column, parent, null_rate)`.
    pub fn self_references(&self) -> Vec<(usize, usize, f64)> {
        self.samplers
            .iter()
            .enumerate()
            .filter_map(|(idx, sampler)| match sampler {
                ColumnSampler::SelfReference { parent, null_rate } => {
                    Some((idx, *parent, *null_rate))
                }
                _ => None,
            })
            .collect()
    }
}

fn sampler_name(sampler: &ColumnSampler) -> &'static str {
    match sampler {
        ColumnSampler::Sequence => "sequence",
        ColumnSampler::Labelled { .. } => "labelled",
        ColumnSampler::ForeignKey { .. } => "foreign_key",
        ColumnSampler::SelfReference { .. } => "self_reference",
        ColumnSampler::Combination => "combination",
        ColumnSampler::Pattern { .. } => "pattern",
        ColumnSampler::Integer { .. } => "integer",
        ColumnSampler::Float { .. } => "float",
        ColumnSampler::Datetime { .. } => "datetime",
        ColumnSampler::Resample { .. } => "resample",
        ColumnSampler::Null => "null",
    }
}

pub(crate) fn draw_null<R: Rng>(rng: &mut R, null_rate: f64) -> bool {
    null_rate > 0.0 && rng.random_bool(null_rate.min(1.0))
}

fn null_rate(values: &[&Value]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let nulls = values.iter().filter(|value| value.is_null()).count();
    nulls as f64 / values.len() as f64
}

fn non_null<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
    values.iter().copied().filter(|value| !value.is_null()).collect()
}

fn is_integral(values: &[&Value]) -> bool {
    non_null(values).iter().all(|value| value.as_i64().is_some())
}

fn decimals(values: &[&Value]) -> usize {
    non_null(values)
        .iter()
        .filter_map(|value| match value {
            Value::Float(_) | Value::Text(_) => {
                let rendered = value.render();
                rendered.split_once('.').map(|(_, fraction)| fraction.len())
            }
            _ => None,
        })
        .max()
        .unwrap_or(0)
        .min(MAX_DECIMALS)
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn bounds(values: &[&Value]) -> Option<(f64, f64)> {
    non_null(values)
        .iter()
        .filter_map(|value| value.as_f64())
        .fold(None, |acc, number| match acc {
            None => Some((number, number)),
            Some((low, high)) => Some((low.min(number), high.max(number))),
        })
}

fn pattern_sampler(
    table: &str,
    column: &str,
    pattern: &str,
    values: &[&Value],
    options: &SynthOptions,
    report: &mut GenerationReport,
) -> Result<ColumnSampler> {
    match compile_printable(strip_anchors(pattern), options.regex_max_repeat) {
        Ok(regex) => Ok(ColumnSampler::Pattern {
            regex: Some(regex),
            fallback: Vec::new(),
        }),
        Err(err) => {
            let matcher = anchored_regex(pattern)?;
            let fallback: Vec<Value> = non_null(values)
                .into_iter()
                .filter(|value| matcher.is_match(&value.render()))
                .cloned()
                .collect();
            if fallback.is_empty() {
                return Err(SynthError::Unsatisfiable(format!(
                    "pattern '{pattern}' on {table}.{column} cannot be sampled ({err}) and no source value matches it"
                )));
            }
            warn!(table = %table, column = %column, error = %err, "pattern not samplable; resampling matching source values");
            report.record_fallback();
            report.record_warning(GenerationIssue {
                level: "warning".to_string(),
                code: "pattern_fallback".to_string(),
                message: format!("pattern '{pattern}' resampled from source values: {err}"),
                table: Some(table.to_string()),
                column: Some(column.to_string()),
            });
            Ok(ColumnSampler::Pattern {
                regex: None,
                fallback,
            })
        }
    }
}

/// Compile a pattern for sampling with character classes narrowed to
/// printable ASCII. Classes with no printable member are kept as written.
fn compile_printable(
    pattern: &str,
    max_repeat: u32,
) -> std::result::Result<RandRegex, rand_regex::Error> {
    let hir = regex_syntax::Parser::new().parse(pattern)?;
    RandRegex::with_hir(printable(hir), max_repeat)
}

fn printable(hir: Hir) -> Hir {
    match hir.into_kind() {
        HirKind::Class(Class::Unicode(class)) => {
            let mut narrowed = class.clone();
            narrowed.intersect(&ClassUnicode::new([ClassUnicodeRange::new(' ', '~')]));
            if narrowed.ranges().is_empty() {
                Hir::class(Class::Unicode(class))
            } else {
                Hir::class(Class::Unicode(narrowed))
            }
        }
        HirKind::Class(class) => Hir::class(class),
        HirKind::Repetition(rep) => {
            let sub = Box::new(printable(*rep.sub));
            Hir::repetition(Repetition { sub, ..rep })
        }
        HirKind::Capture(capture) => {
            let sub = Box::new(printable(*capture.sub));
            Hir::capture(Capture { sub, ..capture })
        }
        HirKind::Concat(subs) => Hir::concat(subs.into_iter().map(printable).collect()),
        HirKind::Alternation(subs) => Hir::alternation(subs.into_iter().map(printable).collect()),
        HirKind::Literal(literal) => Hir::literal(literal.0),
        HirKind::Look(look) => Hir::look(look),
        HirKind::Empty => Hir::empty(),
    }
}

fn strip_anchors(pattern: &str) -> &str {
    let pattern = pattern.strip_prefix('^').unwrap_or(pattern);
    match pattern.strip_suffix('$') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => pattern,
    }
}

fn range_sampler(range: &RangeConstraint, values: &[&Value]) -> Result<ColumnSampler> {
    let observed = bounds(values);
    let (low, high) = match observed {
        Some((min, max)) if min.max(range.low) <= max.min(range.high) => {
            (min.max(range.low), max.min(range.high))
        }
        _ => (range.low, range.high),
    };

    if is_integral(values) && observed.is_some() {
        let (mut int_low, mut int_high) = integer_bounds(low, high, range);
        if int_low > int_high {
            (int_low, int_high) = integer_bounds(range.low, range.high, range);
        }
        if int_low > int_high {
            return Err(SynthError::Unsatisfiable(format!(
                "range on {}.{} admits no integer value",
                range.table, range.column
            )));
        }
        return Ok(ColumnSampler::Integer {
            low: int_low,
            high: int_high,
            null_rate: 0.0,
        });
    }

    let (low, high) = if low == high && !range.contains(low) {
        (range.low, range.high)
    } else {
        (low, high)
    };
    Ok(ColumnSampler::Float {
        low,
        high,
        decimals: decimals(values),
        null_rate: 0.0,
    })
}

fn integer_bounds(low: f64, high: f64, range: &RangeConstraint) -> (i64, i64) {
    let mut int_low = low.ceil();
    let mut int_high = high.floor();
    if range.strict {
        if int_low <= range.low {
            int_low = range.low.floor() + 1.0;
        }
        if int_high >= range.high {
            int_high = range.high.ceil() - 1.0;
        }
    }
    (int_low as i64, int_high as i64)
}

fn empirical_sampler(semantic_type: SemanticType, values: &[&Value]) -> ColumnSampler {
    let present = non_null(values);
    if present.is_empty() {
        return ColumnSampler::Null;
    }
    let null_rate = null_rate(values);

    match semantic_type {
        SemanticType::Numeric => match bounds(values) {
            Some((low, high)) if is_integral(values) => ColumnSampler::Integer {
                low: low as i64,
                high: high as i64,
                null_rate,
            },
            Some((low, high)) => ColumnSampler::Float {
                low,
                high,
                decimals: decimals(values),
                null_rate,
            },
            None => resample(present, null_rate),
        },
        SemanticType::Datetime => {
            let moments: Vec<i64> = present
                .iter()
                .filter_map(|value| parse_timestamp(value))
                .map(|moment| moment.and_utc().timestamp())
                .collect();
            let layout = DatetimeLayout::detect(&present[0].render());
            match (moments.iter().min(), moments.iter().max()) {
                (Some(low), Some(high)) => ColumnSampler::Datetime {
                    low: *low,
                    high: *high,
                    layout,
                    null_rate,
                },
                _ => resample(present, null_rate),
            }
        }
        SemanticType::Categorical | SemanticType::Text | SemanticType::Identifier => {
            resample(present, null_rate)
        }
    }
}

fn resample(present: Vec<&Value>, null_rate: f64) -> ColumnSampler {
    ColumnSampler::Resample {
        values: present.into_iter().cloned().collect(),
        null_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(low: f64, high: f64, strict: bool) -> RangeConstraint {
        RangeConstraint {
            table: "orders".to_string(),
            column: "quantity".to_string(),
            low,
            high,
            strict,
        }
    }

    #[test]
    fn strict_integer_range_excludes_endpoints() {
        let values = [Value::Int(0), Value::Int(10)];
        let refs: Vec<&Value> = values.iter().collect();
        match range_sampler(&range(0.0, 10.0, true), &refs).expect("sampler") {
            ColumnSampler::Integer { low, high, .. } => assert_eq!((low, high), (1, 9)),
            other => panic!("unexpected sampler {other:?}"),
        }
    }

    #[test]
    fn observed_bounds_are_clipped_to_range() {
        let values = [Value::Float(5.5), Value::Float(500.25)];
        let refs: Vec<&Value> = values.iter().collect();
        match range_sampler(&range(10.0, 100.0, false), &refs).expect("sampler") {
            ColumnSampler::Float {
                low,
                high,
                decimals,
                ..
            } => {
                assert_eq!((low, high), (10.0, 100.0));
                assert_eq!(decimals, 2);
            }
            other => panic!("unexpected sampler {other:?}"),
        }
    }

    #[test]
    fn integer_range_without_integers_is_unsatisfiable() {
        let values = [Value::Int(1)];
        let refs: Vec<&Value> = values.iter().collect();
        assert!(range_sampler(&range(0.2, 0.8, false), &refs).is_err());
    }

    #[test]
    fn anchors_are_stripped_for_sampling() {
        assert_eq!(strip_anchors("^[a-z]+$"), "[a-z]+");
        assert_eq!(strip_anchors("price\\$"), "price\\$");
    }

    #[test]
    fn negated_classes_sample_printable_ascii() {
        use rand::SeedableRng;

        let pattern = "^[^@]+@[^@]+\\.[a-z]{2,}$";
        let regex = compile_printable(strip_anchors(pattern), 8).expect("compile");
        let matcher = anchored_regex(pattern).expect("matcher");
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let email: String = rng.sample(&regex);
            assert!(
                email.chars().all(|ch| (' '..='~').contains(&ch)),
                "non-printable sample {email:?}"
            );
            assert!(matcher.is_match(&email), "{email:?} does not match");
        }
    }

    #[test]
    fn classes_without_printable_members_are_kept() {
        use rand::SeedableRng;

        let regex = compile_printable("[\\x{e9}-\\x{ff}]{3}", 0).expect("compile");
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let sample: String = rng.sample(&regex);
        assert_eq!(sample.chars().count(), 3);
        assert!(sample.chars().all(|ch| ('\u{e9}'..='\u{ff}').contains(&ch)));
    }

    #[test]
    fn datetime_layout_follows_source() {
        assert_eq!(DatetimeLayout::detect("2024-01-02"), DatetimeLayout::Date);
        assert_eq!(
            DatetimeLayout::detect("2024-01-02 10:00:00"),
            DatetimeLayout::Spaced
        );
        assert_eq!(
            DatetimeLayout::detect("2024-01-02T10:00:00Z"),
            DatetimeLayout::Rfc3339
        );
    }
}
