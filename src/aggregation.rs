use crate::bucketing::DisbursementRecord;
use crate::utils::{compare_stage_ids, percentage_of, round_to};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MILLION: f64 = 1_000_000.0;

/// Disbursed amount of one stage in one elapsed year. Amounts are in millions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageYearRow {
    pub stage_id: String,
    pub year: u32,
    pub amount: f64,
    pub cumulative_amount: f64,
    /// Share of the stage total disbursed this year.
    pub percentage: Option<f64>,
    /// Cumulative amount relative to the stage's largest cumulative amount.
    pub cumulative_percentage: Option<f64>,
}

/// Disbursed amount of one elapsed year across the whole selection. Amounts are in millions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRow {
    pub year: u32,
    pub amount: f64,
    pub cumulative_amount: f64,
    /// Share of the committed total.
    pub percentage: Option<f64>,
    pub cumulative_percentage: Option<f64>,
}

/// Sums per stage and elapsed year. Missing amounts add nothing; records without a stage id
/// are skipped.
fn stage_year_sums(records: &[DisbursementRecord]) -> BTreeMap<String, BTreeMap<u32, f64>> {
    let mut sums: BTreeMap<String, BTreeMap<u32, f64>> = BTreeMap::new();
    let mut without_stage = 0usize;

    for record in records {
        let Some(stage) = record.stage_id.as_ref() else {
            without_stage += 1;
            continue;
        };

        *sums
            .entry(stage.clone())
            .or_default()
            .entry(record.elapsed_year)
            .or_insert(0.0) += record.amount.unwrap_or(0.0);
    }

    if without_stage > 0 {
        debug!("Skipped {} records without stage id", without_stage);
    }

    sums
}

/// Groups by (stage, year), ordered by stage then ascending year.
///
/// Percentages use raw amounts; amounts are scaled to millions and everything is rounded
/// to two decimals last.
pub fn aggregate_by_stage_year(records: &[DisbursementRecord]) -> Vec<StageYearRow> {
    let sums = stage_year_sums(records);

    let mut stages: Vec<(&String, &BTreeMap<u32, f64>)> = sums.iter().collect();
    stages.sort_by(|a, b| compare_stage_ids(a.0, b.0));

    let mut rows = Vec::new();

    for (stage_id, years) in stages {
        let stage_total: f64 = years.values().sum();

        let mut running = 0.0;
        let cumulative: Vec<(u32, f64, f64)> = years
            .iter()
            .map(|(&year, &amount)| {
                running += amount;
                (year, amount, running)
            })
            .collect();

        let cumulative_max = cumulative
            .iter()
            .map(|&(_, _, cum)| cum)
            .fold(f64::NEG_INFINITY, f64::max);

        for (year, amount, cum) in cumulative {
            rows.push(StageYearRow {
                stage_id: stage_id.clone(),
                year,
                amount: round_to(amount / MILLION, 2),
                cumulative_amount: round_to(cum / MILLION, 2),
                percentage: percentage_of(amount, stage_total).map(|p| round_to(p, 2)),
                cumulative_percentage: percentage_of(cum, cumulative_max)
                    .map(|p| round_to(p, 2)),
            });
        }
    }

    rows
}

/// Groups by elapsed year only.
///
/// Percentages are relative to the committed amount of the first record, which is only
/// meaningful when the selection covers a single commitment (one operation or stage).
pub fn aggregate_by_year(records: &[DisbursementRecord]) -> Vec<YearRow> {
    let Some(first) = records.first() else {
        return Vec::new();
    };

    let commitment = first.committed_amount;
    if commitment.map_or(true, |c| c == 0.0) {
        warn!("Committed amount of the first record is missing or zero; yearly percentages left empty");
    }

    let mut sums: BTreeMap<u32, f64> = BTreeMap::new();
    for record in records {
        *sums.entry(record.elapsed_year).or_insert(0.0) += record.amount.unwrap_or(0.0);
    }

    let mut running = 0.0;
    sums.into_iter()
        .map(|(year, amount)| {
            running += amount;
            let share = |value: f64| {
                commitment
                    .and_then(|c| percentage_of(value, c))
                    .map(|p| round_to(p, 2))
            };
            YearRow {
                year,
                amount: round_to(amount / MILLION, 2),
                cumulative_amount: round_to(running / MILLION, 2),
                percentage: share(amount),
                cumulative_percentage: share(running),
            }
        })
        .collect()
}

/// Display labels `"<stage> (<alias>)"` per stage id, in stage order. The first alias seen
/// for a stage wins.
pub fn stage_labels(records: &[DisbursementRecord]) -> Vec<(String, String)> {
    let mut aliases: BTreeMap<&str, &str> = BTreeMap::new();
    for record in records {
        if let Some(stage) = record.stage_id.as_deref() {
            let alias = record.alias.as_deref().unwrap_or("");
            let entry = aliases.entry(stage).or_insert(alias);
            if entry.is_empty() {
                *entry = alias;
            }
        }
    }

    let mut labels: Vec<(String, String)> = aliases
        .into_iter()
        .map(|(stage, alias)| (stage.to_string(), format!("{} ({})", stage, alias)))
        .collect();
    labels.sort_by(|a, b| compare_stage_ids(&a.0, &b.0));
    labels
}
