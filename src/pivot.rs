use crate::bucketing::DisbursementRecord;
use crate::utils::{compare_stage_ids, round_to};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const TOTAL_COLUMN: &str = "Total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measure {
    /// Disbursed amount in millions.
    Amount,
    /// Disbursed amount as a percentage of the operation's commitment.
    Percentage,
}

impl Measure {
    fn value(self, record: &DisbursementRecord) -> f64 {
        match self {
            Self::Amount => record.amount.map_or(0.0, |a| a / 1_000_000.0),
            Self::Percentage => record.share_of_commitment.unwrap_or(0.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Amount => "Monto",
            Self::Percentage => "Porcentaje",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub stage_id: String,
    /// One cell per entry of [`PivotMatrix::years`], zero where nothing was disbursed.
    pub cells: Vec<f64>,
    pub total: f64,
}

/// Stage-by-elapsed-year matrix of one measure, with a trailing total column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotMatrix {
    pub measure: Measure,
    pub years: Vec<u32>,
    pub rows: Vec<PivotRow>,
}

impl PivotMatrix {
    /// Builds the matrix over the stages and years present in `records`.
    pub fn build(records: &[DisbursementRecord], measure: Measure) -> Self {
        let (stages, years) = index_of(records);
        Self::build_with_index(records, measure, &stages, &years)
    }

    /// Builds the matrix over a fixed row/column index, so that several measures line up.
    pub fn build_with_index(
        records: &[DisbursementRecord],
        measure: Measure,
        stages: &[String],
        years: &[u32],
    ) -> Self {
        let mut sums: BTreeMap<(&str, u32), f64> = BTreeMap::new();
        for record in records {
            if let Some(stage) = record.stage_id.as_deref() {
                *sums.entry((stage, record.elapsed_year)).or_insert(0.0) += measure.value(record);
            }
        }

        let rows = stages
            .iter()
            .map(|stage| {
                let cells: Vec<f64> = years
                    .iter()
                    .map(|&year| {
                        let sum = sums.get(&(stage.as_str(), year)).copied().unwrap_or(0.0);
                        round_to(sum, 2)
                    })
                    .collect();
                let total = round_to(cells.iter().sum(), 2);
                PivotRow {
                    stage_id: stage.clone(),
                    cells,
                    total,
                }
            })
            .collect();

        Self {
            measure,
            years: years.to_vec(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, stage_id: &str, year: u32) -> Option<f64> {
        let col = self.years.iter().position(|&y| y == year)?;
        self.rows
            .iter()
            .find(|r| r.stage_id == stage_id)
            .map(|r| r.cells[col])
    }

    pub fn row(&self, stage_id: &str) -> Option<&PivotRow> {
        self.rows.iter().find(|r| r.stage_id == stage_id)
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.years.len() + 2);
        header.push("IDEtapa".to_string());
        header.extend(self.years.iter().map(|y| y.to_string()));
        header.push(TOTAL_COLUMN.to_string());
        header
    }

    pub fn to_markdown(&self) -> String {
        let header = self.header();
        let mut output = String::new();

        output.push_str(&format!("| {} |\n", header.join(" | ")));
        output.push_str(&format!("|{}\n", "---|".repeat(header.len())));

        for row in &self.rows {
            let mut fields = Vec::with_capacity(row.cells.len() + 2);
            fields.push(row.stage_id.clone());
            fields.extend(row.cells.iter().map(|c| format!("{:.2}", c)));
            fields.push(format!("{:.2}", row.total));
            output.push_str(&format!("| {} |\n", fields.join(" | ")));
        }

        output
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds the amount and percentage pivots over one shared stage/year index.
pub fn build_pivot_pair(records: &[DisbursementRecord]) -> (PivotMatrix, PivotMatrix) {
    let (stages, years) = index_of(records);
    (
        PivotMatrix::build_with_index(records, Measure::Amount, &stages, &years),
        PivotMatrix::build_with_index(records, Measure::Percentage, &stages, &years),
    )
}

fn index_of(records: &[DisbursementRecord]) -> (Vec<String>, Vec<u32>) {
    let stage_set: BTreeSet<&str> = records.iter().filter_map(|r| r.stage_id.as_deref()).collect();
    let mut stages: Vec<String> = stage_set.into_iter().map(str::to_string).collect();
    stages.sort_by(|a, b| compare_stage_ids(a, b));

    let years: BTreeSet<u32> = records
        .iter()
        .filter(|r| r.stage_id.is_some())
        .map(|r| r.elapsed_year)
        .collect();

    (stages, years.into_iter().collect())
}
