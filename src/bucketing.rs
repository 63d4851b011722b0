use crate::join::JoinedRecord;
use crate::schema::YearLength;
use crate::utils::{percentage_of, round_to};
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

/// Bucket assigned when either date is missing. Always excluded.
pub const MISSING_ELAPSED_YEAR: i64 = -1;

/// A retained disbursement, flattened with its operation and project attributes.
///
/// Only records with both dates present and a non-negative elapsed year exist in this
/// form, so `elapsed_year` is unsigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementRecord {
    pub disbursement_id: Option<String>,
    pub reference: Option<String>,
    pub amount: Option<f64>,
    /// Export-only display value; the amount pivot sums raw `amount` instead.
    pub amount_millions: Option<f64>,
    pub effective_date: NaiveDate,
    pub effective_year: i32,
    pub project_number: Option<String>,
    pub operation_number: Option<String>,
    pub stage_id: Option<String>,
    pub alias: Option<String>,
    pub country: Option<String>,
    pub vigency_date: NaiveDate,
    pub status: Option<String>,
    pub committed_amount: Option<f64>,
    pub share_of_commitment: Option<f64>,
    pub priority_area_id: Option<String>,
    pub intervention_area_id: Option<String>,
    pub elapsed_year: u32,
}

/// `floor((effective - vigency) in days / year length)`, or [`MISSING_ELAPSED_YEAR`]
/// when a date is missing.
pub fn elapsed_year(
    effective_date: Option<NaiveDate>,
    vigency_date: Option<NaiveDate>,
    year_length: YearLength,
) -> i64 {
    match (effective_date, vigency_date) {
        (Some(effective), Some(vigency)) => (effective - vigency)
            .num_days()
            .div_euclid(year_length.days()),
        _ => MISSING_ELAPSED_YEAR,
    }
}

/// Assigns every joined record its elapsed year and drops the negative ones
/// (missing dates, or money moved before the contract was in force).
pub fn bucket_records(records: &[JoinedRecord], year_length: YearLength) -> Vec<DisbursementRecord> {
    let mut dropped = 0usize;
    let mut bucketed = Vec::with_capacity(records.len());

    for record in records {
        match bucket_record(record, year_length) {
            Some(r) => bucketed.push(r),
            None => dropped += 1,
        }
    }

    debug!(
        "Bucketed {} records with {}-day years, dropped {} with missing dates or negative years",
        bucketed.len(),
        year_length.days(),
        dropped
    );

    bucketed
}

fn bucket_record(record: &JoinedRecord, year_length: YearLength) -> Option<DisbursementRecord> {
    let disbursement = &record.disbursement;
    let operation = record.operation.as_ref();

    let effective_date = disbursement.effective_date?;
    let vigency_date = operation.and_then(|op| op.vigency_date)?;

    let year = elapsed_year(Some(effective_date), Some(vigency_date), year_length);
    let elapsed_year = u32::try_from(year).ok()?;

    let committed_amount = operation.and_then(|op| op.committed_amount);
    let share_of_commitment = disbursement
        .amount
        .zip(committed_amount)
        .and_then(|(amount, committed)| percentage_of(amount, committed))
        .map(|pct| round_to(pct, 2));

    Some(DisbursementRecord {
        disbursement_id: disbursement.disbursement_id.clone(),
        reference: disbursement.reference.clone(),
        amount: disbursement.amount,
        amount_millions: disbursement.amount.map(|a| round_to(a / 1_000_000.0, 3)),
        effective_date,
        effective_year: effective_date.year(),
        project_number: operation.and_then(|op| op.project_number.clone()),
        operation_number: operation.and_then(|op| op.operation_number.clone()),
        stage_id: operation.and_then(|op| op.stage_id.clone()),
        alias: operation.and_then(|op| op.alias.clone()),
        country: operation.and_then(|op| op.country.clone()),
        vigency_date,
        status: operation.and_then(|op| op.status.clone()),
        committed_amount,
        share_of_commitment,
        priority_area_id: record
            .project
            .as_ref()
            .and_then(|p| p.priority_area_id.clone()),
        intervention_area_id: record
            .project
            .as_ref()
            .and_then(|p| p.intervention_area_id.clone()),
        elapsed_year,
    })
}
