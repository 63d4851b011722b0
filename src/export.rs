use crate::aggregation::{StageYearRow, YearRow};
use crate::bucketing::DisbursementRecord;
use crate::error::Result;
use crate::pivot::PivotMatrix;
use csv::WriterBuilder;
use serde::Serialize;

/// A row type with a fixed column list, exportable as a table.
///
/// `COLUMNS` must list the serialized field names in declaration order.
pub trait Tabular: Serialize {
    const COLUMNS: &'static [&'static str];
}

impl Tabular for DisbursementRecord {
    const COLUMNS: &'static [&'static str] = &[
        "disbursement_id",
        "reference",
        "amount",
        "amount_millions",
        "effective_date",
        "effective_year",
        "project_number",
        "operation_number",
        "stage_id",
        "alias",
        "country",
        "vigency_date",
        "status",
        "committed_amount",
        "share_of_commitment",
        "priority_area_id",
        "intervention_area_id",
        "elapsed_year",
    ];
}

impl Tabular for StageYearRow {
    const COLUMNS: &'static [&'static str] = &[
        "stage_id",
        "year",
        "amount",
        "cumulative_amount",
        "percentage",
        "cumulative_percentage",
    ];
}

impl Tabular for YearRow {
    const COLUMNS: &'static [&'static str] = &[
        "year",
        "amount",
        "cumulative_amount",
        "percentage",
        "cumulative_percentage",
    ];
}

/// Serializes rows as CSV bytes. The header is written even when `rows` is empty.
pub fn to_csv_bytes<T: Tabular>(rows: &[T]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    wtr.write_record(T::COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| e.into_error().into())
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

impl PivotMatrix {
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = WriterBuilder::new().from_writer(Vec::new());
        wtr.write_record(self.header())?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(row.cells.len() + 2);
            record.push(row.stage_id.clone());
            record.extend(row.cells.iter().map(|c| c.to_string()));
            record.push(row.total.to_string());
            wtr.write_record(&record)?;
        }
        wtr.into_inner().map_err(|e| e.into_error().into())
    }
}
