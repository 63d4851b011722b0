use crate::error::{DisbursementError, Result};
use crate::schema::{DisbursementRow, OperationRow, ProjectRow, RawTables, ReferenceKey};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::io::Read;

pub fn read_projects<R: Read>(reader: R) -> Result<Vec<ProjectRow>> {
    read_table(reader, "projects", &ProjectRow::COLUMNS)
}

pub fn read_operations<R: Read>(reader: R) -> Result<Vec<OperationRow>> {
    read_table(reader, "operations", &OperationRow::COLUMNS)
}

pub fn read_disbursements<R: Read>(
    reader: R,
    reference_key: ReferenceKey,
) -> Result<Vec<DisbursementRow>> {
    read_table(
        reader,
        "disbursements",
        &DisbursementRow::required_columns(reference_key),
    )
}

impl RawTables {
    pub fn from_csv_readers<P: Read, O: Read, D: Read>(
        projects: P,
        operations: O,
        disbursements: D,
        reference_key: ReferenceKey,
    ) -> Result<Self> {
        Ok(Self {
            projects: read_projects(projects)?,
            operations: read_operations(operations)?,
            disbursements: read_disbursements(disbursements, reference_key)?,
        })
    }
}

/// Reads a headed CSV table, checking that every required column is present.
/// Rows that fail to deserialize are skipped, never fatal.
fn read_table<T, R>(reader: R, table: &str, required: &[&str]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(DisbursementError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (idx, result) in rdr.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!("Skipping malformed {} row #{}: {}", table, idx + 1, e);
            }
        }
    }

    debug!("Read {} {} rows ({} skipped)", rows.len(), table, skipped);

    Ok(rows)
}
