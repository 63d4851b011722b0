use crate::schema::{DisbursementRow, OperationRow, ProjectRow, RawTables, ReferenceKey};
use crate::utils::{normalize_key, normalize_text, parse_amount, parse_date_dayfirst};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_number: String,
    pub priority_area_id: Option<String>,
    pub intervention_area_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub project_number: Option<String>,
    pub operation_number: Option<String>,
    pub stage_id: Option<String>,
    pub alias: Option<String>,
    pub country: Option<String>,
    /// `None` when the raw date did not parse.
    pub vigency_date: Option<NaiveDate>,
    pub status: Option<String>,
    /// `None` when the raw amount did not parse.
    pub committed_amount: Option<f64>,
}

impl Operation {
    /// The operation column a disbursement reference is matched against.
    pub fn join_key(&self, reference_key: ReferenceKey) -> Option<&str> {
        match reference_key {
            ReferenceKey::OperationNumber => self.operation_number.as_deref(),
            ReferenceKey::StageId => self.stage_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub disbursement_id: Option<String>,
    pub reference: Option<String>,
    pub amount: Option<f64>,
    pub effective_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTables {
    pub projects: Vec<Project>,
    pub operations: Vec<Operation>,
    pub disbursements: Vec<Disbursement>,
}

pub fn normalize_projects(rows: &[ProjectRow]) -> Vec<Project> {
    let projects: Vec<Project> = rows
        .iter()
        .filter_map(|row| {
            Some(Project {
                project_number: normalize_key(row.project_number.as_deref())?,
                priority_area_id: normalize_key(row.priority_area_id.as_deref()),
                intervention_area_id: normalize_key(row.intervention_area_id.as_deref()),
            })
        })
        .collect();

    if projects.len() < rows.len() {
        debug!(
            "Dropped {} project rows without NoProyecto",
            rows.len() - projects.len()
        );
    }

    projects
}

pub fn normalize_operations(rows: &[OperationRow]) -> Vec<Operation> {
    rows.iter()
        .map(|row| Operation {
            project_number: normalize_key(row.project_number.as_deref()),
            operation_number: normalize_key(row.operation_number.as_deref()),
            stage_id: normalize_key(row.stage_id.as_deref()),
            alias: normalize_text(row.alias.as_deref()),
            country: normalize_text(row.country.as_deref()),
            vigency_date: row.vigency_date.as_deref().and_then(parse_date_dayfirst),
            status: normalize_text(row.status.as_deref()),
            committed_amount: row.committed_amount.as_deref().and_then(parse_amount),
        })
        .collect()
}

pub fn normalize_disbursements(
    rows: &[DisbursementRow],
    reference_key: ReferenceKey,
) -> Vec<Disbursement> {
    rows.iter()
        .map(|row| Disbursement {
            disbursement_id: normalize_key(row.disbursement_id.as_deref()),
            reference: normalize_key(row.reference(reference_key)),
            amount: row.amount.as_deref().and_then(parse_amount),
            effective_date: row.effective_date.as_deref().and_then(parse_date_dayfirst),
        })
        .collect()
}

pub fn normalize_tables(raw: &RawTables, reference_key: ReferenceKey) -> NormalizedTables {
    let tables = NormalizedTables {
        projects: normalize_projects(&raw.projects),
        operations: normalize_operations(&raw.operations),
        disbursements: normalize_disbursements(&raw.disbursements, reference_key),
    };

    let missing_amounts = tables
        .disbursements
        .iter()
        .filter(|d| d.amount.is_none())
        .count();
    let missing_dates = tables
        .disbursements
        .iter()
        .filter(|d| d.effective_date.is_none())
        .count();
    debug!(
        "Normalized disbursements: {} without amount, {} without effective date",
        missing_amounts, missing_dates
    );

    tables
}
