//! # Disbursement Analytics
//!
//! A library for reconciling three development-finance tables (projects, operations and
//! disbursements) into one enriched record set, and deriving elapsed-year aggregates and
//! pivots of disbursed amounts against committed funds.
//!
//! ## Core Concepts
//!
//! - **Vigency date**: the date an operation's contract comes into force
//! - **Elapsed year**: full years between vigency and a disbursement's effective date
//! - **Stage (IDEtapa)**: the grouping key of the per-stage aggregates and of the pivots
//! - **Committed amount**: the operation's approved funding, the denominator of percentages
//!
//! The pipeline is strictly ordered: normalize, select, join, bucket, aggregate, pivot.
//! Unparseable amounts and dates never fail a run; they become `None` and the affected
//! disbursements drop out at bucketing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use disbursement_analytics::*;
//!
//! let tables = RawTables::from_csv_readers(
//!     projects_csv.as_bytes(),
//!     operations_csv.as_bytes(),
//!     disbursements_csv.as_bytes(),
//!     ReferenceKey::OperationNumber,
//! )?;
//!
//! let config = PipelineConfig::new(ReferenceKey::OperationNumber)
//!     .with_join_mode(JoinMode::Inner)
//!     .with_countries(["PY", "BO"]);
//!
//! let output = process_disbursements(&tables, &config)?;
//! println!("{}", output.amount_pivot.to_markdown());
//! ```

pub mod aggregation;
pub mod bucketing;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod join;
pub mod normalizer;
pub mod pivot;
pub mod retrieval;
pub mod schema;
pub mod utils;

pub use aggregation::{aggregate_by_stage_year, aggregate_by_year, stage_labels, StageYearRow, YearRow};
pub use bucketing::{bucket_records, elapsed_year, DisbursementRecord, MISSING_ELAPSED_YEAR};
pub use error::{DisbursementError, Result};
pub use export::{to_csv_bytes, to_json, Tabular};
pub use ingestion::*;
pub use join::{JoinEngine, JoinOutcome, JoinedRecord, Selection};
pub use normalizer::{normalize_tables, Disbursement, NormalizedTables, Operation, Project};
pub use pivot::{build_pivot_pair, Measure, PivotMatrix, PivotRow, TOTAL_COLUMN};
pub use retrieval::single_flight;
#[cfg(feature = "remote")]
pub use retrieval::SheetSource;
pub use schema::*;
pub use utils::{parse_amount, parse_date_dayfirst};

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything one pipeline run produces for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Retained disbursements, one per row, with `elapsed_year >= 0`.
    pub records: Vec<DisbursementRecord>,
    /// Disbursements whose reference matched no operation.
    pub orphaned_disbursements: usize,
    pub stage_years: Vec<StageYearRow>,
    pub yearly: Vec<YearRow>,
    pub amount_pivot: PivotMatrix,
    pub percentage_pivot: PivotMatrix,
}

impl PipelineOutput {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct DisbursementPipeline {
    config: PipelineConfig,
    year_length: YearLength,
}

impl DisbursementPipeline {
    /// Validates the configuration up front; a bad value fails here, before any work.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let year_length = config.validate()?;
        Ok(Self {
            config,
            year_length,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Filtered, enriched record set: normalize, select operations, join, bucket.
    pub fn records(&self, tables: &RawTables) -> (Vec<DisbursementRecord>, usize) {
        let normalized = normalize_tables(tables, self.config.reference_key);

        let selection = Selection::from_config(&self.config);
        let operations = selection.filter_operations(&normalized.operations);

        let outcome = JoinEngine::from_config(&self.config).join(
            &normalized.disbursements,
            &operations,
            &normalized.projects,
        );
        let selected = selection.apply(outcome.records);

        let records = bucket_records(&selected, self.year_length);
        (records, outcome.orphaned_disbursements)
    }

    pub fn run(&self, tables: &RawTables) -> PipelineOutput {
        info!(
            "Processing {} disbursements against {} operations and {} projects",
            tables.disbursements.len(),
            tables.operations.len(),
            tables.projects.len()
        );
        debug!(
            "Reference key {}, join mode {:?}, {}-day years, {} countries and {} stages selected",
            self.config.reference_key,
            self.config.join_mode,
            self.year_length.days(),
            self.config.selected_countries.len(),
            self.config.selected_stages.len()
        );

        let (records, orphaned_disbursements) = self.records(tables);

        let stage_years = aggregate_by_stage_year(&records);
        let yearly = aggregate_by_year(&records);
        let (amount_pivot, percentage_pivot) = build_pivot_pair(&records);

        info!(
            "Retained {} records across {} stages and {} elapsed years",
            records.len(),
            amount_pivot.rows.len(),
            amount_pivot.years.len()
        );

        PipelineOutput {
            records,
            orphaned_disbursements,
            stage_years,
            yearly,
            amount_pivot,
            percentage_pivot,
        }
    }
}

pub fn process_disbursements(tables: &RawTables, config: &PipelineConfig) -> Result<PipelineOutput> {
    let pipeline = DisbursementPipeline::new(config.clone())?;
    Ok(pipeline.run(tables))
}
