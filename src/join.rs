use crate::normalizer::{Disbursement, Operation, Project};
use crate::schema::{JoinMode, PipelineConfig, ReferenceKey};
use crate::utils::normalize_key;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One disbursement with the operation and project it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub disbursement: Disbursement,
    pub operation: Option<Operation>,
    pub project: Option<Project>,
}

impl JoinedRecord {
    pub fn country(&self) -> Option<&str> {
        self.operation.as_ref().and_then(|op| op.country.as_deref())
    }

    pub fn stage_id(&self) -> Option<&str> {
        self.operation.as_ref().and_then(|op| op.stage_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub records: Vec<JoinedRecord>,
    /// Disbursements whose reference matched no operation (kept or dropped per join mode).
    pub orphaned_disbursements: usize,
    /// Operation rows ignored because an earlier row had the same join key.
    pub duplicate_operation_keys: usize,
}

pub struct JoinEngine {
    mode: JoinMode,
    reference_key: ReferenceKey,
}

impl JoinEngine {
    pub fn new(mode: JoinMode, reference_key: ReferenceKey) -> Self {
        Self {
            mode,
            reference_key,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.join_mode, config.reference_key)
    }

    /// Joins disbursements to operations (left or inner), then to projects (always left).
    ///
    /// When several rows share a key the first one in input order wins, so a disbursement
    /// never fans out into several records.
    pub fn join(
        &self,
        disbursements: &[Disbursement],
        operations: &[Operation],
        projects: &[Project],
    ) -> JoinOutcome {
        let mut duplicate_operation_keys = 0usize;
        let mut operation_index: HashMap<&str, &Operation> = HashMap::new();
        for op in operations {
            if let Some(key) = op.join_key(self.reference_key) {
                if operation_index.contains_key(key) {
                    duplicate_operation_keys += 1;
                } else {
                    operation_index.insert(key, op);
                }
            }
        }

        let mut project_index: HashMap<&str, &Project> = HashMap::new();
        for project in projects {
            project_index
                .entry(project.project_number.as_str())
                .or_insert(project);
        }

        let mut records = Vec::with_capacity(disbursements.len());
        let mut orphaned_disbursements = 0usize;

        for disbursement in disbursements {
            let operation = disbursement
                .reference
                .as_deref()
                .and_then(|key| operation_index.get(key).copied());

            if operation.is_none() {
                orphaned_disbursements += 1;
                if self.mode == JoinMode::Inner {
                    continue;
                }
            }

            let project = operation
                .and_then(|op| op.project_number.as_deref())
                .and_then(|number| project_index.get(number).copied());

            records.push(JoinedRecord {
                disbursement: disbursement.clone(),
                operation: operation.cloned(),
                project: project.cloned(),
            });
        }

        if duplicate_operation_keys > 0 {
            debug!(
                "{} operation rows share a {} key with an earlier row; first occurrence used",
                duplicate_operation_keys, self.reference_key
            );
        }
        debug!(
            "Joined {} disbursements ({} without operation, mode {:?})",
            records.len(),
            orphaned_disbursements,
            self.mode
        );

        JoinOutcome {
            records,
            orphaned_disbursements,
            duplicate_operation_keys,
        }
    }
}

/// Country and stage subset chosen by the caller. Empty sets keep everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    countries: HashSet<String>,
    stages: HashSet<String>,
}

impl Selection {
    pub fn new<C, S>(countries: C, stages: S) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            countries: countries
                .into_iter()
                .filter_map(|c| {
                    let c = c.as_ref().trim();
                    (!c.is_empty()).then(|| c.to_string())
                })
                .collect(),
            stages: stages
                .into_iter()
                .filter_map(|s| normalize_key(Some(s.as_ref())))
                .collect(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.selected_countries, &config.selected_stages)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.countries.is_empty() && self.stages.is_empty()
    }

    fn keeps(&self, country: Option<&str>, stage_id: Option<&str>) -> bool {
        let country_ok =
            self.countries.is_empty() || country.is_some_and(|c| self.countries.contains(c));
        let stage_ok = self.stages.is_empty() || stage_id.is_some_and(|s| self.stages.contains(s));
        country_ok && stage_ok
    }

    pub fn matches_operation(&self, operation: &Operation) -> bool {
        self.keeps(operation.country.as_deref(), operation.stage_id.as_deref())
    }

    pub fn matches(&self, record: &JoinedRecord) -> bool {
        self.keeps(record.country(), record.stage_id())
    }

    /// Operations inside the selection, in input order. Applied before the join, so a key
    /// shared with an unselected operation resolves to the first selected one.
    pub fn filter_operations(&self, operations: &[Operation]) -> Vec<Operation> {
        let kept: Vec<Operation> = operations
            .iter()
            .filter(|op| self.matches_operation(op))
            .cloned()
            .collect();
        if !self.is_unrestricted() {
            debug!(
                "Selection kept {} of {} operations",
                kept.len(),
                operations.len()
            );
        }
        kept
    }

    /// Drops joined records outside the selection, which after operation filtering are the
    /// left-join records without an operation. Runs before aggregation so percentage
    /// denominators only see the selected operations.
    pub fn apply(&self, records: Vec<JoinedRecord>) -> Vec<JoinedRecord> {
        if self.is_unrestricted() {
            return records;
        }

        let before = records.len();
        let kept: Vec<JoinedRecord> = records.into_iter().filter(|r| self.matches(r)).collect();
        debug!(
            "Selection kept {} of {} joined records",
            kept.len(),
            before
        );
        kept
    }
}
