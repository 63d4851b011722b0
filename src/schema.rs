use crate::error::{DisbursementError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Raw row of the projects sheet. Extra columns are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectRow {
    #[serde(rename = "NoProyecto")]
    pub project_number: Option<String>,
    #[serde(rename = "IDAreaPrioritaria")]
    pub priority_area_id: Option<String>,
    #[serde(rename = "IDAreaIntervencion")]
    pub intervention_area_id: Option<String>,
}

impl ProjectRow {
    pub const COLUMNS: [&'static str; 3] = ["NoProyecto", "IDAreaPrioritaria", "IDAreaIntervencion"];
}

/// Raw row of the operations sheet. One row per operation stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationRow {
    #[serde(rename = "NoProyecto")]
    pub project_number: Option<String>,
    #[serde(rename = "NoOperacion")]
    pub operation_number: Option<String>,
    #[serde(rename = "IDEtapa")]
    pub stage_id: Option<String>,
    #[serde(rename = "Alias")]
    pub alias: Option<String>,
    #[serde(rename = "Pais")]
    pub country: Option<String>,
    #[serde(rename = "FechaVigencia")]
    pub vigency_date: Option<String>,
    #[serde(rename = "Estado")]
    pub status: Option<String>,
    #[serde(rename = "AporteFONPLATAVigente")]
    pub committed_amount: Option<String>,
}

impl OperationRow {
    pub const COLUMNS: [&'static str; 8] = [
        "NoProyecto",
        "NoOperacion",
        "IDEtapa",
        "Alias",
        "Pais",
        "FechaVigencia",
        "Estado",
        "AporteFONPLATAVigente",
    ];
}

/// Raw row of the disbursements sheet.
///
/// Depending on the source, the operation reference lives in `NoOperacion` or in
/// `IDOperacion`; both are captured and [`ReferenceKey`] decides which one is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisbursementRow {
    #[serde(rename = "IDDesembolso")]
    pub disbursement_id: Option<String>,
    #[serde(rename = "NoOperacion")]
    pub operation_number: Option<String>,
    #[serde(rename = "IDOperacion")]
    pub operation_id: Option<String>,
    #[serde(rename = "Monto")]
    pub amount: Option<String>,
    #[serde(rename = "FechaEfectiva")]
    pub effective_date: Option<String>,
}

impl DisbursementRow {
    pub fn required_columns(reference_key: ReferenceKey) -> [&'static str; 4] {
        [
            "IDDesembolso",
            reference_key.column_name(),
            "Monto",
            "FechaEfectiva",
        ]
    }

    pub fn reference(&self, reference_key: ReferenceKey) -> Option<&str> {
        match reference_key {
            ReferenceKey::OperationNumber => self.operation_number.as_deref(),
            ReferenceKey::StageId => self.operation_id.as_deref(),
        }
    }
}

/// The three input tables as retrieved, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTables {
    pub projects: Vec<ProjectRow>,
    pub operations: Vec<OperationRow>,
    pub disbursements: Vec<DisbursementRow>,
}

/// Which disbursement column references an operation, and which operation column it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ReferenceKey {
    #[serde(rename = "NoOperacion")]
    #[schemars(
        description = "Disbursements carry 'NoOperacion', matched against the operation number of the operations table."
    )]
    OperationNumber,

    #[serde(rename = "IDOperacion")]
    #[schemars(
        description = "Disbursements carry 'IDOperacion', matched against the stage id ('IDEtapa') of the operations table."
    )]
    StageId,
}

impl ReferenceKey {
    pub fn column_name(self) -> &'static str {
        match self {
            Self::OperationNumber => "NoOperacion",
            Self::StageId => "IDOperacion",
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for ReferenceKey {
    type Err = DisbursementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "NoOperacion" => Ok(Self::OperationNumber),
            "IDOperacion" => Ok(Self::StageId),
            other => Err(DisbursementError::InvalidReferenceKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    #[default]
    #[schemars(
        description = "Keep disbursements without a matching operation, with empty operation fields."
    )]
    Left,

    #[schemars(description = "Drop disbursements without a matching operation.")]
    Inner,
}

impl JoinMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Inner => "inner",
        }
    }
}

impl FromStr for JoinMode {
    type Err = DisbursementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "inner" => Ok(Self::Inner),
            _ => Err(DisbursementError::InvalidJoinMode(s.to_string())),
        }
    }
}

/// Divisor turning a day gap into an elapsed year. Both conventions are in use, so the
/// choice is explicit and defaults to 365.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum YearLength {
    #[default]
    Days365,
    Days366,
}

impl YearLength {
    pub fn days(self) -> i64 {
        match self {
            Self::Days365 => 365,
            Self::Days366 => 366,
        }
    }
}

impl TryFrom<u32> for YearLength {
    type Error = DisbursementError;

    fn try_from(days: u32) -> Result<Self> {
        match days {
            365 => Ok(Self::Days365),
            366 => Ok(Self::Days366),
            other => Err(DisbursementError::InvalidYearLength(other)),
        }
    }
}

fn default_year_length_days() -> u32 {
    365
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    #[schemars(
        description = "Disbursement column that references the operations table. No default: this is a data-contract decision of the caller."
    )]
    pub reference_key: ReferenceKey,

    #[serde(default)]
    #[schemars(description = "Join semantics between disbursements and operations. Defaults to 'left'.")]
    pub join_mode: JoinMode,

    #[serde(default = "default_year_length_days")]
    #[schemars(description = "Days per elapsed year: 365 (default) or 366.")]
    pub year_length_days: u32,

    #[serde(default)]
    #[schemars(description = "Country codes ('Pais') to keep. Empty keeps every country.")]
    pub selected_countries: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Stage ids ('IDEtapa') to keep. Empty keeps every stage.")]
    pub selected_stages: Vec<String>,
}

impl PipelineConfig {
    pub fn new(reference_key: ReferenceKey) -> Self {
        Self {
            reference_key,
            join_mode: JoinMode::default(),
            year_length_days: default_year_length_days(),
            selected_countries: Vec::new(),
            selected_stages: Vec::new(),
        }
    }

    pub fn with_join_mode(mut self, join_mode: JoinMode) -> Self {
        self.join_mode = join_mode;
        self
    }

    pub fn with_year_length_days(mut self, days: u32) -> Self {
        self.year_length_days = days;
        self
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_countries = countries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_stages = stages.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<YearLength> {
        YearLength::try_from(self.year_length_days)
    }

    /// Parses a UI-supplied configuration. Unknown `reference_key` or `join_mode` values are
    /// reported as configuration errors, not as JSON errors.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(json)?;

        if let Some(fields) = value.as_object_mut() {
            if let Some(raw) = fields.get("reference_key") {
                let key: ReferenceKey = match raw {
                    Value::String(s) => s.parse()?,
                    other => return Err(DisbursementError::InvalidReferenceKey(other.to_string())),
                };
                fields.insert("reference_key".to_string(), Value::from(key.column_name()));
            }
            if let Some(raw) = fields.get("join_mode") {
                let mode: JoinMode = match raw {
                    Value::String(s) => s.parse()?,
                    other => return Err(DisbursementError::InvalidJoinMode(other.to_string())),
                };
                fields.insert("join_mode".to_string(), Value::from(mode.as_str()));
            }
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PipelineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
