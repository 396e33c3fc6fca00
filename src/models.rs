use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ApplicationRecord {
    pub institution: String,
    pub sponsor: String,
    pub programme: String,
    pub programme_type: String,
    pub application_stage: String,
    pub grade: String,
    pub application_date: NaiveDate,
    pub student_id: Option<String>,
    pub placement_cycle: Option<String>,
    /// Derived from `programme` when the file is loaded.
    pub department: String,
}

impl ApplicationRecord {
    /// Value of a dimension as text, the form filters compare against.
    pub fn value(&self, dimension: Dimension) -> Option<Cow<'_, str>> {
        match dimension {
            Dimension::Institution => Some(Cow::Borrowed(&self.institution)),
            Dimension::Sponsor => Some(Cow::Borrowed(&self.sponsor)),
            Dimension::Programme => Some(Cow::Borrowed(&self.programme)),
            Dimension::ProgrammeType => Some(Cow::Borrowed(&self.programme_type)),
            Dimension::ApplicationStage => Some(Cow::Borrowed(&self.application_stage)),
            Dimension::Grade => Some(Cow::Borrowed(&self.grade)),
            Dimension::ApplicationDate => Some(Cow::Owned(self.application_date.to_string())),
            Dimension::PlacementCycle => self.placement_cycle.as_deref().map(Cow::Borrowed),
            Dimension::Department => Some(Cow::Borrowed(&self.department)),
        }
    }

    pub fn group_key(&self, dimension: Dimension) -> Option<GroupKey> {
        match dimension {
            Dimension::ApplicationDate => Some(GroupKey::Date(self.application_date)),
            other => self
                .value(other)
                .map(|value| GroupKey::Text(value.into_owned())),
        }
    }
}

/// A field records can be filtered or grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Institution,
    Sponsor,
    Programme,
    ProgrammeType,
    ApplicationStage,
    Grade,
    ApplicationDate,
    PlacementCycle,
    Department,
}

impl Dimension {
    pub const ALL: [Dimension; 9] = [
        Dimension::Institution,
        Dimension::Sponsor,
        Dimension::Programme,
        Dimension::ProgrammeType,
        Dimension::ApplicationStage,
        Dimension::Grade,
        Dimension::ApplicationDate,
        Dimension::PlacementCycle,
        Dimension::Department,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Institution => "institution",
            Dimension::Sponsor => "sponsor",
            Dimension::Programme => "programme",
            Dimension::ProgrammeType => "programme_type",
            Dimension::ApplicationStage => "application_stage",
            Dimension::Grade => "grade",
            Dimension::ApplicationDate => "application_date",
            Dimension::PlacementCycle => "placement_cycle",
            Dimension::Department => "department",
        }
    }

    /// Human-readable heading used in text output and reports.
    pub fn label(self) -> &'static str {
        match self {
            Dimension::Institution => "Institution",
            Dimension::Sponsor => "Institution Sponsor",
            Dimension::Programme => "Programme",
            Dimension::ProgrammeType => "Programme Type",
            Dimension::ApplicationStage => "Application Stage",
            Dimension::Grade => "Mean Grade",
            Dimension::ApplicationDate => "Application Date",
            Dimension::PlacementCycle => "Placement Cycle",
            Dimension::Department => "Department",
        }
    }

    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|dimension| dimension.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        // Source column names are accepted alongside the short names.
        let dimension = match normalized.as_str() {
            "institution" | "institution_name" => Dimension::Institution,
            "sponsor" | "institution_sponsor" | "institution_sponsor_id" => Dimension::Sponsor,
            "programme" | "programme_name" => Dimension::Programme,
            "programme_type" | "programme_type_id" => Dimension::ProgrammeType,
            "application_stage" | "stage" | "application_stage_id" => {
                Dimension::ApplicationStage
            }
            "grade" | "mean_grade" | "mean_grade_id" => Dimension::Grade,
            "application_date" | "date" | "day" => Dimension::ApplicationDate,
            "placement_cycle" | "cycle" | "placement_cycle_id" => Dimension::PlacementCycle,
            "department" => Dimension::Department,
            _ => return Err(PipelineError::UnknownDimension(s.trim().to_string())),
        };
        Ok(dimension)
    }
}

/// Group value; dates keep their own variant so they sort chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum GroupKey {
    Date(NaiveDate),
    Text(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Date(date) => write!(f, "{date}"),
            GroupKey::Text(text) => f.write_str(text),
        }
    }
}

/// Records loaded from one source file, plus the dimensions the file carried.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<ApplicationRecord>,
    schema: BTreeSet<Dimension>,
}

impl Dataset {
    pub fn new(records: Vec<ApplicationRecord>, schema: BTreeSet<Dimension>) -> Self {
        Self { records, schema }
    }

    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn schema(&self) -> &BTreeSet<Dimension> {
        &self.schema
    }

    pub fn check_dimension(&self, dimension: Dimension) -> Result<(), PipelineError> {
        if self.schema.contains(&dimension) {
            Ok(())
        } else {
            Err(PipelineError::MissingDimension(dimension))
        }
    }

    /// Sorted distinct values of a dimension across the whole dataset.
    pub fn distinct_values(&self, dimension: Dimension) -> Vec<GroupKey> {
        let values: BTreeSet<GroupKey> = self
            .records
            .iter()
            .filter_map(|record| record.group_key(dimension))
            .collect();
        values.into_iter().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryKpis {
    pub total_count: usize,
    pub distinct_institutions: usize,
    pub distinct_programmes: usize,
    pub top_day: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Every record counts once.
    Records,
    /// Distinct student ids per group.
    Students,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateView {
    pub dimension: Dimension,
    pub measure: Measure,
    pub rows: Vec<AggregateRow>,
}

impl AggregateView {
    pub fn total(&self) -> usize {
        self.rows.iter().map(|row| row.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTop {
    pub group: GroupKey,
    pub entries: Vec<AggregateRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedValue {
    pub value: GroupKey,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Insights {
    pub distinct_students: usize,
    pub top_days: Vec<RankedValue>,
    pub top_departments: Vec<RankedValue>,
    pub top_programmes: Vec<RankedValue>,
    pub top_institutions: Vec<RankedValue>,
    pub mean_students_per_programme: f64,
    pub application_period: Option<DateSpan>,
}
