use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::department::categorize_programme;
use crate::models::{ApplicationRecord, Dataset, Dimension};

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("test date")
}

pub fn record(institution: &str, stage: &str, day: &str) -> ApplicationRecord {
    let programme = "Bachelor of Science (Nursing)";
    ApplicationRecord {
        institution: institution.to_string(),
        sponsor: "Public".to_string(),
        programme: programme.to_string(),
        programme_type: "Degree".to_string(),
        application_stage: stage.to_string(),
        grade: "B".to_string(),
        application_date: date(day),
        student_id: None,
        placement_cycle: None,
        department: categorize_programme(programme).to_string(),
    }
}

pub fn enrolled(
    institution: &str,
    sponsor: &str,
    programme: &str,
    day: &str,
    student_id: &str,
) -> ApplicationRecord {
    ApplicationRecord {
        sponsor: sponsor.to_string(),
        programme: programme.to_string(),
        department: categorize_programme(programme).to_string(),
        student_id: Some(student_id.to_string()),
        ..record(institution, "Stage1", day)
    }
}

/// Every dimension except placement cycle, which most fixtures omit.
pub fn dataset(records: Vec<ApplicationRecord>) -> Dataset {
    let schema: BTreeSet<Dimension> = Dimension::ALL
        .into_iter()
        .filter(|dimension| *dimension != Dimension::PlacementCycle)
        .collect();
    Dataset::new(records, schema)
}
