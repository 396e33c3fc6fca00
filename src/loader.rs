use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{NaiveDate, TimeDelta};
use csv::StringRecord;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::department::categorize_programme;
use crate::models::{ApplicationRecord, Dataset, Dimension};

/// Stand-in for blank categorical cells so they still group and filter.
pub const MISSING_VALUE: &str = "Unknown";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Date of "Day 1" when the file numbers application days instead of
    /// carrying dates.
    pub cycle_start: Option<NaiveDate>,
    pub dedupe: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cycle_start: None,
            dedupe: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "institution")]
    institution_name: Option<String>,
    #[serde(alias = "sponsor", alias = "institution_sponsor")]
    institution_sponsor_id: Option<String>,
    #[serde(alias = "programme")]
    programme_name: Option<String>,
    #[serde(alias = "programme_type")]
    programme_type_id: Option<String>,
    #[serde(alias = "application_stage")]
    application_stage_id: Option<String>,
    #[serde(alias = "mean_grade", alias = "grade")]
    mean_grade_id: Option<String>,
    application_date: Option<String>,
    application_day: Option<String>,
    #[serde(alias = "student_id")]
    number_student_id: Option<String>,
    #[serde(alias = "placement_cycle")]
    placement_cycle_id: Option<String>,
}

pub fn load_csv(path: &Path, options: &LoadOptions) -> anyhow::Result<Dataset> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let text = decode_text(bytes);
    let dataset = load_from_reader(text.as_bytes(), options)
        .with_context(|| format!("failed to load applications from {}", path.display()))?;
    if dataset.is_empty() {
        warn!(path = %path.display(), "file contains no application records");
    } else {
        info!(
            path = %path.display(),
            records = dataset.len(),
            "loaded application records"
        );
    }
    Ok(dataset)
}

pub fn load_from_reader<R: Read>(reader: R, options: &LoadOptions) -> anyhow::Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers: StringRecord = reader
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(normalize_header)
        .collect();
    debug!(?headers, "normalised CSV header");

    let mut schema: BTreeSet<Dimension> = headers.iter().filter_map(column_dimension).collect();
    let dated = headers.iter().any(|h| h == "application_date");
    let numbered_days = headers.iter().any(|h| h == "application_day");
    if dated || numbered_days {
        schema.insert(Dimension::ApplicationDate);
    }
    for (dimension, column) in [
        (Dimension::Institution, "institution_name"),
        (Dimension::Programme, "programme_name"),
        (Dimension::ApplicationDate, "application_date or application_day"),
    ] {
        if !schema.contains(&dimension) {
            bail!("missing required column `{column}`");
        }
    }
    if !dated && options.cycle_start.is_none() {
        bail!("file numbers application days; set `data.cycle_start` to map Day 1 to a date");
    }
    schema.insert(Dimension::Department);
    let has_student_ids = headers
        .iter()
        .any(|h| h == "number_student_id" || h == "student_id");
    let has_cycles = schema.contains(&Dimension::PlacementCycle);

    let mut records = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut missing: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut duplicates = 0usize;
    let mut undated = 0usize;

    for (index, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let raw = result.with_context(|| format!("malformed row on line {line}"))?;

        // Duplicates are judged on the cells as written, before any cleaning.
        if options.dedupe && !seen.insert(raw.iter().map(str::to_string).collect()) {
            duplicates += 1;
            continue;
        }

        let row: CsvRow = raw
            .deserialize(Some(&headers))
            .with_context(|| format!("malformed row on line {line}"))?;

        let application_date = match resolve_date(&row, options)
            .with_context(|| format!("invalid application date on line {line}"))?
        {
            Some(date) => date,
            None => {
                undated += 1;
                continue;
            }
        };

        let mut field = |column: &'static str, value: Option<String>| -> String {
            value.unwrap_or_else(|| {
                *missing.entry(column).or_insert(0) += 1;
                MISSING_VALUE.to_string()
            })
        };

        let institution = field("institution_name", row.institution_name);
        let programme = field("programme_name", row.programme_name);
        let sponsor = field("institution_sponsor_id", row.institution_sponsor_id);
        let programme_type = field("programme_type_id", row.programme_type_id);
        let application_stage = field("application_stage_id", row.application_stage_id);
        let grade = field("mean_grade_id", row.mean_grade_id);
        let placement_cycle =
            has_cycles.then(|| field("placement_cycle_id", row.placement_cycle_id));

        if has_student_ids && row.number_student_id.is_none() {
            *missing.entry("number_student_id").or_insert(0) += 1;
        }

        let department = if programme == MISSING_VALUE {
            categorize_programme("")
        } else {
            categorize_programme(&programme)
        };

        records.push(ApplicationRecord {
            institution,
            sponsor,
            programme,
            programme_type,
            application_stage,
            grade,
            application_date,
            student_id: row.number_student_id,
            placement_cycle,
            department: department.to_string(),
        });
    }

    // Absent optional columns are not "missing values".
    missing.retain(|column, _| match column_dimension(column) {
        Some(dimension) => schema.contains(&dimension),
        None => *column == "number_student_id" && has_student_ids,
    });
    if !missing.is_empty() {
        let columns: Vec<&str> = missing.keys().copied().collect();
        warn!(
            columns = %columns.join(", "),
            "columns with missing values were filled with `{MISSING_VALUE}`"
        );
    }
    if duplicates > 0 {
        info!(duplicates, "dropped duplicate rows");
    }
    if undated > 0 {
        warn!(rows = undated, "skipped rows without an application date");
    }

    Ok(Dataset::new(records, schema))
}

/// Trims, lowercases, turns spaces into `_` and `#` into `number`, and drops
/// anything else that is not a word character.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace('#', "number")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

fn column_dimension(header: &str) -> Option<Dimension> {
    match header {
        "institution_name" | "institution" => Some(Dimension::Institution),
        "institution_sponsor_id" | "institution_sponsor" | "sponsor" => Some(Dimension::Sponsor),
        "programme_name" | "programme" => Some(Dimension::Programme),
        "programme_type_id" | "programme_type" => Some(Dimension::ProgrammeType),
        "application_stage_id" | "application_stage" => Some(Dimension::ApplicationStage),
        "mean_grade_id" | "mean_grade" | "grade" => Some(Dimension::Grade),
        "placement_cycle_id" | "placement_cycle" => Some(Dimension::PlacementCycle),
        _ => None,
    }
}

fn resolve_date(row: &CsvRow, options: &LoadOptions) -> anyhow::Result<Option<NaiveDate>> {
    if let Some(raw) = row.application_date.as_deref() {
        return parse_date(raw).map(Some);
    }
    match (row.application_day.as_deref(), options.cycle_start) {
        (Some(raw), Some(start)) => {
            let day = parse_day_number(raw)?;
            let date = day
                .checked_sub(1)
                .and_then(TimeDelta::try_days)
                .and_then(|offset| start.checked_add_signed(offset))
                .with_context(|| format!("application day `{raw}` is out of range"))?;
            Ok(Some(date))
        }
        _ => Ok(None),
    }
}

pub fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .with_context(|| format!("unrecognised date `{raw}`"))
}

/// "Day 3" -> 3.
pub fn parse_day_number(raw: &str) -> anyhow::Result<i64> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let day: i64 = digits
        .parse()
        .with_context(|| format!("no day number in `{raw}`"))?;
    if day < 1 {
        bail!("application day must start at 1, got `{raw}`");
    }
    Ok(day)
}

/// UTF-8 when valid, otherwise ISO-8859-1.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!("input is not UTF-8, decoding as ISO-8859-1");
            err.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::date;
    use std::io::Write;

    const DATED: &str = "\
Institution Name,Institution Sponsor ID,Programme Name,Programme Type ID,Application Stage ID,Mean Grade ID,Application Date,# Student ID
Moi University,Public,BSc Civil Engineering,Degree,First Revision,B+,2024-08-01,S-1
Strathmore,Private,Bachelor of Commerce,Degree,First Revision,A-,02/08/2024,S-2
Moi University,Public,BSc Civil Engineering,Degree,First Revision,B+,2024-08-01,S-1
";

    #[test]
    fn normalizes_headers() {
        assert_eq!(normalize_header(" Institution Name "), "institution_name");
        assert_eq!(normalize_header("# Student ID"), "number_student_id");
        assert_eq!(normalize_header("Mean-Grade (ID)"), "meangrade_id");
    }

    #[test]
    fn loads_dated_rows_and_drops_duplicates() {
        let dataset = load_from_reader(DATED.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.len(), 2);

        let first = &dataset.records()[0];
        assert_eq!(first.institution, "Moi University");
        assert_eq!(first.grade, "B+");
        assert_eq!(first.department, "Engineering");
        assert_eq!(first.student_id.as_deref(), Some("S-1"));
        assert_eq!(dataset.records()[1].application_date, date("2024-08-02"));

        assert!(dataset.schema().contains(&Dimension::Sponsor));
        assert!(dataset.schema().contains(&Dimension::Department));
        assert!(!dataset.schema().contains(&Dimension::PlacementCycle));
    }

    #[test]
    fn keeps_duplicates_when_dedupe_is_off() {
        let options = LoadOptions {
            dedupe: false,
            ..LoadOptions::default()
        };
        let dataset = load_from_reader(DATED.as_bytes(), &options).unwrap();
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn converts_numbered_days_from_cycle_start() {
        let data = "\
institution_name,programme_name,application_day
Moi University,Diploma in IT,Day 1
Moi University,Diploma in IT,Day 3
";
        let options = LoadOptions {
            cycle_start: Some(date("2024-08-01")),
            ..LoadOptions::default()
        };
        let dataset = load_from_reader(data.as_bytes(), &options).unwrap();
        let dates: Vec<NaiveDate> = dataset.records().iter().map(|r| r.application_date).collect();
        assert_eq!(dates, vec![date("2024-08-01"), date("2024-08-03")]);
        assert_eq!(dataset.records()[0].sponsor, MISSING_VALUE);
        assert!(!dataset.schema().contains(&Dimension::Sponsor));
    }

    #[test]
    fn numbered_days_need_a_cycle_start() {
        let data = "institution_name,programme_name,application_day\nMoi,IT,Day 1\n";
        let err = load_from_reader(data.as_bytes(), &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("cycle_start"));
    }

    #[test]
    fn rejects_files_without_required_columns() {
        let data = "programme_name,application_date\nDiploma in IT,2024-08-01\n";
        let err = load_from_reader(data.as_bytes(), &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("institution_name"));
    }

    #[test]
    fn reports_the_line_of_a_bad_date() {
        let data = "institution_name,programme_name,application_date\nMoi,IT,someday\n";
        let err = load_from_reader(data.as_bytes(), &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn blank_cycle_cells_still_group() {
        let data = "\
institution_name,programme_name,application_date,placement_cycle_id
Moi,IT,2024-08-01,2024
Moi,IT,2024-08-02,
";
        let dataset = load_from_reader(data.as_bytes(), &LoadOptions::default()).unwrap();
        let subset: Vec<&ApplicationRecord> = dataset.records().iter().collect();

        let view = crate::aggregate::compute_aggregate(&subset, Dimension::PlacementCycle);
        assert_eq!(view.total(), subset.len());
        assert_eq!(dataset.records()[1].placement_cycle.as_deref(), Some(MISSING_VALUE));

        let mut criteria = crate::filter::FilterCriteria::new();
        criteria.accept(Dimension::PlacementCycle, [MISSING_VALUE]);
        assert_eq!(crate::filter::apply_filters(&dataset, &criteria).len(), 1);
    }

    #[test]
    fn cycle_stays_empty_without_its_column() {
        let data = "institution_name,programme_name,application_date\nMoi,IT,2024-08-01\n";
        let dataset = load_from_reader(data.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.records()[0].placement_cycle, None);
    }

    #[test]
    fn out_of_range_day_is_an_error() {
        let data = "institution_name,programme_name,application_day\nMoi,IT,Day 999999999999\n";
        let options = LoadOptions {
            cycle_start: Some(date("2024-08-01")),
            ..LoadOptions::default()
        };
        let err = load_from_reader(data.as_bytes(), &options).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("line 2"));
        assert!(message.contains("out of range"));
    }

    #[test]
    fn dedupe_compares_cells_as_written() {
        let data = "\
institution_name,programme_name,application_date,mean_grade_id
Moi,IT,2024-08-01,
Moi,IT,01/08/2024,
Moi,IT,2024-08-01,Unknown
Moi,IT,2024-08-01,
";
        let dataset = load_from_reader(data.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn parses_day_numbers() {
        assert_eq!(parse_day_number("Day 12").unwrap(), 12);
        assert_eq!(parse_day_number("7").unwrap(), 7);
        assert!(parse_day_number("Day zero").is_err());
        assert!(parse_day_number("Day 0").is_err());
    }

    #[test]
    fn loads_latin1_files_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"institution_name,programme_name,application_date\n").unwrap();
        file.write_all(b"Universit\xe9 de Nairobi,Diploma in IT,2024-08-01\n").unwrap();

        let dataset = load_csv(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.records()[0].institution, "Université de Nairobi");
    }
}
