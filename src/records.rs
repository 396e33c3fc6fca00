use std::str::FromStr;

use serde::Serialize;

use crate::error::PipelineError;
use crate::models::{ApplicationRecord, Dimension};
use crate::report::NOT_AVAILABLE;

pub const DEFAULT_LIMIT: usize = 50;

/// A column of the record listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    StudentId,
    Field(Dimension),
}

pub const DEFAULT_COLUMNS: [Column; 6] = [
    Column::StudentId,
    Column::Field(Dimension::Institution),
    Column::Field(Dimension::Programme),
    Column::Field(Dimension::Department),
    Column::Field(Dimension::Grade),
    Column::Field(Dimension::ApplicationDate),
];

impl Column {
    pub fn label(self) -> &'static str {
        match self {
            Column::StudentId => "Student ID",
            Column::Field(dimension) => dimension.label(),
        }
    }

    pub fn dimension(self) -> Option<Dimension> {
        match self {
            Column::StudentId => None,
            Column::Field(dimension) => Some(dimension),
        }
    }

    fn cell(self, record: &ApplicationRecord) -> String {
        let value = match self {
            Column::StudentId => record.student_id.clone(),
            Column::Field(dimension) => record.value(dimension).map(|value| value.into_owned()),
        };
        value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}

impl FromStr for Column {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "student_id" | "number_student_id" | "student" => Ok(Column::StudentId),
            _ => s.parse().map(Column::Field),
        }
    }
}

/// The first `limit` records of a selection as rows of text cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordTable {
    pub matched: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn select_rows(subset: &[&ApplicationRecord], columns: &[Column], limit: usize) -> RecordTable {
    let columns = if columns.is_empty() {
        &DEFAULT_COLUMNS[..]
    } else {
        columns
    };

    RecordTable {
        matched: subset.len(),
        columns: columns.iter().map(|column| column.label().to_string()).collect(),
        rows: subset
            .iter()
            .take(limit)
            .map(|record| columns.iter().map(|column| column.cell(record)).collect())
            .collect(),
    }
}

/// Full records for JSON output, capped at `limit`.
#[derive(Debug, Serialize)]
pub struct RecordPage<'a> {
    pub matched: usize,
    pub records: Vec<&'a ApplicationRecord>,
}

pub fn page<'a>(subset: &[&'a ApplicationRecord], limit: usize) -> RecordPage<'a> {
    RecordPage {
        matched: subset.len(),
        records: subset.iter().take(limit).copied().collect(),
    }
}

/// Left-aligned columns padded to their widest cell.
pub fn render_table(table: &RecordTable) -> String {
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &table.rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut output = vec![line(table.columns.as_slice())];
    output.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    output.extend(table.rows.iter().map(|row| line(row.as_slice())));
    output.push(format!(
        "Showing {} of {} matching records.",
        table.rows.len(),
        table.matched
    ));
    output.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{enrolled, record};

    #[test]
    fn default_columns_when_none_given() {
        let a = enrolled("Moi", "Public", "Bachelor of Commerce", "2024-01-01", "s1");
        let subset = vec![&a];

        let table = select_rows(&subset, &[], DEFAULT_LIMIT);
        assert_eq!(
            table.columns,
            [
                "Student ID",
                "Institution",
                "Programme",
                "Department",
                "Mean Grade",
                "Application Date"
            ]
        );
        assert_eq!(
            table.rows,
            vec![vec![
                "s1".to_string(),
                "Moi".to_string(),
                "Bachelor of Commerce".to_string(),
                "Business".to_string(),
                "B".to_string(),
                "2024-01-01".to_string(),
            ]]
        );
    }

    #[test]
    fn chosen_columns_and_limit_are_honoured() {
        let a = record("Inst A", "Stage1", "2024-01-01");
        let b = record("Inst B", "Stage2", "2024-01-02");
        let c = record("Inst C", "Stage1", "2024-01-03");
        let subset = vec![&a, &b, &c];
        let columns: Vec<Column> = ["institution", "stage"]
            .iter()
            .map(|name| name.parse().unwrap())
            .collect();

        let table = select_rows(&subset, &columns, 2);
        assert_eq!(table.matched, 3);
        assert_eq!(table.columns, ["Institution", "Application Stage"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Inst A".to_string(), "Stage1".to_string()],
                vec!["Inst B".to_string(), "Stage2".to_string()],
            ]
        );
    }

    #[test]
    fn absent_values_show_not_available() {
        let a = record("Inst A", "Stage1", "2024-01-01");
        let subset = vec![&a];
        let columns = [Column::StudentId, Column::Field(Dimension::PlacementCycle)];

        let table = select_rows(&subset, &columns, 10);
        assert_eq!(table.rows[0], [NOT_AVAILABLE, NOT_AVAILABLE]);
    }

    #[test]
    fn column_names_accept_source_headers() {
        assert_eq!("number_student_id".parse::<Column>().unwrap(), Column::StudentId);
        assert_eq!(
            "mean_grade_id".parse::<Column>().unwrap(),
            Column::Field(Dimension::Grade)
        );
        assert_eq!(
            "shoe_size".parse::<Column>().unwrap_err(),
            PipelineError::UnknownDimension("shoe_size".to_string())
        );
    }

    #[test]
    fn rendered_table_pads_columns_and_counts_rows() {
        let table = RecordTable {
            matched: 5,
            columns: vec!["Institution".to_string(), "Grade".to_string()],
            rows: vec![vec!["Moi".to_string(), "A".to_string()]],
        };

        let rendered = render_table(&table);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Institution  Grade");
        assert_eq!(lines[1], "-----------  -----");
        assert_eq!(lines[2], "Moi          A");
        assert_eq!(lines[3], "Showing 1 of 5 matching records.");
    }

    #[test]
    fn json_page_serializes_whole_records() {
        let a = enrolled("Moi", "Public", "Bachelor of Commerce", "2024-01-01", "s1");
        let b = record("Inst B", "Stage2", "2024-01-02");
        let subset = vec![&a, &b];

        let json = serde_json::to_value(page(&subset, 1)).unwrap();
        assert_eq!(json["matched"], 2);
        assert_eq!(json["records"].as_array().unwrap().len(), 1);
        assert_eq!(json["records"][0]["student_id"], "s1");
        assert_eq!(json["records"][0]["application_date"], "2024-01-01");
    }
}
