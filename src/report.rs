use std::fmt::Write;

use crate::filter::FilterCriteria;
use crate::models::{AggregateView, Dimension, RankedValue};
use crate::pipeline::DashboardView;

pub const NOT_AVAILABLE: &str = "N/A";

pub fn describe_filters(criteria: &FilterCriteria) -> Vec<String> {
    let mut lines: Vec<String> = criteria
        .active_dimensions()
        .filter_map(|dimension| {
            criteria.accepted(dimension).map(|values| {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                format!("{}: {}", dimension.label(), values.join(", "))
            })
        })
        .collect();

    match criteria.date_range() {
        (Some(from), Some(to)) => lines.push(format!("Application Date: {from} to {to}")),
        (Some(from), None) => lines.push(format!("Application Date: from {from}")),
        (None, Some(to)) => lines.push(format!("Application Date: up to {to}")),
        (None, None) => {}
    }
    lines
}

pub fn format_ranked(values: &[RankedValue]) -> String {
    if values.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    values
        .iter()
        .map(|ranked| format!("{} ({})", ranked.value, ranked.count))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_report(source: &str, criteria: &FilterCriteria, view: &DashboardView) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Placement Applications Report");
    let _ = writeln!(
        output,
        "Generated from {} ({} of {} records match)",
        source, view.kpis.total_count, view.dataset_records
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Filters");

    let filters = describe_filters(criteria);
    if filters.is_empty() {
        let _ = writeln!(output, "No filters applied.");
    } else {
        for line in filters {
            let _ = writeln!(output, "- {line}");
        }
    }

    let kpis = &view.kpis;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Applications: {}", kpis.total_count);
    let _ = writeln!(output, "- Institutions: {}", kpis.distinct_institutions);
    let _ = writeln!(output, "- Programmes: {}", kpis.distinct_programmes);
    let _ = writeln!(
        output,
        "- Top application day: {}",
        kpis.top_day
            .map(|day| day.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    );

    let insights = &view.insights;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Highlights");
    let _ = writeln!(output, "- Distinct students: {}", insights.distinct_students);
    let _ = writeln!(output, "- Busiest days: {}", format_ranked(&insights.top_days));
    let _ = writeln!(output, "- Top departments: {}", format_ranked(&insights.top_departments));
    let _ = writeln!(output, "- Top programmes: {}", format_ranked(&insights.top_programmes));
    let _ = writeln!(output, "- Top institutions: {}", format_ranked(&insights.top_institutions));
    let _ = writeln!(
        output,
        "- Mean students per programme: {:.1}",
        insights.mean_students_per_programme
    );
    let _ = writeln!(
        output,
        "- Application period: {}",
        insights
            .application_period
            .map(|span| format!("{} to {}", span.first, span.last))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    );

    for aggregate in &view.aggregates {
        let _ = writeln!(output);
        write_aggregate(&mut output, aggregate);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Programmes per {}", Dimension::Department.label());
    if view.top_programmes.is_empty() {
        let _ = writeln!(output, "No programmes in this selection.");
    } else {
        for top in &view.top_programmes {
            let _ = writeln!(output, "### {}", top.group);
            for entry in &top.entries {
                let _ = writeln!(output, "- {}: {}", entry.key, entry.count);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Applications");
    if view.trend.is_empty() {
        let _ = writeln!(output, "No applications in this selection.");
    } else {
        for point in &view.trend {
            match &point.series {
                Some(series) => {
                    let _ = writeln!(output, "- {} ({}): {}", point.date, series, point.count);
                }
                None => {
                    let _ = writeln!(output, "- {}: {}", point.date, point.count);
                }
            }
        }
    }

    output
}

fn write_aggregate(output: &mut String, aggregate: &AggregateView) {
    let _ = writeln!(output, "## By {}", aggregate.dimension.label());
    if aggregate.is_empty() {
        let _ = writeln!(output, "No applications in this selection.");
        return;
    }
    for row in &aggregate.rows {
        match row.share {
            Some(share) => {
                let _ = writeln!(output, "- {}: {} ({:.2}%)", row.key, row.count, share);
            }
            None => {
                let _ = writeln!(output, "- {}: {}", row.key, row.count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{build_view, ViewRequest};
    use crate::test_support::{dataset, date, record};

    #[test]
    fn report_lists_filters_kpis_and_groups() {
        let data = dataset(vec![
            record("Inst A", "Stage1", "2024-01-01"),
            record("Inst A", "Stage2", "2024-01-01"),
            record("Inst B", "Stage1", "2024-01-02"),
        ]);
        let mut criteria = FilterCriteria::new();
        criteria.accept(Dimension::Institution, ["Inst A"]);
        let view = build_view(&data, &criteria, &ViewRequest::default()).unwrap();

        let report = build_report("applications.csv", &criteria, &view);
        assert!(report.contains("Generated from applications.csv (2 of 3 records match)"));
        assert!(report.contains("- Institution: Inst A"));
        assert!(report.contains("- Top application day: 2024-01-01"));
        assert!(report.contains("## By Institution Sponsor"));
        assert!(report.contains("- Public: 2 (100.00%)"));
        assert!(report.contains("### Health Sciences"));
    }

    #[test]
    fn empty_selection_reports_not_available() {
        let data = dataset(vec![record("Inst A", "Stage1", "2024-01-01")]);
        let mut criteria = FilterCriteria::new();
        criteria
            .set_date_range(Some(date("2025-01-01")), None)
            .unwrap();
        let view = build_view(&data, &criteria, &ViewRequest::default()).unwrap();

        let report = build_report("applications.csv", &criteria, &view);
        assert!(report.contains("- Application Date: from 2025-01-01"));
        assert!(report.contains("- Top application day: N/A"));
        assert!(report.contains("- Application period: N/A"));
        assert!(report.contains("No programmes in this selection."));
    }
}
