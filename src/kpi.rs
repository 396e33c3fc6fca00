use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::aggregate;
use crate::models::{ApplicationRecord, DateSpan, Dimension, Insights, RankedValue, SummaryKpis};

pub fn compute_kpis(subset: &[&ApplicationRecord]) -> SummaryKpis {
    let institutions: HashSet<&str> = subset.iter().map(|r| r.institution.as_str()).collect();
    let programmes: HashSet<&str> = subset.iter().map(|r| r.programme.as_str()).collect();

    SummaryKpis {
        total_count: subset.len(),
        distinct_institutions: institutions.len(),
        distinct_programmes: programmes.len(),
        top_day: top_day(subset),
    }
}

/// Busiest application date; the earliest one wins a tie.
pub fn top_day(subset: &[&ApplicationRecord]) -> Option<NaiveDate> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for record in subset {
        *per_day.entry(record.application_date).or_insert(0) += 1;
    }

    let mut best: Option<(NaiveDate, usize)> = None;
    for (day, count) in per_day {
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((day, count)),
        }
    }
    best.map(|(day, _)| day)
}

pub fn compute_insights(subset: &[&ApplicationRecord], top: usize) -> Insights {
    let students: HashSet<&str> = subset
        .iter()
        .filter_map(|r| r.student_id.as_deref())
        .collect();

    let per_programme = aggregate::students_or_records(subset, Dimension::Programme);
    let mean_students_per_programme = if per_programme.is_empty() {
        0.0
    } else {
        per_programme.total() as f64 / per_programme.rows.len() as f64
    };

    let application_period = match (
        subset.iter().map(|r| r.application_date).min(),
        subset.iter().map(|r| r.application_date).max(),
    ) {
        (Some(first), Some(last)) => Some(DateSpan { first, last }),
        _ => None,
    };

    Insights {
        distinct_students: students.len(),
        top_days: ranked(subset, Dimension::ApplicationDate, top),
        top_departments: ranked(subset, Dimension::Department, top),
        top_programmes: ranked(subset, Dimension::Programme, top),
        top_institutions: ranked(subset, Dimension::Institution, top),
        mean_students_per_programme,
        application_period,
    }
}

fn ranked(subset: &[&ApplicationRecord], dimension: Dimension, top: usize) -> Vec<RankedValue> {
    aggregate::compute_aggregate(subset, dimension)
        .rows
        .into_iter()
        .take(top)
        .map(|row| RankedValue {
            value: row.key,
            count: row.count,
        })
        .collect()
}
