use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use crate::models::{
    AggregateRow, AggregateView, ApplicationRecord, Dimension, GroupKey, GroupTop, Measure,
    TrendPoint,
};

/// Records per group, largest first; ties ordered by key.
pub fn compute_aggregate(subset: &[&ApplicationRecord], dimension: Dimension) -> AggregateView {
    count_by(subset, dimension, Measure::Records)
}

/// Distinct student ids per group. Records without an id are not counted.
pub fn compute_unique_aggregate(
    subset: &[&ApplicationRecord],
    dimension: Dimension,
) -> AggregateView {
    count_by(subset, dimension, Measure::Students)
}

/// Student counts when the data carries student ids, record counts otherwise.
pub fn students_or_records(subset: &[&ApplicationRecord], dimension: Dimension) -> AggregateView {
    count_by(subset, dimension, measure_for(subset))
}

fn measure_for(subset: &[&ApplicationRecord]) -> Measure {
    if subset.iter().any(|r| r.student_id.is_some()) {
        Measure::Students
    } else {
        Measure::Records
    }
}

fn count_by(subset: &[&ApplicationRecord], dimension: Dimension, measure: Measure) -> AggregateView {
    let counts: HashMap<GroupKey, usize> = match measure {
        Measure::Records => {
            let mut counts = HashMap::new();
            for key in subset.iter().filter_map(|r| r.group_key(dimension)) {
                *counts.entry(key).or_insert(0) += 1;
            }
            counts
        }
        Measure::Students => {
            let mut students: HashMap<GroupKey, HashSet<&str>> = HashMap::new();
            for record in subset {
                if let (Some(key), Some(id)) =
                    (record.group_key(dimension), record.student_id.as_deref())
                {
                    students.entry(key).or_default().insert(id);
                }
            }
            students
                .into_iter()
                .map(|(key, ids)| (key, ids.len()))
                .collect()
        }
    };

    let mut rows: Vec<AggregateRow> = counts
        .into_iter()
        .map(|(key, count)| AggregateRow {
            key,
            count,
            share: None,
        })
        .collect();
    sort_rows(&mut rows);

    AggregateView {
        dimension,
        measure,
        rows,
    }
}

fn sort_rows(rows: &mut [AggregateRow]) {
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
}

/// Fills in each row's percentage of the view total, to two decimals.
pub fn with_shares(mut view: AggregateView) -> AggregateView {
    let total = view.total();
    for row in &mut view.rows {
        let share = if total == 0 {
            0.0
        } else {
            row.count as f64 * 100.0 / total as f64
        };
        row.share = Some((share * 100.0).round() / 100.0);
    }
    view
}

/// Top `limit` values of `inner` within each value of `outer`.
///
/// Outer groups come in key order, or, with `outer_limit`, only the largest
/// `outer_limit` groups ranked by their own totals.
pub fn top_per_group(
    subset: &[&ApplicationRecord],
    outer: Dimension,
    inner: Dimension,
    limit: usize,
    outer_limit: Option<usize>,
) -> Vec<GroupTop> {
    let measure = measure_for(subset);
    let mut groups: HashMap<GroupKey, Vec<&ApplicationRecord>> = HashMap::new();
    for &record in subset {
        if let Some(key) = record.group_key(outer) {
            groups.entry(key).or_default().push(record);
        }
    }

    let order: Vec<GroupKey> = match outer_limit {
        Some(n) => count_by(subset, outer, measure)
            .rows
            .into_iter()
            .take(n)
            .map(|row| row.key)
            .collect(),
        None => {
            let mut keys: Vec<GroupKey> = groups.keys().cloned().collect();
            keys.sort();
            keys
        }
    };

    order
        .into_iter()
        .filter_map(|group| {
            let members = groups.remove(&group)?;
            let mut entries = count_by(&members, inner, measure).rows;
            entries.truncate(limit);
            Some(GroupTop { group, entries })
        })
        .filter(|top| !top.entries.is_empty())
        .collect()
}

/// Applications per day, optionally split into one series per value of
/// `split_by`. Ordered by date, then series.
pub fn daily_trend(subset: &[&ApplicationRecord], split_by: Option<Dimension>) -> Vec<TrendPoint> {
    let mut counts: BTreeMap<(NaiveDate, Option<String>), usize> = BTreeMap::new();
    for record in subset {
        let series = match split_by {
            Some(dimension) => match record.value(dimension) {
                Some(value) => Some(value.into_owned()),
                None => continue,
            },
            None => None,
        };
        *counts.entry((record.application_date, series)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((date, series), count)| TrendPoint {
            date,
            series,
            count,
        })
        .collect()
}
