use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::error::PipelineError;
use crate::models::{ApplicationRecord, Dataset, Dimension};

/// Selected filter values per dimension, plus an optional date window.
///
/// A dimension that is absent, or present with no values, does not restrict
/// anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    accepted: BTreeMap<Dimension, BTreeSet<String>>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds accepted values to a dimension, keeping any already selected.
    pub fn accept<I, S>(&mut self, dimension: Dimension, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted
            .entry(dimension)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Replaces the selection for every dimension `other` restricts, and its
    /// date bounds when set.
    pub fn overlay(&mut self, other: FilterCriteria) {
        for (dimension, values) in other.accepted {
            if !values.is_empty() {
                self.accepted.insert(dimension, values);
            }
        }
        self.from = other.from.or(self.from);
        self.to = other.to.or(self.to);
    }

    pub fn set_date_range(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<&mut Self, PipelineError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(PipelineError::InvalidDateRange { from, to });
            }
        }
        self.from = from;
        self.to = to;
        Ok(self)
    }

    /// Builds criteria from named dimensions, e.g. a config file table.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoIterator<Item = String>,
    {
        let mut criteria = Self::new();
        for (name, values) in pairs {
            let dimension: Dimension = name.as_ref().parse()?;
            criteria.accept(dimension, values);
        }
        Ok(criteria)
    }

    /// Parses `dimension=value[,value...]`.
    pub fn parse_assignment(input: &str) -> Result<(Dimension, Vec<String>), PipelineError> {
        let (name, values) = input
            .split_once('=')
            .ok_or_else(|| PipelineError::InvalidFilter(input.to_string()))?;
        let dimension: Dimension = name.parse()?;
        let values: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            return Err(PipelineError::InvalidFilter(input.to_string()));
        }
        Ok((dimension, values))
    }

    /// Dimensions with at least one accepted value.
    pub fn active_dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.accepted
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(dimension, _)| *dimension)
    }

    pub fn accepted(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        self.accepted
            .get(&dimension)
            .filter(|values| !values.is_empty())
    }

    pub fn date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (self.from, self.to)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.active_dimensions().next().is_none() && self.from.is_none() && self.to.is_none()
    }

    /// Fails when a restricted dimension has no column in the dataset.
    pub fn validate(&self, dataset: &Dataset) -> Result<(), PipelineError> {
        for dimension in self.active_dimensions() {
            dataset.check_dimension(dimension)?;
        }
        Ok(())
    }

    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        if self.from.is_some_and(|from| record.application_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| record.application_date > to) {
            return false;
        }

        self.accepted
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .all(|(dimension, values)| match record.value(*dimension) {
                Some(value) => values.contains(&*value),
                None => false,
            })
    }
}

/// Records matching every active criterion, in dataset order.
pub fn apply_filters<'a>(
    dataset: &'a Dataset,
    criteria: &FilterCriteria,
) -> Vec<&'a ApplicationRecord> {
    if criteria.is_unrestricted() {
        return dataset.records().iter().collect();
    }

    dataset
        .records()
        .iter()
        .filter(|record| criteria.matches(record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dataset, record};

    fn three_records() -> Dataset {
        dataset(vec![
            record("Inst A", "Stage1", "2024-01-01"),
            record("Inst A", "Stage2", "2024-01-01"),
            record("Inst B", "Stage1", "2024-01-02"),
        ])
    }

    #[test]
    fn empty_criteria_keeps_everything() {
        let data = three_records();
        let subset = apply_filters(&data, &FilterCriteria::new());
        assert_eq!(subset.len(), 3);
        assert!(subset.iter().zip(data.records()).all(|(a, b)| std::ptr::eq(*a, b)));
    }

    #[test]
    fn keeps_only_accepted_values_in_order() {
        let data = three_records();
        let mut criteria = FilterCriteria::new();
        criteria.accept(Dimension::Institution, ["Inst A"]);

        let subset = apply_filters(&data, &criteria);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset[0].application_stage, "Stage1");
        assert_eq!(subset[1].application_stage, "Stage2");
    }

    #[test]
    fn dimensions_combine_with_and() {
        let data = three_records();
        let mut criteria = FilterCriteria::new();
        criteria
            .accept(Dimension::Institution, ["Inst A", "Inst B"])
            .accept(Dimension::ApplicationStage, ["Stage1"]);

        let subset = apply_filters(&data, &criteria);
        let institutions: Vec<&str> = subset.iter().map(|r| r.institution.as_str()).collect();
        assert_eq!(institutions, vec!["Inst A", "Inst B"]);
    }

    #[test]
    fn empty_value_set_imposes_no_constraint() {
        let data = three_records();
        let mut criteria = FilterCriteria::new();
        criteria.accept(Dimension::Sponsor, Vec::<String>::new());

        assert!(criteria.is_unrestricted());
        assert_eq!(apply_filters(&data, &criteria).len(), 3);
    }

    #[test]
    fn no_match_yields_empty_subset() {
        let data = three_records();
        let mut criteria = FilterCriteria::new();
        criteria.accept(Dimension::Institution, ["Inst Z"]);
        assert!(apply_filters(&data, &criteria).is_empty());
    }

    #[test]
    fn date_range_is_inclusive() {
        let data = three_records();
        let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        let mut criteria = FilterCriteria::new();
        criteria
            .set_date_range(day("2024-01-02"), day("2024-01-02"))
            .unwrap();

        let subset = apply_filters(&data, &criteria);
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].institution, "Inst B");
    }

    #[test]
    fn reversed_date_range_is_rejected() {
        let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        let err = FilterCriteria::new()
            .set_date_range(day("2024-02-01"), day("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDateRange { .. }));
    }

    #[test]
    fn filtering_twice_gives_identical_results() {
        let data = three_records();
        let mut criteria = FilterCriteria::new();
        criteria.accept(Dimension::ApplicationStage, ["Stage1"]);
        assert_eq!(apply_filters(&data, &criteria), apply_filters(&data, &criteria));
    }

    #[test]
    fn parses_assignments_and_rejects_unknown_dimensions() {
        let (dimension, values) =
            FilterCriteria::parse_assignment("institution_name=Inst A, Inst B").unwrap();
        assert_eq!(dimension, Dimension::Institution);
        assert_eq!(values, vec!["Inst A", "Inst B"]);

        let err = FilterCriteria::parse_assignment("colour=blue").unwrap_err();
        assert_eq!(err, PipelineError::UnknownDimension("colour".to_string()));

        let err = FilterCriteria::parse_assignment("sponsor").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFilter(_)));
    }

    #[test]
    fn overlay_replaces_per_dimension() {
        let mut base = FilterCriteria::from_pairs([
            ("sponsor", vec!["Public".to_string()]),
            ("grade", vec!["A".to_string()]),
        ])
        .unwrap();
        let mut cli = FilterCriteria::new();
        cli.accept(Dimension::Sponsor, ["Private"]);
        base.overlay(cli);

        let sponsors: Vec<&String> = base.accepted(Dimension::Sponsor).unwrap().iter().collect();
        assert_eq!(sponsors, vec!["Private"]);
        assert!(base.accepted(Dimension::Grade).is_some());
    }

    #[test]
    fn validate_rejects_dimensions_missing_from_dataset() {
        let data = three_records();
        let mut criteria = FilterCriteria::new();
        criteria.accept(Dimension::PlacementCycle, ["2024"]);
        assert_eq!(
            criteria.validate(&data),
            Err(PipelineError::MissingDimension(Dimension::PlacementCycle))
        );
    }
}
