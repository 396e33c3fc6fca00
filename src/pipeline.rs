use serde::Serialize;
use tracing::debug;

use crate::aggregate;
use crate::error::PipelineError;
use crate::filter::{self, FilterCriteria};
use crate::kpi;
use crate::models::{
    AggregateView, Dataset, Dimension, GroupTop, Insights, SummaryKpis, TrendPoint,
};

/// What a dashboard refresh should compute besides the KPIs.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    pub group_by: Vec<Dimension>,
    pub top: usize,
    pub trend_split: Option<Dimension>,
}

impl Default for ViewRequest {
    fn default() -> Self {
        Self {
            group_by: vec![
                Dimension::Sponsor,
                Dimension::Department,
                Dimension::ApplicationStage,
            ],
            top: 5,
            trend_split: None,
        }
    }
}

/// Everything the presentation layer renders for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub dataset_records: usize,
    pub kpis: SummaryKpis,
    pub insights: Insights,
    pub aggregates: Vec<AggregateView>,
    pub top_programmes: Vec<GroupTop>,
    pub trend: Vec<TrendPoint>,
}

pub fn build_view(
    dataset: &Dataset,
    criteria: &FilterCriteria,
    request: &ViewRequest,
) -> Result<DashboardView, PipelineError> {
    criteria.validate(dataset)?;
    for dimension in request.group_by.iter().chain(request.trend_split.iter()) {
        dataset.check_dimension(*dimension)?;
    }

    let subset = filter::apply_filters(dataset, criteria);
    debug!(
        matched = subset.len(),
        total = dataset.len(),
        "recomputing dashboard view"
    );

    let aggregates = request
        .group_by
        .iter()
        .map(|dimension| aggregate::with_shares(aggregate::compute_aggregate(&subset, *dimension)))
        .collect();

    Ok(DashboardView {
        dataset_records: dataset.len(),
        kpis: kpi::compute_kpis(&subset),
        insights: kpi::compute_insights(&subset, request.top),
        aggregates,
        top_programmes: aggregate::top_per_group(
            &subset,
            Dimension::Department,
            Dimension::Programme,
            request.top,
            None,
        ),
        trend: aggregate::daily_trend(&subset, request.trend_split),
    })
}
