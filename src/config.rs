//! Configuration file handling.
//!
//! Settings come from `.placement-insights.toml` in the working directory,
//! or from the file passed with `--config`. Command-line flags win.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::filter::FilterCriteria;
use crate::loader::LoadOptions;
use crate::models::Dimension;

pub const DEFAULT_CONFIG_FILE: &str = ".placement-insights.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    /// Default filter selection, keyed by dimension name.
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV file used when `--data` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Date of "Day 1" for files with an `application_day` column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_start: Option<NaiveDate>,

    #[serde(default = "default_true")]
    pub dedupe: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            cycle_start: None,
            dedupe: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_out")]
    pub out: PathBuf,

    /// How many entries the ranked lists keep.
    #[serde(default = "default_top")]
    pub top: usize,

    #[serde(default = "default_group_by")]
    pub group_by: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            out: default_report_out(),
            top: default_top(),
            group_by: default_group_by(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_report_out() -> PathBuf {
    PathBuf::from("placement-report.md")
}

fn default_top() -> usize {
    5
}

fn default_group_by() -> Vec<String> {
    vec![
        "sponsor".to_string(),
        "department".to_string(),
        "application_stage".to_string(),
    ]
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// `Ok(None)` when there is no config file in the working directory.
    pub fn load_default() -> anyhow::Result<Option<Self>> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    pub fn criteria(&self) -> Result<FilterCriteria, PipelineError> {
        FilterCriteria::from_pairs(
            self.filters
                .iter()
                .map(|(name, values)| (name, values.iter().cloned())),
        )
    }

    pub fn group_by(&self) -> Result<Vec<Dimension>, PipelineError> {
        self.report.group_by.iter().map(|name| name.parse()).collect()
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            cycle_start: self.data.cycle_start,
            dedupe: self.data.dedupe,
        }
    }

    pub fn default_toml() -> anyhow::Result<String> {
        toml::to_string_pretty(&Config::default()).context("failed to render default config")
    }
}
