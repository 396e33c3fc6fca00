use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod config;
mod department;
mod error;
mod filter;
mod kpi;
mod loader;
mod models;
mod pipeline;
mod records;
mod report;
#[cfg(test)]
mod test_support;

use config::Config;
use filter::FilterCriteria;
use models::{Dataset, Dimension, GroupKey};
use pipeline::ViewRequest;

#[derive(Parser)]
#[command(name = "placement-insights")]
#[command(about = "Filter and summarise placement application records", long_about = None)]
struct Cli {
    /// CSV export of application records
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Restrict a dimension, e.g. `sponsor=Public,Private`; repeatable
    #[arg(long = "filter", global = true, value_name = "DIMENSION=VALUES")]
    filters: Vec<String>,

    /// First application date to include
    #[arg(long, global = true)]
    from: Option<NaiveDate>,

    /// Last application date to include
    #[arg(long, global = true)]
    to: Option<NaiveDate>,

    /// Config file (defaults to .placement-insights.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline KPIs and highlights for the selection
    Summary {
        #[arg(long)]
        top: Option<usize>,
    },
    /// Counts per value of one dimension
    Aggregate {
        #[arg(long)]
        by: Dimension,
        /// Count distinct students instead of applications
        #[arg(long)]
        unique: bool,
        /// Add each group's percentage of the total
        #[arg(long)]
        shares: bool,
    },
    /// Applications per day
    Trend {
        #[arg(long)]
        split_by: Option<Dimension>,
    },
    /// Top values of one dimension within each value of another
    Top {
        #[arg(long, default_value = "department")]
        outer: Dimension,
        #[arg(long, default_value = "programme")]
        inner: Dimension,
        #[arg(long)]
        limit: Option<usize>,
        /// Only the largest N outer groups, ranked by their own totals
        #[arg(long)]
        groups: Option<usize>,
    },
    /// List the matching records
    Records {
        /// Columns for text output, e.g. `student_id,institution,grade`
        #[arg(long, value_delimiter = ',')]
        columns: Vec<records::Column>,
        /// Rows to show (default 50)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Distinct values available for each filter
    Options,
    /// Write a markdown report of the filtered view
    Report {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a default config file to the working directory
    InitConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::InitConfig => init_config(),
        _ => run(&cli),
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let criteria = build_criteria(cli, &config)?;
    let data_path = cli
        .data
        .clone()
        .or_else(|| config.data.path.clone())
        .context("no data file given; pass --data or set data.path in the config")?;

    let dataset = loader::load_csv(&data_path, &config.load_options())?;
    criteria.validate(&dataset)?;
    let subset = filter::apply_filters(&dataset, &criteria);
    info!(
        matched = subset.len(),
        total = dataset.len(),
        "applied filters"
    );

    match &cli.command {
        Commands::Summary { top } => {
            let kpis = kpi::compute_kpis(&subset);
            let insights = kpi::compute_insights(&subset, top.unwrap_or(config.report.top));
            match cli.format {
                OutputFormat::Json => {
                    #[derive(Serialize)]
                    struct Summary<'a> {
                        kpis: &'a models::SummaryKpis,
                        insights: &'a models::Insights,
                    }
                    print_json(&Summary {
                        kpis: &kpis,
                        insights: &insights,
                    })?;
                }
                OutputFormat::Text => {
                    println!("Applications: {}", kpis.total_count);
                    println!("Institutions: {}", kpis.distinct_institutions);
                    println!("Programmes: {}", kpis.distinct_programmes);
                    println!(
                        "Top application day: {}",
                        kpis.top_day
                            .map(|day| day.to_string())
                            .unwrap_or_else(|| report::NOT_AVAILABLE.to_string())
                    );
                    println!("Distinct students: {}", insights.distinct_students);
                    println!("Busiest days: {}", report::format_ranked(&insights.top_days));
                    println!(
                        "Top departments: {}",
                        report::format_ranked(&insights.top_departments)
                    );
                    println!(
                        "Top programmes: {}",
                        report::format_ranked(&insights.top_programmes)
                    );
                    println!(
                        "Top institutions: {}",
                        report::format_ranked(&insights.top_institutions)
                    );
                }
            }
        }
        Commands::Aggregate { by, unique, shares } => {
            let by = *by;
            dataset.check_dimension(by)?;
            let mut view = if *unique {
                aggregate::compute_unique_aggregate(&subset, by)
            } else {
                aggregate::compute_aggregate(&subset, by)
            };
            if *shares {
                view = aggregate::with_shares(view);
            }

            match cli.format {
                OutputFormat::Json => print_json(&view)?,
                OutputFormat::Text if view.is_empty() => {
                    println!("No applications match the current filters.");
                }
                OutputFormat::Text => {
                    println!("{}:", by.label());
                    for row in &view.rows {
                        match row.share {
                            Some(share) => println!("- {}: {} ({:.2}%)", row.key, row.count, share),
                            None => println!("- {}: {}", row.key, row.count),
                        }
                    }
                }
            }
        }
        Commands::Trend { split_by } => {
            let split_by = *split_by;
            if let Some(dimension) = split_by {
                dataset.check_dimension(dimension)?;
            }
            let trend = aggregate::daily_trend(&subset, split_by);

            match cli.format {
                OutputFormat::Json => print_json(&trend)?,
                OutputFormat::Text if trend.is_empty() => {
                    println!("No applications match the current filters.");
                }
                OutputFormat::Text => {
                    for point in &trend {
                        match &point.series {
                            Some(series) => println!("{} {}: {}", point.date, series, point.count),
                            None => println!("{}: {}", point.date, point.count),
                        }
                    }
                }
            }
        }
        Commands::Top {
            outer,
            inner,
            limit,
            groups,
        } => {
            dataset.check_dimension(*outer)?;
            dataset.check_dimension(*inner)?;
            let tops = aggregate::top_per_group(
                &subset,
                *outer,
                *inner,
                limit.unwrap_or(config.report.top),
                *groups,
            );

            match cli.format {
                OutputFormat::Json => print_json(&tops)?,
                OutputFormat::Text if tops.is_empty() => {
                    println!("No applications match the current filters.");
                }
                OutputFormat::Text => {
                    for top in &tops {
                        println!("{}:", top.group);
                        for entry in &top.entries {
                            println!("  - {}: {}", entry.key, entry.count);
                        }
                    }
                }
            }
        }
        Commands::Records { columns, limit } => {
            for dimension in columns.iter().filter_map(|column| column.dimension()) {
                dataset.check_dimension(dimension)?;
            }
            let limit = limit.unwrap_or(records::DEFAULT_LIMIT);

            match cli.format {
                OutputFormat::Json => print_json(&records::page(&subset, limit))?,
                OutputFormat::Text if subset.is_empty() => {
                    println!("No applications match the current filters.");
                }
                OutputFormat::Text => {
                    let table = records::select_rows(&subset, columns, limit);
                    println!("{}", records::render_table(&table));
                }
            }
        }
        Commands::Options => {
            let options = filter_options(&dataset);
            match cli.format {
                OutputFormat::Json => print_json(&options)?,
                OutputFormat::Text => {
                    for (dimension, values) in &options {
                        let values: Vec<String> = values.iter().map(GroupKey::to_string).collect();
                        println!("{} ({}): {}", dimension.label(), dimension, values.join(", "));
                    }
                }
            }
        }
        Commands::Report { out } => {
            let request = ViewRequest {
                group_by: config.group_by()?,
                top: config.report.top,
                trend_split: None,
            };
            let view = pipeline::build_view(&dataset, &criteria, &request)?;
            let out = out.clone().unwrap_or_else(|| config.report.out.clone());
            let source = data_path.display().to_string();
            let report = report::build_report(&source, &criteria, &view);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        // Needs no data; handled in main.
        Commands::InitConfig => {}
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn init_config() -> anyhow::Result<()> {
    let path = Path::new(config::DEFAULT_CONFIG_FILE);
    if path.exists() {
        anyhow::bail!(
            "{} already exists; remove it first or edit it in place",
            path.display()
        );
    }

    let content = Config::default_toml()?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Created {} with default settings.", path.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?.unwrap_or_default(),
    };
    debug!(?config, "resolved configuration");
    Ok(config)
}

/// Config filters first, then `--filter` flags replace them per dimension.
fn build_criteria(cli: &Cli, config: &Config) -> anyhow::Result<FilterCriteria> {
    let mut criteria = config.criteria()?;

    let mut flags = FilterCriteria::new();
    for assignment in &cli.filters {
        let (dimension, values) = FilterCriteria::parse_assignment(assignment)?;
        flags.accept(dimension, values);
    }
    criteria.overlay(flags);

    if cli.from.is_some() || cli.to.is_some() {
        criteria.set_date_range(cli.from, cli.to)?;
    }
    Ok(criteria)
}

fn filter_options(dataset: &Dataset) -> BTreeMap<Dimension, Vec<GroupKey>> {
    dataset
        .schema()
        .iter()
        .filter(|dimension| **dimension != Dimension::ApplicationDate)
        .map(|dimension| (*dimension, dataset.distinct_values(*dimension)))
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
