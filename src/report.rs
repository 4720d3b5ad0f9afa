use std::{
    ffi::OsString,
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    apis::azure::metrics::Metric,
    archive,
    config::Config,
    discovery::{self, Discovery, ListingOutcome, ListingStatus, Resource},
    source::UsageSource,
    time_window::{self, ScanType, TimeWindow},
    workbook::{self, SheetSource},
};

pub const CSV_HEADER: [&str; 5] = ["Resource Name", "Provider", "Metric", "Datetime", "Value"];

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Makes the working directory name unique per job.
    pub job_id: u64,
    pub scan_type: ScanType,
    /// Base path of the artifacts; `.zip` and `.xlsx` are appended to it.
    pub result_file: PathBuf,
    /// Where to create the working directory. Defaults to the system temp
    /// directory.
    pub work_dir: Option<PathBuf>,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub subscription: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct RunSummary {
    pub window: TimeWindow,
    pub resources: usize,
    pub rows: usize,
    pub reports: Vec<ReportFile>,
    /// Listings that used derived kinds or skipped some items.
    pub partial_listings: usize,
    /// Listings that were skipped because they could not be read.
    pub malformed_listings: Vec<ListingOutcome>,
    pub archive: PathBuf,
    /// `None` if no subscription had any resources.
    pub workbook: Option<PathBuf>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MetricRow<'a> {
    pub resource_name: &'a str,
    pub kind: &'a str,
    pub metric: &'a str,
    pub timestamp: &'a str,
    pub value: f64,
}

/// Flattens metrics into one row per data point.
pub fn metric_rows<'a>(resource: &'a Resource, metrics: &'a [Metric]) -> Vec<MetricRow<'a>> {
    let mut rows = Vec::new();
    for metric in metrics {
        for series in &metric.timeseries {
            for point in &series.data {
                rows.push(MetricRow {
                    resource_name: &resource.name,
                    kind: &resource.kind,
                    metric: &metric.name.value,
                    timestamp: &point.time_stamp,
                    value: point.value(),
                });
            }
        }
    }
    rows
}

/// `result_file` with `.{extension}` appended, keeping any extension it
/// already has.
pub fn artifact_path(result_file: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(result_file.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

pub fn run(
    source: &impl UsageSource,
    config: &Config,
    options: &RunOptions,
) -> anyhow::Result<RunSummary> {
    let RunOptions { job_id, scan_type, result_file, work_dir, now } = options;

    let window = TimeWindow::resolve(*scan_type, *now, config.january_rollover)?;
    info!("collecting {} usage for {}", scan_type, window.timespan());

    let discovery = discovery::discover(source, config)?;

    let date = time_window::date_label(*now);
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("aimetric_{}_{}_{}_", scan_type, date, job_id))
        .tempdir_in(work_dir.clone().unwrap_or_else(std::env::temp_dir))
        .context("failed to create working directory")?;
    debug!("writing reports to {}", work_dir.path().display());

    let mut reports = Vec::new();
    let mut rows = 0;
    for subscription in discovery.subscriptions_with_resources() {
        let path = work_dir.path().join(format!("{}-{}-{}.csv", subscription, scan_type, date));
        rows +=
            write_subscription_report(source, config, &discovery, subscription, &window, &path)?;
        reports.push(ReportFile { subscription: subscription.to_owned(), path });
    }

    let archive = artifact_path(result_file, "zip");
    archive::zip_dir(work_dir.path(), &archive)?;
    info!("wrote {}", archive.display());

    let workbook = if reports.is_empty() {
        warn!("no subscription has any resources; not writing a workbook");
        None
    } else {
        let path = artifact_path(result_file, "xlsx");
        let sheets: Vec<SheetSource> = reports
            .iter()
            .map(|report| SheetSource {
                sheet_name: report.subscription.clone(),
                csv_path: report.path.clone(),
            })
            .collect();
        workbook::write_workbook(&sheets, &path)?;
        info!("wrote {}", path.display());
        Some(path)
    };

    work_dir.close().context("failed to remove working directory")?;

    Ok(RunSummary {
        window,
        resources: discovery.resources.len(),
        rows,
        reports,
        partial_listings: discovery.count(ListingStatus::Partial),
        malformed_listings: discovery
            .outcomes
            .iter()
            .filter(|outcome| outcome.status == ListingStatus::Malformed)
            .cloned()
            .collect(),
        archive,
        workbook,
    })
}

/// Writes the report for one subscription to `path`, returning the number of
/// data rows written. The file is closed before this returns.
fn write_subscription_report(
    source: &impl UsageSource,
    config: &Config,
    discovery: &Discovery,
    subscription: &str,
    window: &TimeWindow,
    path: &Path,
) -> anyhow::Result<usize> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(CSV_HEADER)?;

    let mut num_rows = 0;
    for (id, resource) in discovery.resources_of(subscription) {
        let metric_names = config.metric_names_for(&resource.resource_type);
        debug!("querying {} for {}", metric_names, resource.name);
        let metrics = source
            .query_metrics(id, metric_names, window)
            .with_context(|| format!("failed to get metrics for {}", id))?;
        for row in metric_rows(resource, &metrics) {
            writer.serialize(row)?;
            num_rows += 1;
        }
    }
    writer.flush()?;
    info!("wrote {} rows for {}", num_rows, subscription);
    Ok(num_rows)
}
