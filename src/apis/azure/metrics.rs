use serde::Deserialize;

use super::ArmClient;
use crate::time_window::TimeWindow;

const API_VERSION: &str = "2023-10-01";
const INTERVAL: &str = "PT1H";
const AGGREGATION: &str = "Total";

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MetricsResponse {
    pub value: Vec<Metric>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: LocalizableString,
    #[serde(default)]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LocalizableString {
    pub value: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TimeSeries {
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DataPoint {
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
    pub total: Option<f64>,
    pub average: Option<f64>,
}

impl DataPoint {
    /// The aggregated value of this point. Points without any aggregate
    /// (hours with no activity) count as zero.
    pub fn value(&self) -> f64 {
        self.total.or(self.average).unwrap_or(0.0)
    }
}

// blocking
pub fn get(
    client: &ArmClient,
    resource_id: &str,
    metric_names: &str,
    window: &TimeWindow,
) -> anyhow::Result<Vec<Metric>> {
    let timespan = window.timespan();
    let response = client.get_success(
        &format!("{}/providers/microsoft.insights/metrics", resource_id),
        &[
            ("api-version", API_VERSION),
            ("metricnames", metric_names),
            ("timespan", timespan.as_str()),
            ("interval", INTERVAL),
            ("aggregation", AGGREGATION),
        ],
    )?;
    let response: MetricsResponse = response.json()?;
    Ok(response.value)
}
