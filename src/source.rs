use crate::{
    apis::azure::{
        metrics::{self, Metric},
        resources::{self, Listing},
        ArmClient,
    },
    time_window::TimeWindow,
};

/// Where resource listings and metrics come from. Implemented by the
/// resource manager client; tests substitute fixtures.
pub trait UsageSource {
    fn list_resources(&self, subscription_id: &str, resource_type: &str)
        -> anyhow::Result<Listing>;

    fn query_metrics(
        &self,
        resource_id: &str,
        metric_names: &str,
        window: &TimeWindow,
    ) -> anyhow::Result<Vec<Metric>>;
}

impl UsageSource for ArmClient {
    fn list_resources(
        &self,
        subscription_id: &str,
        resource_type: &str,
    ) -> anyhow::Result<Listing> {
        resources::list(self, subscription_id, resource_type)
    }

    fn query_metrics(
        &self,
        resource_id: &str,
        metric_names: &str,
        window: &TimeWindow,
    ) -> anyhow::Result<Vec<Metric>> {
        metrics::get(self, resource_id, metric_names, window)
    }
}
