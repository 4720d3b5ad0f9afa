use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::{apis::azure::resources::Listing, config::Config, source::UsageSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    /// The label of the subscription that owns the resource.
    pub subscription: String,
    pub kind: String,
    pub resource_type: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ListingStatus {
    Complete,
    Partial,
    Malformed,
}
impl From<&Listing> for ListingStatus {
    fn from(listing: &Listing) -> Self {
        match listing {
            Listing::Complete(_) => ListingStatus::Complete,
            Listing::Partial { .. } => ListingStatus::Partial,
            Listing::Malformed { .. } => ListingStatus::Malformed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingOutcome {
    pub subscription: String,
    pub resource_type: String,
    pub status: ListingStatus,
}

#[derive(Debug, Default)]
pub struct Discovery {
    /// Resource id -> resource.
    pub resources: BTreeMap<String, Resource>,
    /// One entry per listing request, in request order.
    pub outcomes: Vec<ListingOutcome>,
}

impl Discovery {
    /// Labels of the subscriptions that own at least one resource.
    pub fn subscriptions_with_resources(&self) -> BTreeSet<&str> {
        self.resources.values().map(|resource| resource.subscription.as_str()).collect()
    }

    /// Resources owned by the given subscription, with their ids.
    pub fn resources_of<'a>(
        &'a self,
        subscription: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, resource)| resource.subscription == subscription)
            .map(|(id, resource)| (id.as_str(), resource))
    }

    pub fn count(&self, status: ListingStatus) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.status == status).count()
    }
}

/// Lists every configured resource type in every configured subscription.
/// Listings that cannot be read are recorded and skipped; only failures to
/// reach the API at all are returned as errors.
pub fn discover(source: &impl UsageSource, config: &Config) -> anyhow::Result<Discovery> {
    let mut discovery = Discovery::default();

    for resource_type in &config.resource_types {
        for (label, subscription_id) in &config.subscriptions {
            debug!("listing {} in {}", resource_type, label);
            let listing = source.list_resources(subscription_id, resource_type)?;

            match &listing {
                Listing::Complete(_) => (),
                Listing::Partial { skipped, .. } => {
                    if skipped.is_empty() {
                        debug!(
                            "some {} in {} have no kind; using derived kind",
                            resource_type, label
                        );
                    }
                    for item in skipped {
                        warn!(
                            "skipping an item of {} in {}: {}. item: {}",
                            resource_type, label, item.reason, item.raw
                        );
                    }
                }
                Listing::Malformed { raw, reason } => {
                    warn!("skipping {} in {}: {}. response: {}", resource_type, label, reason, raw)
                }
            }

            for listed in listing.resources() {
                discovery.resources.insert(
                    listed.id.clone(),
                    Resource {
                        name: listed.name.clone(),
                        subscription: label.clone(),
                        kind: listed.kind.clone(),
                        resource_type: resource_type.clone(),
                    },
                );
            }
            discovery.outcomes.push(ListingOutcome {
                subscription: label.clone(),
                resource_type: resource_type.clone(),
                status: ListingStatus::from(&listing),
            });
        }
    }

    info!(
        "discovered {} resources in {} subscriptions ({} malformed listings)",
        discovery.resources.len(),
        discovery.subscriptions_with_resources().len(),
        discovery.count(ListingStatus::Malformed)
    );
    Ok(discovery)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        apis::azure::resources::{ListedResource, SkippedItem},
        config::{RESOURCE_TYPE_BOT_SERVICE, RESOURCE_TYPE_COGNITIVE_SERVICES, RESOURCE_TYPE_SEARCH},
        source::fixture::FixtureSource,
    };

    fn listed(id: &str, kind: &str) -> ListedResource {
        ListedResource {
            id: id.to_owned(),
            name: id.trim_start_matches('/').to_owned(),
            kind: kind.to_owned(),
        }
    }

    fn config() -> Config {
        Config {
            subscriptions: [("ALPHA", "sub-a"), ("BETA", "sub-b"), ("GAMMA", "sub-c")]
                .iter()
                .map(|&(label, id)| (label.to_owned(), id.to_owned()))
                .collect(),
            ..Config::default()
        }
    }

    #[test]
    fn records_resources_and_outcomes() {
        let source = FixtureSource::default()
            .with_listing(
                "sub-a",
                RESOURCE_TYPE_COGNITIVE_SERVICES,
                Listing::Complete(vec![listed("/openai", "OpenAI")]),
            )
            .with_listing(
                "sub-a",
                RESOURCE_TYPE_SEARCH,
                Listing::Partial {
                    resources: vec![listed("/search", "searchServices")],
                    skipped: vec![],
                },
            )
            .with_listing(
                "sub-b",
                RESOURCE_TYPE_BOT_SERVICE,
                Listing::Malformed { raw: "{}".to_owned(), reason: "no value".to_owned() },
            );

        let discovery = discover(&source, &config()).unwrap();

        assert_eq!(discovery.resources.len(), 2);
        assert_eq!(
            discovery.resources["/search"],
            Resource {
                name: "search".to_owned(),
                subscription: "ALPHA".to_owned(),
                kind: "searchServices".to_owned(),
                resource_type: RESOURCE_TYPE_SEARCH.to_owned(),
            }
        );
        assert_eq!(discovery.subscriptions_with_resources(), BTreeSet::from(["ALPHA"]));
        assert_eq!(discovery.outcomes.len(), 3 * 3);
        assert_eq!(discovery.count(ListingStatus::Malformed), 1);
        assert_eq!(discovery.count(ListingStatus::Partial), 1);
        assert_eq!(discovery.count(ListingStatus::Complete), 7);
        assert_eq!(discovery.resources_of("ALPHA").count(), 2);
        assert_eq!(discovery.resources_of("BETA").count(), 0);
    }

    #[test]
    fn later_listing_replaces_same_id() {
        let source = FixtureSource::default()
            .with_listing(
                "sub-a",
                RESOURCE_TYPE_COGNITIVE_SERVICES,
                Listing::Complete(vec![listed("/dup", "OpenAI")]),
            )
            .with_listing(
                "sub-b",
                RESOURCE_TYPE_COGNITIVE_SERVICES,
                Listing::Complete(vec![listed("/dup", "SpeechServices")]),
            );

        let discovery = discover(&source, &config()).unwrap();
        assert_eq!(discovery.resources.len(), 1);
        assert_eq!(discovery.resources["/dup"].subscription, "BETA");
        assert_eq!(discovery.resources["/dup"].kind, "SpeechServices");
    }

    #[test]
    fn readable_items_of_a_partly_broken_listing_are_kept() {
        let listing = Listing::from_body(
            r#"{"value": [{"id": "/good", "name": "good", "kind": "OpenAI"}, {"name": "no id"}]}"#,
            RESOURCE_TYPE_COGNITIVE_SERVICES,
        );
        assert_eq!(
            listing.skipped(),
            &[SkippedItem {
                reason: "listed item has no 'id'".to_owned(),
                raw: r#"{"name":"no id"}"#.to_owned(),
            }]
        );
        let source = FixtureSource::default().with_listing(
            "sub-c",
            RESOURCE_TYPE_COGNITIVE_SERVICES,
            listing,
        );

        let discovery = discover(&source, &config()).unwrap();
        assert_eq!(discovery.resources["/good"].subscription, "GAMMA");
        assert_eq!(discovery.resources["/good"].kind, "OpenAI");
        assert_eq!(discovery.count(ListingStatus::Partial), 1);
        assert_eq!(discovery.count(ListingStatus::Malformed), 0);
    }
}
