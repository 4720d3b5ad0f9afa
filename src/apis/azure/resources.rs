use serde_json::Value;
use tracing::trace;

use super::ArmClient;

const API_VERSION: &str = "2021-04-01";

/// A resource as returned by the resource listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedResource {
    pub id: String,
    pub name: String,
    pub kind: String,
}

/// A listed item that was left out because it could not be read as a
/// resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub reason: String,
    /// The item's JSON as received.
    pub raw: String,
}

/// The result of classifying one resource listing response.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Every item was a resource and carried its own kind.
    Complete(Vec<ListedResource>),
    /// Some items had to be skipped, or at least one resource had no kind. In
    /// the latter case every resource uses the kind derived from the resource
    /// type.
    Partial { resources: Vec<ListedResource>, skipped: Vec<SkippedItem> },
    /// The response could not be read as a resource listing.
    Malformed { raw: String, reason: String },
}

impl Listing {
    pub fn resources(&self) -> &[ListedResource] {
        match self {
            Listing::Complete(resources) | Listing::Partial { resources, .. } => resources,
            Listing::Malformed { .. } => &[],
        }
    }

    pub fn skipped(&self) -> &[SkippedItem] {
        match self {
            Listing::Partial { skipped, .. } => skipped,
            Listing::Complete(_) | Listing::Malformed { .. } => &[],
        }
    }

    pub fn from_body(body: &str, resource_type: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                return Listing::Malformed {
                    raw: body.to_owned(),
                    reason: format!("response is not JSON: {}", e),
                }
            }
        };
        let Some(items) = value.get("value").and_then(Value::as_array) else {
            return Listing::Malformed {
                raw: body.to_owned(),
                reason: "response has no 'value' array".to_owned(),
            };
        };

        let mut resources = Vec::with_capacity(items.len());
        let mut skipped = Vec::new();
        let mut missing_kind = false;
        for item in items {
            let skip = |reason: String| SkippedItem { reason, raw: item.to_string() };
            let Some(id) = item.get("id").and_then(Value::as_str) else {
                skipped.push(skip("listed item has no 'id'".to_owned()));
                continue;
            };
            let Some(name) = item.get("name").and_then(Value::as_str) else {
                skipped.push(skip(format!("resource {} has no 'name'", id)));
                continue;
            };
            let kind = item.get("kind").and_then(Value::as_str);
            missing_kind |= kind.is_none();
            resources.push(ListedResource {
                id: id.trim().to_owned(),
                name: name.to_owned(),
                kind: kind.unwrap_or_default().to_owned(),
            });
        }

        if missing_kind {
            let derived = derived_kind(resource_type);
            for resource in &mut resources {
                resource.kind = derived.to_owned();
            }
        }
        if missing_kind || !skipped.is_empty() {
            Listing::Partial { resources, skipped }
        } else {
            Listing::Complete(resources)
        }
    }
}

/// The kind used for resources that do not report one: the part of the
/// resource type after the provider namespace.
pub fn derived_kind(resource_type: &str) -> &str {
    resource_type.split_once('/').map(|(_, ty)| ty).unwrap_or(resource_type)
}

// blocking
pub fn list(
    client: &ArmClient,
    subscription_id: &str,
    resource_type: &str,
) -> anyhow::Result<Listing> {
    let filter = format!("resourceType eq '{}'", resource_type);
    let response = client.get(
        &format!("/subscriptions/{}/resources", subscription_id),
        &[("$filter", filter.as_str()), ("api-version", API_VERSION)],
    )?;
    let body = response.text()?;
    trace!("received listing: {}", body);
    Ok(Listing::from_body(&body, resource_type))
}

#[cfg(test)]
mod test {
    use super::*;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    const SEARCH: &str = "Microsoft.Search/searchServices";

    fn res(id: &str, name: &str, kind: &str) -> ListedResource {
        ListedResource { id: id.to_owned(), name: name.to_owned(), kind: kind.to_owned() }
    }

    #[test]
    fn complete_listing() {
        let body = r#"{"value": [
            {"id": "/subscriptions/s/a", "name": "a", "kind": "OpenAI"},
            {"id": "/subscriptions/s/b", "name": "b", "kind": "FormRecognizer"}
        ]}"#;
        assert_eq!(
            Listing::from_body(body, "Microsoft.CognitiveServices/accounts"),
            Listing::Complete(vec![
                res("/subscriptions/s/a", "a", "OpenAI"),
                res("/subscriptions/s/b", "b", "FormRecognizer"),
            ])
        );
    }

    #[test]
    fn missing_kind_derives_kind_for_every_item() {
        let body = r#"{"value": [
            {"id": "/subscriptions/s/a", "name": "a", "kind": "whatever"},
            {"id": " /subscriptions/s/b ", "name": "b"}
        ]}"#;
        assert_eq!(
            Listing::from_body(body, SEARCH),
            Listing::Partial {
                resources: vec![
                    res("/subscriptions/s/a", "a", "searchServices"),
                    res("/subscriptions/s/b", "b", "searchServices"),
                ],
                skipped: vec![],
            }
        );
    }

    #[test]
    fn unreadable_items_are_skipped_and_the_rest_kept() {
        let body = concat!(
            r#"{"value":[{"id":"/s/good","name":"good","kind":"OpenAI"},"#,
            r#"{"name":"no id here"}]}"#
        );
        let listing = Listing::from_body(body, "Microsoft.CognitiveServices/accounts");
        assert_eq!(
            listing,
            Listing::Partial {
                resources: vec![res("/s/good", "good", "OpenAI")],
                skipped: vec![SkippedItem {
                    reason: "listed item has no 'id'".to_owned(),
                    raw: r#"{"name":"no id here"}"#.to_owned(),
                }],
            }
        );

        let body = r#"{"value": [
            {"id": "/s/unnamed", "kind": "OpenAI"},
            {"id": "/s/b", "name": "b"}
        ]}"#;
        let listing = Listing::from_body(body, SEARCH);
        assert_eq!(listing.resources(), &[res("/s/b", "b", "searchServices")]);
        assert_eq!(listing.skipped().len(), 1);
        assert_eq!(listing.skipped()[0].reason, "resource /s/unnamed has no 'name'");
    }

    #[test]
    fn empty_listing_is_complete() {
        assert_eq!(Listing::from_body(r#"{"value": []}"#, SEARCH), Listing::Complete(vec![]));
    }

    #[test]
    fn malformed_listings_keep_raw_body() {
        let error_body = r#"{"error": {"code": "AuthorizationFailed"}}"#;
        match Listing::from_body(error_body, SEARCH) {
            Listing::Malformed { raw, .. } => assert_eq!(raw, error_body),
            other => panic!("expected malformed listing, got {:?}", other),
        }
        assert!(matches!(
            Listing::from_body("<html>bad gateway</html>", SEARCH),
            Listing::Malformed { .. }
        ));
        assert!(matches!(
            Listing::from_body(r#"{"value": "not a list"}"#, SEARCH),
            Listing::Malformed { .. }
        ));
        assert!(Listing::from_body("null", SEARCH).resources().is_empty());
    }

    #[test]
    fn derived_kinds() {
        assert_eq!(derived_kind("Microsoft.BotService/botServices"), "botServices");
        assert_eq!(derived_kind("noslash"), "noslash");
    }

    #[tokio::test]
    async fn list_sends_filtered_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/sub-1/resources"))
            .and(query_param("$filter", "resourceType eq 'Microsoft.Search/searchServices'"))
            .and(query_param("api-version", API_VERSION))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"value": [{"id": "/subscriptions/sub-1/x", "name": "x"}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = server.uri();
        let listing = tokio::task::spawn_blocking(move || -> anyhow::Result<Listing> {
            let client = ArmClient::new(&endpoint, "tok".to_owned())?;
            list(&client, "sub-1", SEARCH)
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            listing,
            Listing::Partial {
                resources: vec![res("/subscriptions/sub-1/x", "x", "searchServices")],
                skipped: vec![],
            }
        );
    }

    #[tokio::test]
    async fn error_status_is_malformed_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"error": {}}"#))
            .mount(&server)
            .await;

        let endpoint = server.uri();
        let listing = tokio::task::spawn_blocking(move || -> anyhow::Result<Listing> {
            let client = ArmClient::new(&endpoint, "tok".to_owned())?;
            list(&client, "sub-1", SEARCH)
        })
        .await
        .unwrap()
        .unwrap();
        assert!(matches!(listing, Listing::Malformed { .. }));
    }
}
