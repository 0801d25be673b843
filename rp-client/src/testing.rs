//! An in-memory [`Backend`], gated behind the `testing` feature, for driving
//! `rp-client`'s own tests and the DNS cleanup state machine's literal scenarios (§8)
//! without a real database (mirrors `kube-test`'s in-memory API server).

use std::collections::HashMap;
use std::sync::Mutex;

use rp_core::{ResourceId, ResourceKind};
use serde_json::Value;

use crate::backend::{Backend, ChangeFeedDocument, DocumentHeader, FeedPage, FeedRange, Page};
use crate::error::{Error, Result};
use crate::params::{ListParams, ListScope};

/// The single feed range this backend exposes. A real backend may shard into many;
/// tests only need to exercise the reader's per-range loop once.
pub const SINGLE_RANGE: &str = "0";

struct Document {
    body: Value,
    etag: String,
}

#[derive(Default)]
struct State {
    documents: HashMap<(ResourceKind, ResourceId), Document>,
    feed: Vec<ChangeFeedDocument>,
}

/// Every method is synchronous under the hood; the `async fn`s exist only to satisfy
/// the [`Backend`] trait's shape.
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()) }
    }

    /// Seed a document directly, bypassing `create`'s change-feed bookkeeping. Useful
    /// for tests that want to start from a populated store.
    pub fn seed(&self, kind: ResourceKind, id: ResourceId, body: Value) {
        let mut state = self.state.lock().expect("in-memory backend lock poisoned");
        let etag = extract_etag(&body).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        state.documents.insert((kind, id), Document { body, etag });
    }

    fn record_feed(&self, state: &mut State, kind: ResourceKind, id: ResourceId, body: Value, timestamp: chrono::DateTime<chrono::Utc>) {
        state.feed.push(ChangeFeedDocument {
            header: DocumentHeader { kind, id, timestamp },
            body,
        });
    }
}

fn extract_id(body: &Value) -> Result<ResourceId> {
    let raw = body
        .get("id")
        .ok_or_else(|| Error::Io("document body is missing an id field".to_string()))?;
    Ok(serde_json::from_value(raw.clone())?)
}

fn extract_etag(body: &Value) -> Option<String> {
    body.get("metadata")?.get("etag")?.as_str().map(str::to_owned)
}

fn scope_matches(scope: &ListScope, id: &ResourceId) -> bool {
    match scope {
        ListScope::ResourceGroup(rg_id) => {
            id.subscription_id() == rg_id.subscription_id() && id.resource_group() == rg_id.resource_group()
        }
        ListScope::Parent(parent_id) => id.parent().as_ref() == Some(parent_id),
        ListScope::Subscription(sub) => id.subscription_id() == *sub,
    }
}

impl Backend for InMemoryBackend {
    async fn get(&self, kind: ResourceKind, id: &ResourceId) -> Result<Value> {
        let state = self.state.lock().expect("in-memory backend lock poisoned");
        state
            .documents
            .get(&(kind, id.clone()))
            .map(|doc| doc.body.clone())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn create(&self, kind: ResourceKind, body: Value) -> Result<Value> {
        let id = extract_id(&body)?;
        let mut state = self.state.lock().expect("in-memory backend lock poisoned");
        if state.documents.contains_key(&(kind.clone(), id.clone())) {
            return Err(Error::Conflict(id.to_string()));
        }
        let etag = uuid::Uuid::new_v4().to_string();
        let mut stored = body.clone();
        stamp_etag(&mut stored, &etag);
        state.documents.insert((kind.clone(), id.clone()), Document { body: stored.clone(), etag });
        self.record_feed(&mut state, kind, id, stored.clone(), now());
        Ok(stored)
    }

    async fn replace(&self, kind: ResourceKind, id: &ResourceId, etag: &str, body: Value) -> Result<Value> {
        let mut state = self.state.lock().expect("in-memory backend lock poisoned");
        let key = (kind.clone(), id.clone());
        let current = state.documents.get(&key).ok_or_else(|| Error::NotFound(id.to_string()))?;
        if current.etag != etag {
            return Err(Error::Conflict(id.to_string()));
        }
        let new_etag = uuid::Uuid::new_v4().to_string();
        let mut stored = body.clone();
        stamp_etag(&mut stored, &new_etag);
        state.documents.insert(key, Document { body: stored.clone(), etag: new_etag });
        self.record_feed(&mut state, kind, id.clone(), stored.clone(), now());
        Ok(stored)
    }

    async fn delete(&self, kind: ResourceKind, id: &ResourceId) -> Result<()> {
        let mut state = self.state.lock().expect("in-memory backend lock poisoned");
        state
            .documents
            .remove(&(kind, id.clone()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn list_page(&self, kind: ResourceKind, scope: &ListScope, _params: ListParams) -> Result<Page<Value>> {
        let state = self.state.lock().expect("in-memory backend lock poisoned");
        let items = state
            .documents
            .iter()
            .filter(|((k, id), _)| *k == kind && scope_matches(scope, id))
            .map(|(_, doc)| doc.body.clone())
            .collect();
        Ok(Page { items, continuation: None })
    }

    async fn list_all_page(&self, kind: ResourceKind, _params: ListParams) -> Result<Page<Value>> {
        let state = self.state.lock().expect("in-memory backend lock poisoned");
        let items = state
            .documents
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, doc)| doc.body.clone())
            .collect();
        Ok(Page { items, continuation: None })
    }

    async fn feed_ranges(&self) -> Result<Vec<FeedRange>> {
        Ok(vec![FeedRange(SINGLE_RANGE.to_string())])
    }

    async fn read_feed_page(&self, range: &FeedRange, continuation: Option<&str>) -> Result<FeedPage> {
        if range.0 != SINGLE_RANGE {
            return Err(Error::Io(format!("unknown feed range {}", range.0)));
        }
        let state = self.state.lock().expect("in-memory backend lock poisoned");
        let start: usize = match continuation {
            None => 0,
            Some(token) => token
                .parse()
                .map_err(|_| Error::FeedRangeExpired(token.to_string()))?,
        };
        if start > state.feed.len() {
            return Err(Error::FeedRangeExpired(continuation.unwrap_or_default().to_string()));
        }
        let documents = state.feed[start..].to_vec();
        let next = state.feed.len();
        Ok(FeedPage {
            documents,
            continuation: next.to_string(),
            has_more: false,
        })
    }
}

fn stamp_etag(body: &mut Value, etag: &str) {
    if let Some(metadata) = body.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert("etag".to_string(), Value::String(etag.to_string()));
    }
}

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use rp_core::entities::Subscription;
    use rp_core::entities::subscription::RegistrationState;
    use rp_core::CosmosMetadata;

    use super::*;

    fn sub_id() -> ResourceId {
        ResourceId::subscription_root("11111111-1111-1111-1111-111111111111".parse().unwrap())
    }

    fn subscription_doc() -> Subscription {
        Subscription {
            id: sub_id(),
            metadata: CosmosMetadata::new("unset", now()),
            registration_state: RegistrationState::Registered,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let backend = InMemoryBackend::new();
        let body = serde_json::to_value(subscription_doc()).unwrap();
        let created = backend.create(ResourceKind::Subscription, body).await.unwrap();
        let fetched = backend.get(ResourceKind::Subscription, &sub_id()).await.unwrap();
        assert_eq!(created, fetched);
    }

    #[tokio::test]
    async fn replace_with_stale_etag_conflicts() {
        let backend = InMemoryBackend::new();
        let body = serde_json::to_value(subscription_doc()).unwrap();
        backend.create(ResourceKind::Subscription, body.clone()).await.unwrap();

        let err = backend
            .replace(ResourceKind::Subscription, &sub_id(), "stale-etag", body)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend.get(ResourceKind::Subscription, &sub_id()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
