//! A simulated remote server.
//!
//! [`InMemoryRemote`] keeps the authoritative collection in memory and
//! reproduces the behaviors the engine has to cope with:
//!
//! - **Read lag**: with lagging enabled, fetches keep returning the snapshot
//!   taken at the last [`sync_reads`](InMemoryRemote::sync_reads) while writes
//!   land immediately
//! - **Envelope variety**: responses are wrapped in a configurable
//!   [`EnvelopeShape`], or replaced by a scripted raw response
//! - **Failures**: queued with [`fail_next`](InMemoryRemote::fail_next), or
//!   drawn at a seeded rate from a [`FailurePlan`]
//! - **Latency**: every call sleeps on tokio's clock first
//!
//! Clones share the same server state, so a test can keep a handle while the
//! engine owns another.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Remote, RemoteError};
use crate::entity::Entity;
use crate::envelope::{EnvelopeShape, RawEnvelope};

type MutationHandler<T> = Arc<dyn Fn(&T, &Value) -> Result<T, RemoteError> + Send + Sync>;
type IdAssigner<T> = Arc<dyn Fn(T, u64) -> T + Send + Sync>;

// =============================================================================
// FailurePlan
// =============================================================================

/// Random failure injection.
///
/// Each call fails with probability `rate` (clamped to `0.0..=1.0`), drawn
/// from a generator seeded with `seed` so runs are reproducible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailurePlan {
    /// Probability that a call fails.
    pub rate: f64,
    /// Generator seed.
    pub seed: u64,
}

impl FailurePlan {
    /// Creates a plan failing with probability `rate`.
    #[must_use]
    pub const fn new(rate: f64, seed: u64) -> Self {
        Self { rate, seed }
    }
}

/// Number of calls received, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `fetch_collection` calls.
    pub fetches: usize,
    /// `mutate` calls.
    pub mutations: usize,
    /// `create` calls.
    pub creates: usize,
    /// `delete` calls.
    pub deletes: usize,
}

// =============================================================================
// State
// =============================================================================

struct ServerState<T> {
    records: Vec<T>,
    published: Option<Vec<T>>,
    shape: EnvelopeShape,
    scripted: VecDeque<Value>,
    queued_failures: VecDeque<RemoteError>,
    random_failures: Option<(f64, StdRng)>,
    latency: Option<Duration>,
    echo: bool,
    next_sequence: u64,
    calls: CallCounts,
}

impl<T> ServerState<T> {
    fn take_failure(&mut self) -> Option<RemoteError> {
        if let Some(error) = self.queued_failures.pop_front() {
            return Some(error);
        }
        let (rate, rng) = self.random_failures.as_mut()?;
        rng.random_bool(*rate)
            .then(|| RemoteError::server(503, "injected failure"))
    }
}

impl<T: Entity> ServerState<T> {
    fn position(&self, id: &T::Id) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }
}

// =============================================================================
// InMemoryRemote
// =============================================================================

/// A simulated remote server for one entity kind.
///
/// # Examples
///
/// ```rust
/// use reconciler::entity::{Entity, RecordId};
/// use reconciler::envelope::EnvelopeShape;
/// use reconciler::remote::{InMemoryRemote, Remote};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct Vendor { id: RecordId, active: bool }
///
/// impl Entity for Vendor {
///     type Id = RecordId;
///     const KIND: &'static str = "vendor";
///     fn id(&self) -> &RecordId { &self.id }
/// }
///
/// # let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
/// # runtime.block_on(async {
/// let remote = InMemoryRemote::new(vec![Vendor { id: RecordId::from("v-1"), active: true }])
///     .with_shape(EnvelopeShape::Items);
///
/// let body = remote.fetch_collection().await.unwrap();
/// assert_eq!(body["items"][0]["id"], "v-1");
/// # });
/// ```
pub struct InMemoryRemote<T: Entity> {
    state: Arc<Mutex<ServerState<T>>>,
    mutation_handler: MutationHandler<T>,
    id_assigner: IdAssigner<T>,
}

impl<T: Entity> Clone for InMemoryRemote<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            mutation_handler: Arc::clone(&self.mutation_handler),
            id_assigner: Arc::clone(&self.id_assigner),
        }
    }
}

impl<T: Entity> fmt::Debug for InMemoryRemote<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        formatter
            .debug_struct("InMemoryRemote")
            .field("kind", &T::KIND)
            .field("records", &state.records.len())
            .field("lagging", &state.published.is_some())
            .field("shape", &state.shape)
            .field("calls", &state.calls)
            .finish_non_exhaustive()
    }
}

impl<T> InMemoryRemote<T>
where
    T: Entity + Serialize + DeserializeOwned,
{
    /// Creates a server holding `records`, answering with bare arrays and
    /// applying action payloads as JSON merge patches.
    #[must_use]
    pub fn new(records: Vec<T>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                records,
                published: None,
                shape: EnvelopeShape::Bare,
                scripted: VecDeque::new(),
                queued_failures: VecDeque::new(),
                random_failures: None,
                latency: None,
                echo: true,
                next_sequence: 1,
                calls: CallCounts::default(),
            })),
            mutation_handler: Arc::new(merge_patch::<T>),
            id_assigner: Arc::new(|draft: T, _sequence: u64| draft),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Sets the envelope shape used for collection responses.
    #[must_use]
    pub fn with_shape(self, shape: EnvelopeShape) -> Self {
        self.set_shape(shape);
        self
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = Some(latency);
        self
    }

    /// Enables seeded random failures.
    #[must_use]
    pub fn with_failure_plan(self, plan: FailurePlan) -> Self {
        self.state.lock().random_failures = Some((
            plan.rate.clamp(0.0, 1.0),
            StdRng::seed_from_u64(plan.seed),
        ));
        self
    }

    /// Replaces the default merge-patch mutation semantics.
    #[must_use]
    pub fn with_mutation_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&T, &Value) -> Result<T, RemoteError> + Send + Sync + 'static,
    {
        self.mutation_handler = Arc::new(handler);
        self
    }

    /// Assigns server-side identity to created drafts.
    ///
    /// The closure receives the draft and a sequence number starting at 1.
    #[must_use]
    pub fn with_id_assigner<F>(mut self, assigner: F) -> Self
    where
        F: Fn(T, u64) -> T + Send + Sync + 'static,
    {
        self.id_assigner = Arc::new(assigner);
        self
    }

    /// Makes `mutate` and `create` answer without a body.
    #[must_use]
    pub fn without_echo(self) -> Self {
        self.state.lock().echo = false;
        self
    }

    // =========================================================================
    // Runtime controls
    // =========================================================================

    /// Changes the envelope shape for subsequent fetches.
    pub fn set_shape(&self, shape: EnvelopeShape) {
        self.state.lock().shape = shape;
    }

    /// Starts or stops read lag.
    ///
    /// Enabling lag freezes what fetches return at the current content.
    pub fn set_lagging(&self, lagging: bool) {
        let mut state = self.state.lock();
        let published = lagging.then(|| state.records.clone());
        state.published = published;
    }

    /// Lets lagging reads catch up with every write so far.
    pub fn sync_reads(&self) {
        let mut state = self.state.lock();
        if state.published.is_some() {
            state.published = Some(state.records.clone());
        }
    }

    /// Makes the next call of any kind fail with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.state.lock().queued_failures.push_back(error);
    }

    /// Makes the next fetch return `body` verbatim.
    pub fn push_raw_response(&self, body: Value) {
        self.state.lock().scripted.push_back(body);
    }

    /// Edits or inserts a record out of band, as another client would.
    pub fn upsert(&self, record: T) {
        let mut state = self.state.lock();
        match state.position(record.id()) {
            Some(index) => state.records[index] = record,
            None => state.records.push(record),
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the authoritative content.
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        self.state.lock().records.clone()
    }

    /// Returns the authoritative value of one record.
    #[must_use]
    pub fn record(&self, id: &T::Id) -> Option<T> {
        let state = self.state.lock();
        state.position(id).map(|index| state.records[index].clone())
    }

    /// Returns how many calls of each kind were received.
    #[must_use]
    pub fn call_counts(&self) -> CallCounts {
        self.state.lock().calls
    }

    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn render(state: &mut ServerState<T>) -> Result<Value, RemoteError> {
        if let Some(body) = state.scripted.pop_front() {
            return Ok(body);
        }
        let visible = state.published.as_ref().unwrap_or(&state.records);
        let values = visible
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| RemoteError::decode(error.to_string()))?;
        Ok(RawEnvelope::wrap(state.shape, values, None).into_value())
    }
}

impl<T> Remote<T> for InMemoryRemote<T>
where
    T: Entity + Serialize + DeserializeOwned,
{
    fn fetch_collection(&self) -> BoxFuture<'_, Result<Value, RemoteError>> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state.lock();
            state.calls.fetches += 1;
            if let Some(error) = state.take_failure() {
                return Err(error);
            }
            Self::render(&mut state)
        })
    }

    fn mutate<'a>(
        &'a self,
        id: &'a T::Id,
        payload: Value,
    ) -> BoxFuture<'a, Result<Option<T>, RemoteError>> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state.lock();
            state.calls.mutations += 1;
            if let Some(error) = state.take_failure() {
                return Err(error);
            }
            let index = state
                .position(id)
                .ok_or_else(|| RemoteError::rejected(404, format!("{} {id} not found", T::KIND)))?;
            let updated = (self.mutation_handler)(&state.records[index], &payload)?;
            state.records[index] = updated.clone();
            Ok(state.echo.then_some(updated))
        })
    }

    fn create(&self, draft: T) -> BoxFuture<'_, Result<Option<T>, RemoteError>> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state.lock();
            state.calls.creates += 1;
            if let Some(error) = state.take_failure() {
                return Err(error);
            }
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            let created = (self.id_assigner)(draft, sequence);
            if state.position(created.id()).is_some() {
                return Err(RemoteError::rejected(
                    409,
                    format!("{} {} already exists", T::KIND, created.id()),
                ));
            }
            state.records.push(created.clone());
            Ok(state.echo.then_some(created))
        })
    }

    fn delete<'a>(&'a self, id: &'a T::Id) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state.lock();
            state.calls.deletes += 1;
            if let Some(error) = state.take_failure() {
                return Err(error);
            }
            let index = state
                .position(id)
                .ok_or_else(|| RemoteError::rejected(404, format!("{} {id} not found", T::KIND)))?;
            state.records.remove(index);
            Ok(())
        })
    }
}

// =============================================================================
// Merge patch
// =============================================================================

/// Applies `patch` to `entity` as an RFC 7396 JSON merge patch.
fn merge_patch<T>(entity: &T, patch: &Value) -> Result<T, RemoteError>
where
    T: Serialize + DeserializeOwned,
{
    let mut document =
        serde_json::to_value(entity).map_err(|error| RemoteError::decode(error.to_string()))?;
    apply_patch(&mut document, patch);
    serde_json::from_value(document)
        .map_err(|error| RemoteError::rejected(422, format!("invalid payload: {error}")))
}

fn apply_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                apply_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RecordId;
    use crate::remote::RemoteErrorKind;
    use rstest::rstest;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Audit {
        id: RecordId,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auditor: Option<String>,
    }

    impl Entity for Audit {
        type Id = RecordId;
        const KIND: &'static str = "audit";

        fn id(&self) -> &RecordId {
            &self.id
        }
    }

    fn audit(id: &str, status: &str) -> Audit {
        Audit {
            id: RecordId::from(id),
            status: status.to_string(),
            auditor: None,
        }
    }

    // =========================================================================
    // fetch_collection
    // =========================================================================

    #[rstest]
    #[case(EnvelopeShape::Bare, json!([{"id": "a-1", "status": "scheduled"}]))]
    #[case(EnvelopeShape::Data, json!({"data": [{"id": "a-1", "status": "scheduled"}]}))]
    #[case(EnvelopeShape::Items, json!({"items": [{"id": "a-1", "status": "scheduled"}]}))]
    #[tokio::test]
    async fn test_fetch_uses_configured_shape(#[case] shape: EnvelopeShape, #[case] expected: Value) {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]).with_shape(shape);
        assert_eq!(remote.fetch_collection().await.unwrap(), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn test_scripted_response_is_served_once() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]);
        remote.push_raw_response(json!({"unexpected": true}));

        assert_eq!(remote.fetch_collection().await.unwrap(), json!({"unexpected": true}));
        assert!(remote.fetch_collection().await.unwrap().is_array());
    }

    #[rstest]
    #[tokio::test]
    async fn test_lagging_reads_until_synced() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]);
        remote.set_lagging(true);

        remote
            .mutate(&RecordId::from("a-1"), json!({"status": "completed"}))
            .await
            .unwrap();

        let stale = remote.fetch_collection().await.unwrap();
        assert_eq!(stale[0]["status"], "scheduled");

        remote.sync_reads();
        let fresh = remote.fetch_collection().await.unwrap();
        assert_eq!(fresh[0]["status"], "completed");
    }

    // =========================================================================
    // mutate
    // =========================================================================

    #[rstest]
    #[tokio::test]
    async fn test_mutate_applies_merge_patch() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]);

        let echoed = remote
            .mutate(&RecordId::from("a-1"), json!({"status": "in_progress", "auditor": "kim"}))
            .await
            .unwrap();

        let expected = Audit {
            auditor: Some("kim".to_string()),
            ..audit("a-1", "in_progress")
        };
        assert_eq!(echoed, Some(expected.clone()));
        assert_eq!(remote.record(&RecordId::from("a-1")), Some(expected));
    }

    #[rstest]
    #[tokio::test]
    async fn test_mutate_missing_record_is_rejected() {
        let remote = InMemoryRemote::new(Vec::<Audit>::new());
        let error = remote
            .mutate(&RecordId::from("a-9"), json!({}))
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(404));
    }

    #[rstest]
    #[tokio::test]
    async fn test_mutate_with_invalid_payload_is_rejected() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]);
        let error = remote
            .mutate(&RecordId::from("a-1"), json!({"status": 7}))
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(422));
        assert_eq!(remote.record(&RecordId::from("a-1")), Some(audit("a-1", "scheduled")));
    }

    #[rstest]
    #[tokio::test]
    async fn test_without_echo_returns_no_body() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]).without_echo();
        let echoed = remote
            .mutate(&RecordId::from("a-1"), json!({"status": "cancelled"}))
            .await
            .unwrap();
        assert_eq!(echoed, None);
    }

    // =========================================================================
    // create / delete
    // =========================================================================

    #[rstest]
    #[tokio::test]
    async fn test_create_assigns_server_id() {
        let remote = InMemoryRemote::new(Vec::new())
            .with_id_assigner(|draft: Audit, sequence| Audit {
                id: RecordId::new(format!("srv-{sequence}")),
                ..draft
            });

        let created = remote.create(audit("tmp-1", "scheduled")).await.unwrap();

        assert_eq!(created.map(|audit| audit.id), Some(RecordId::from("srv-1")));
        assert_eq!(remote.records().len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_create_duplicate_is_conflict() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]);
        let error = remote.create(audit("a-1", "scheduled")).await.unwrap_err();
        assert_eq!(error.status(), Some(409));
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_removes_record() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]);
        remote.delete(&RecordId::from("a-1")).await.unwrap();
        assert!(remote.records().is_empty());
        assert!(remote.delete(&RecordId::from("a-1")).await.is_err());
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    #[rstest]
    #[tokio::test]
    async fn test_fail_next_fails_exactly_once() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")]);
        remote.fail_next(RemoteError::network("unplugged"));

        let error = remote.fetch_collection().await.unwrap_err();
        assert_eq!(error.kind(), RemoteErrorKind::Network);
        assert!(remote.fetch_collection().await.is_ok());
        assert_eq!(remote.call_counts().fetches, 2);
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(1.0, 20)]
    #[tokio::test]
    async fn test_failure_plan_extremes(#[case] rate: f64, #[case] expected_failures: usize) {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")])
            .with_failure_plan(FailurePlan::new(rate, 7));

        let mut failures = 0;
        for _ in 0..20 {
            if remote.fetch_collection().await.is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, expected_failures);
    }

    #[rstest]
    #[tokio::test]
    async fn test_failure_plan_is_reproducible() {
        async fn outcomes(seed: u64) -> Vec<bool> {
            let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")])
                .with_failure_plan(FailurePlan::new(0.5, seed));
            let mut outcomes = Vec::new();
            for _ in 0..16 {
                outcomes.push(remote.fetch_collection().await.is_ok());
            }
            outcomes
        }

        assert_eq!(outcomes(42).await, outcomes(42).await);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_latency_uses_tokio_clock() {
        let remote = InMemoryRemote::new(vec![audit("a-1", "scheduled")])
            .with_latency(Duration::from_millis(300));
        let start = tokio::time::Instant::now();

        remote.fetch_collection().await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    // =========================================================================
    // Merge patch
    // =========================================================================

    #[rstest]
    fn test_apply_patch_null_removes_member() {
        let mut document = json!({"a": 1, "b": {"c": 2, "d": 3}});
        apply_patch(&mut document, &json!({"a": null, "b": {"c": 9}}));
        assert_eq!(document, json!({"b": {"c": 9, "d": 3}}));
    }
}
