//! In-process event multiplexer for Hivewire.
//!
//! The multiplexer is a routing table: subscriptions keyed by numeric
//! event id, an `emit`/`emit_raw` dispatch path, and echo suppression so
//! a component that both emits and listens on the same event — tagged
//! with its own identity — never observes its own emission.
//!
//! # Dispatch model
//!
//! Callbacks never run inline with `emit`. Each non-filtered subscriber
//! is spawned as its own Tokio task, and the emission's future resolves
//! only once every one of those tasks has completed. Two guarantees fall
//! out of this:
//!
//! - A caller never observes partial synchronous side effects of `emit`
//!   before it yields — dispatch is deferred to the scheduler.
//! - A callback that itself emits further events cannot re-enter the
//!   current batch; the nested emission is just another set of tasks.
//!
//! # Unsubscribe race
//!
//! [`EventMultiplexer::emit_raw`] snapshots the surviving handler list
//! before spawning anything. A subscription removed while a batch is in
//! flight still runs for that batch and never for later emissions. This
//! is deliberate and tested, not incidental.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{join_all, BoxFuture};
use hivewire_protocol::{EventSpecification, Message, Value};
use rand::Rng;
use tracing::{debug, trace, warn};

/// Counter for generating process-unique subscription ids.
///
/// Process-wide (not per-multiplexer) so an id can never be confused
/// between two multiplexer instances, and never reused for the life of
/// the process.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Subscription ids
// ---------------------------------------------------------------------------

/// Opaque handle to a subscription.
///
/// The multiplexer owns the subscription itself; callers only hold this
/// id and present it back to [`EventMultiplexer::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// The boxed form every subscriber callback is stored as.
pub type EventCallback = Arc<dyn Fn(Arc<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

/// One registered subscriber.
struct Subscription {
    event_id: u32,
    /// Echo-suppression tag. `None` means "never filtered".
    origin: Option<String>,
    callback: EventCallback,
}

impl Subscription {
    /// Whether an emission carrying `origin` must skip this subscriber.
    ///
    /// The rules, exactly: an untagged subscription sees everything; a
    /// tagged subscription is skipped only when the emission carries the
    /// same tag.
    fn suppressed_by(&self, origin: Option<&str>) -> bool {
        match (&self.origin, origin) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

/// Interior state: the subscription arena plus a side index from event
/// id to insertion-ordered subscription ids.
#[derive(Default)]
struct MuxState {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    by_event: HashMap<u32, Vec<SubscriptionId>>,
}

// ---------------------------------------------------------------------------
// Multiplexer
// ---------------------------------------------------------------------------

/// The single-process publish/subscribe hub for decoded events.
///
/// One instance per logical session. All mutation (subscribe /
/// unsubscribe) and all reads (dispatch) go through this object; nothing
/// may bypass it. The interior mutex guards only the table — it is never
/// held across an await, so subscribe/unsubscribe from inside a callback
/// cannot deadlock.
pub struct EventMultiplexer {
    /// The local actor's identity, stamped into every outbound envelope.
    sender_id: u32,
    state: Mutex<MuxState>,
}

impl EventMultiplexer {
    /// Creates a multiplexer emitting as the given actor identity.
    pub fn new(sender_id: u32) -> Self {
        debug!(sender_id, "event multiplexer created");
        Self {
            sender_id,
            state: Mutex::new(MuxState::default()),
        }
    }

    /// Creates a multiplexer with a randomly generated identity — for
    /// sessions where the server hasn't assigned one yet.
    pub fn with_random_identity() -> Self {
        Self::new(rand::rng().random())
    }

    /// The identity stamped into outbound envelopes.
    pub fn sender_id(&self) -> u32 {
        self.sender_id
    }

    // -- Subscribing ------------------------------------------------------

    /// Registers `callback` for the given event. It will run once per
    /// matching emission, in a task of its own.
    ///
    /// Multiple subscriptions to the same event are allowed and all fire.
    pub fn subscribe<F, Fut>(
        &self,
        spec: &EventSpecification,
        callback: F,
    ) -> SubscriptionId
    where
        F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_subscription(spec.id(), None, wrap_callback(callback))
    }

    /// Like [`subscribe`](Self::subscribe), but tags the subscription
    /// with an origin: emissions carrying the same tag are not delivered
    /// to it (echo suppression).
    pub fn subscribe_with_origin<F, Fut>(
        &self,
        spec: &EventSpecification,
        origin: &str,
        callback: F,
    ) -> SubscriptionId
    where
        F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_subscription(spec.id(), Some(origin.to_string()), wrap_callback(callback))
    }

    fn add_subscription(
        &self,
        event_id: u32,
        origin: Option<String>,
        callback: EventCallback,
    ) -> SubscriptionId {
        let id = SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed));

        let mut state = self.lock_state();
        state.subscriptions.insert(
            id,
            Subscription {
                event_id,
                origin,
                callback,
            },
        );
        state.by_event.entry(event_id).or_default().push(id);

        debug!(%id, event_id, "subscription registered");
        id
    }

    /// Removes the given subscriptions. Returns whether *any* removal
    /// occurred. Unknown or already-removed ids are benign no-ops.
    ///
    /// Removal affects future emissions only; a batch already snapshotted
    /// by [`emit_raw`](Self::emit_raw) still runs to completion.
    pub fn unsubscribe(&self, ids: &[SubscriptionId]) -> bool {
        let mut state = self.lock_state();
        let mut removed_any = false;

        for id in ids {
            let Some(sub) = state.subscriptions.remove(id) else {
                continue;
            };
            if let Some(list) = state.by_event.get_mut(&sub.event_id) {
                list.retain(|entry| entry != id);
                if list.is_empty() {
                    state.by_event.remove(&sub.event_id);
                }
            }
            debug!(%id, event_id = sub.event_id, "subscription removed");
            removed_any = true;
        }

        removed_any
    }

    // -- Emitting ---------------------------------------------------------

    /// Stamps the envelope (local `sender_id`, the event's id) onto the
    /// payload and dispatches. Resolves once every subscriber callback
    /// for this emission has completed; returns how many were invoked.
    pub async fn emit(&self, spec: &EventSpecification, fields: Vec<Value>) -> u32 {
        self.emit_raw(Message::new(self.sender_id, spec.id(), fields), None)
            .await
    }

    /// [`emit`](Self::emit) with an origin tag for echo suppression.
    pub async fn emit_with_origin(
        &self,
        spec: &EventSpecification,
        fields: Vec<Value>,
        origin: &str,
    ) -> u32 {
        self.emit_raw(
            Message::new(self.sender_id, spec.id(), fields),
            Some(origin),
        )
        .await
    }

    /// Dispatches an already-stamped message — the inbound path used by
    /// the transport adapter, whose frames arrive with the envelope
    /// already on them.
    ///
    /// Subscribers whose origin tag equals this emission's origin are
    /// filtered out. The rest are snapshotted in insertion order, each
    /// spawned as an independent task, and all awaited. The message is
    /// frozen behind an `Arc` before the first task starts: every
    /// subscriber sees the same immutable payload.
    pub async fn emit_raw(&self, message: Message, origin: Option<&str>) -> u32 {
        let event_id = message.event_id;
        let message = Arc::new(message);

        // Snapshot under the lock, dispatch after releasing it. The
        // snapshot is what makes the unsubscribe race deterministic.
        let callbacks: Vec<EventCallback> = {
            let state = self.lock_state();
            match state.by_event.get(&event_id) {
                Some(ids) => ids
                    .iter()
                    .filter_map(|id| state.subscriptions.get(id))
                    .filter(|sub| !sub.suppressed_by(origin))
                    .map(|sub| Arc::clone(&sub.callback))
                    .collect(),
                None => Vec::new(),
            }
        };

        let invoked = callbacks.len() as u32;
        trace!(event_id, invoked, ?origin, "dispatching event");

        let tasks: Vec<_> = callbacks
            .into_iter()
            .map(|callback| tokio::spawn(callback(Arc::clone(&message))))
            .collect();

        for result in join_all(tasks).await {
            if let Err(e) = result {
                // A panicking subscriber doesn't abort the batch or
                // change the invoked count — it was invoked.
                warn!(event_id, error = %e, "event callback panicked");
            }
        }

        invoked
    }

    // -- Introspection ----------------------------------------------------

    /// Number of live subscriptions for one event id.
    pub fn subscriber_count(&self, event_id: u32) -> usize {
        self.lock_state()
            .by_event
            .get(&event_id)
            .map_or(0, Vec::len)
    }

    /// Total live subscriptions across all events.
    pub fn len(&self) -> usize {
        self.lock_state().subscriptions.len()
    }

    /// Whether no subscriptions exist.
    pub fn is_empty(&self) -> bool {
        self.lock_state().subscriptions.is_empty()
    }

    /// Locks the table, recovering from poisoning. A poisoned lock here
    /// only means some thread panicked mid-mutation of a HashMap entry;
    /// the table itself is still structurally sound.
    fn lock_state(&self) -> MutexGuard<'_, MuxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Boxes a caller's async callback into the stored [`EventCallback`] form.
fn wrap_callback<F, Fut>(callback: F) -> EventCallback
where
    F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |message: Arc<Message>| -> BoxFuture<'static, ()> {
        Box::pin(callback(message))
    })
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the subscription table itself. The dispatch
    //! properties (fan-out, echo suppression, races) live in
    //! `tests/multiplexer.rs`.

    use super::*;
    use hivewire_protocol::{FieldDescriptor, Permissions, WireType};
    use std::sync::atomic::AtomicU32;

    fn chat_spec() -> EventSpecification {
        EventSpecification::new(
            1,
            "chat",
            Permissions::all(),
            vec![FieldDescriptor::new("text", WireType::Str)],
        )
        .unwrap()
    }

    #[test]
    fn test_subscribe_grows_the_table() {
        let mux = EventMultiplexer::new(7);
        assert!(mux.is_empty());

        mux.subscribe(&chat_spec(), |_| async {});
        mux.subscribe(&chat_spec(), |_| async {});

        assert_eq!(mux.len(), 2);
        assert_eq!(mux.subscriber_count(1), 2);
        assert_eq!(mux.subscriber_count(99), 0);
    }

    #[test]
    fn test_unsubscribe_removes_and_reports() {
        let mux = EventMultiplexer::new(7);
        let id = mux.subscribe(&chat_spec(), |_| async {});

        assert!(mux.unsubscribe(&[id]));
        assert!(mux.is_empty());
        // Second removal of the same id: benign no-op, returns false.
        assert!(!mux.unsubscribe(&[id]));
    }

    #[test]
    fn test_unsubscribe_mixed_batch_returns_true_if_any_removed() {
        let mux = EventMultiplexer::new(7);
        let live = mux.subscribe(&chat_spec(), |_| async {});
        let dead = SubscriptionId(u64::MAX);

        assert!(mux.unsubscribe(&[dead, live]));
        assert!(!mux.unsubscribe(&[dead]));
    }

    #[test]
    fn test_suppression_rules() {
        let noop = wrap_callback(|_| async {});
        let untagged = Subscription {
            event_id: 1,
            origin: None,
            callback: Arc::clone(&noop),
        };
        let tagged = Subscription {
            event_id: 1,
            origin: Some("ui".into()),
            callback: noop,
        };

        // Untagged subscriptions see everything.
        assert!(!untagged.suppressed_by(None));
        assert!(!untagged.suppressed_by(Some("ui")));
        // Tagged subscriptions are filtered from exactly their own tag.
        assert!(tagged.suppressed_by(Some("ui")));
        assert!(!tagged.suppressed_by(Some("socket")));
        assert!(!tagged.suppressed_by(None));
    }

    #[tokio::test]
    async fn test_emit_stamps_sender_and_event_id() {
        let mux = EventMultiplexer::new(42);
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = Arc::clone(&seen);
        mux.subscribe(&chat_spec(), move |msg| {
            let seen = Arc::clone(&seen_clone);
            async move {
                *seen.lock().unwrap() = Some((msg.sender_id, msg.event_id));
            }
        });

        let invoked = mux.emit(&chat_spec(), vec![Value::Str("hi".into())]).await;
        assert_eq!(invoked, 1);
        assert_eq!(*seen.lock().unwrap(), Some((42, 1)));
    }

    #[tokio::test]
    async fn test_emit_with_no_subscribers_returns_zero() {
        let mux = EventMultiplexer::new(1);
        let invoked = mux.emit(&chat_spec(), vec![Value::Str("void".into())]).await;
        assert_eq!(invoked, 0);
    }

    #[tokio::test]
    async fn test_emit_completes_async_callbacks_before_resolving() {
        let mux = EventMultiplexer::new(1);
        let counter = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&counter);
        mux.subscribe(&chat_spec(), move |_| {
            let c = Arc::clone(&c);
            async move {
                // Yield a few times so completion genuinely happens
                // after emit's own task would have resumed.
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        mux.emit(&chat_spec(), vec![Value::Str("x".into())]).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
