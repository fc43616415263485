//! Change feed: live query subscriptions over the turn store.
//!
//! A subscriber registers a [`FeedQuery`] and a listener, receives the
//! current snapshot right away, and a fresh snapshot every time
//! [`TurnFeed::publish`] runs after a write. The returned [`Subscription`]
//! unsubscribes when cancelled or dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::db::{Database, DbResult};
use crate::models::Turn;
use crate::queue::{order_queue, QueueKind};

/// What a subscriber is watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedQuery {
    /// A waiting line in call order
    Queue(QueueKind),
    /// Turns a professional holds at a module or consultorio
    Attending {
        professional_id: String,
        module: String,
    },
    /// Turns being attended anywhere, latest call first (display board)
    ActiveCalls { limit: usize },
    /// Latest requests
    Recent { limit: usize },
}

impl FeedQuery {
    /// Run the query against the store.
    pub fn evaluate(&self, db: &Database) -> DbResult<Vec<Turn>> {
        match self {
            FeedQuery::Queue(kind) => {
                let service = match kind {
                    QueueKind::Staff { service } => Some(service.as_str()),
                    QueueKind::Doctor => None,
                };
                let candidates = db.list_turns_with_status(kind.waiting_status(), service)?;
                Ok(order_queue(kind, candidates))
            }
            FeedQuery::Attending {
                professional_id,
                module,
            } => db.list_held_turns(professional_id, module, None),
            FeedQuery::ActiveCalls { limit } => db.list_active_calls(*limit),
            FeedQuery::Recent { limit } => db.list_recent_turns(*limit),
        }
    }
}

/// Callback receiving snapshots.
pub type Listener = Arc<dyn Fn(Vec<Turn>) + Send + Sync>;

struct Entry {
    query: FeedQuery,
    listener: Listener,
}

type Registry = Mutex<HashMap<u64, Entry>>;

/// Registry of live subscriptions.
pub struct TurnFeed {
    registry: Arc<Registry>,
    next_id: AtomicU64,
}

impl Default for TurnFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnFeed {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener and deliver the initial snapshot.
    pub fn subscribe(
        &self,
        db: &Database,
        query: FeedQuery,
        listener: Listener,
    ) -> DbResult<Subscription> {
        let (subscription, initial) = self.subscribe_deferred(db, query, listener)?;
        initial.deliver();
        Ok(subscription)
    }

    /// Register a listener and return the initial snapshot undelivered, so
    /// the caller can release the database before running the listener.
    pub fn subscribe_deferred(
        &self,
        db: &Database,
        query: FeedQuery,
        listener: Listener,
    ) -> DbResult<(Subscription, Delivery)> {
        let turns = query.evaluate(db)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        lock(&self.registry).insert(
            id,
            Entry {
                query: query.clone(),
                listener: listener.clone(),
            },
        );
        tracing::debug!(subscription = id, query = ?query, "subscribed");

        let subscription = Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        };
        Ok((subscription, Delivery { listener, turns }))
    }

    /// Re-evaluate every subscription and deliver fresh snapshots.
    pub fn publish(&self, db: &Database) {
        for delivery in self.snapshots(db) {
            delivery.deliver();
        }
    }

    /// Re-evaluate every subscription without delivering.
    ///
    /// A failed query is logged and skipped; the next publish retries it.
    pub fn snapshots(&self, db: &Database) -> Vec<Delivery> {
        // Listeners run outside the registry lock so they may cancel themselves
        let entries: Vec<(u64, FeedQuery, Listener)> = lock(&self.registry)
            .iter()
            .map(|(id, entry)| (*id, entry.query.clone(), entry.listener.clone()))
            .collect();

        entries
            .into_iter()
            .filter_map(|(id, query, listener)| match query.evaluate(db) {
                Ok(turns) => Some(Delivery { listener, turns }),
                Err(e) => {
                    tracing::warn!(subscription = id, error = %e, "feed query failed");
                    None
                }
            })
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).len()
    }
}

/// A snapshot waiting to be handed to its listener.
pub struct Delivery {
    listener: Listener,
    turns: Vec<Turn>,
}

impl Delivery {
    pub fn deliver(self) {
        (self.listener)(self.turns);
    }
}

/// Cancellation handle for a subscription.
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop receiving snapshots. Idempotent.
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if lock(&registry).remove(&self.id).is_some() {
                tracing::debug!(subscription = self.id, "unsubscribed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, HashMap<u64, Entry>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn pending(number: &str) -> Turn {
        Turn::new(
            number.into(),
            "Facturación".into(),
            "1".into(),
            "Paciente".into(),
            false,
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
        )
    }

    fn recorder() -> (Listener, Arc<Mutex<Vec<usize>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener = Arc::new(move |turns: Vec<Turn>| {
            sink.lock().unwrap().push(turns.len());
        });
        (listener, seen)
    }

    fn billing_queue() -> FeedQuery {
        FeedQuery::Queue(QueueKind::Staff {
            service: "Facturación".into(),
        })
    }

    #[test]
    fn test_initial_snapshot_and_updates() {
        let db = Database::open_in_memory().unwrap();
        let feed = TurnFeed::new();
        let (listener, seen) = recorder();

        let _sub = feed.subscribe(&db, billing_queue(), listener).unwrap();
        db.insert_turn(&pending("F-001")).unwrap();
        feed.publish(&db);
        db.insert_turn(&pending("F-002")).unwrap();
        feed.publish(&db);

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let db = Database::open_in_memory().unwrap();
        let feed = TurnFeed::new();
        let (listener, seen) = recorder();

        let sub = feed.subscribe(&db, billing_queue(), listener).unwrap();
        sub.cancel();
        sub.cancel();
        db.insert_turn(&pending("F-001")).unwrap();
        feed.publish(&db);

        assert_eq!(*seen.lock().unwrap(), vec![0]);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let db = Database::open_in_memory().unwrap();
        let feed = TurnFeed::new();
        let (listener, _) = recorder();
        {
            let _sub = feed
                .subscribe(&db, FeedQuery::Recent { limit: 5 }, listener)
                .unwrap();
            assert_eq!(feed.subscriber_count(), 1);
        }
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn test_handle_outlives_feed() {
        let db = Database::open_in_memory().unwrap();
        let feed = TurnFeed::new();
        let (listener, _) = recorder();
        let sub = feed
            .subscribe(&db, FeedQuery::ActiveCalls { limit: 5 }, listener)
            .unwrap();
        drop(feed);
        sub.cancel();
    }

    #[test]
    fn test_deferred_delivery() {
        let db = Database::open_in_memory().unwrap();
        let feed = TurnFeed::new();
        let (listener, seen) = recorder();

        let (_sub, initial) = feed
            .subscribe_deferred(&db, billing_queue(), listener)
            .unwrap();
        db.insert_turn(&pending("F-001")).unwrap();
        let pending_deliveries = feed.snapshots(&db);
        assert!(seen.lock().unwrap().is_empty());

        initial.deliver();
        for delivery in pending_deliveries {
            delivery.deliver();
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }
}
