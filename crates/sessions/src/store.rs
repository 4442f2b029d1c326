//! In-memory session registry.
//!
//! Two tiers of locking: the registry map sits behind a reader/writer lock
//! (lookups share, inserts exclude), and every [`Session`] owns a mutex over
//! its own turn buffer.  No lock is ever held across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use dg_domain::trace::TraceEvent;
use dg_domain::turn::{Turn, UserId};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bounded conversation history for one user.
///
/// Invariant: `turns.len() <= max_turns`; trimming always drops the oldest
/// turns and keeps the rest in order.
#[derive(Debug)]
pub struct Session {
    user_id: UserId,
    max_turns: usize,
    turns: Mutex<VecDeque<Turn>>,
}

impl Session {
    fn new(user_id: UserId, max_turns: usize) -> Self {
        Self {
            user_id,
            max_turns,
            turns: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Append `turn` and drop the oldest turns until the window fits.
    /// Returns how many turns were dropped.
    pub fn append_and_trim(&self, turn: Turn) -> usize {
        let (dropped, kept) = {
            let mut turns = self.turns.lock();
            turns.push_back(turn);
            let overflow = turns.len().saturating_sub(self.max_turns);
            turns.drain(..overflow);
            (overflow, turns.len())
        };

        if dropped > 0 {
            TraceEvent::HistoryTrimmed {
                user_id: self.user_id.to_string(),
                dropped,
                kept,
            }
            .emit();
        }
        dropped
    }

    /// Independent copy of the current history.  Later appends are never
    /// visible through the returned value.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.lock().is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Registry of live sessions, one per user identity.
///
/// Sessions are created lazily and live for the lifetime of the store.
pub struct SessionStore {
    max_turns: usize,
    sessions: RwLock<HashMap<UserId, Arc<Session>>>,
}

impl SessionStore {
    /// Create an empty store whose sessions keep at most `max_turns` turns.
    /// A zero window is raised to one.
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns.max(1);
        tracing::info!(max_turns, "session store ready");
        Self {
            max_turns,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Look up a session without creating it.
    pub fn get(&self, user_id: &UserId) -> Option<Arc<Session>> {
        self.sessions.read().get(user_id).cloned()
    }

    /// Return the user's session, creating and registering an empty one on
    /// first contact.  Concurrent callers for the same unseen user all get
    /// the same `Arc`.
    pub fn get_or_create(&self, user_id: &UserId) -> Arc<Session> {
        // Fast path: session already exists.
        if let Some(session) = self.sessions.read().get(user_id) {
            return session.clone();
        }

        // Slow path: another writer may have won the race between the two
        // locks, so the entry is checked again under the write lock.
        let (session, created, total) = {
            let mut sessions = self.sessions.write();
            let mut created = false;
            let session = sessions
                .entry(user_id.clone())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(Session::new(user_id.clone(), self.max_turns))
                })
                .clone();
            (session, created, sessions.len())
        };

        if created {
            TraceEvent::SessionCreated {
                user_id: user_id.to_string(),
                sessions: total,
            }
            .emit();
        }
        session
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_domain::turn::Role;
    use std::sync::Barrier;

    fn texts(turns: &[Turn]) -> Vec<String> {
        turns.iter().map(|t| t.content.clone()).collect()
    }

    #[test]
    fn trim_keeps_most_recent_in_order() {
        for max in 1..=5usize {
            for n in 0..=12usize {
                let store = SessionStore::new(max);
                let session = store.get_or_create(&UserId::from(1));
                for i in 0..n {
                    session.append_and_trim(Turn::user(format!("m{i}")));
                }
                let kept = session.snapshot();
                assert_eq!(kept.len(), n.min(max), "n={n} max={max}");
                let expected: Vec<String> =
                    (n.saturating_sub(max)..n).map(|i| format!("m{i}")).collect();
                assert_eq!(texts(&kept), expected);
            }
        }
    }

    #[test]
    fn append_reports_dropped_count() {
        let store = SessionStore::new(2);
        let session = store.get_or_create(&UserId::from("alice"));
        assert_eq!(session.append_and_trim(Turn::user("a")), 0);
        assert_eq!(session.append_and_trim(Turn::assistant("b")), 0);
        assert_eq!(session.append_and_trim(Turn::user("c")), 1);
        assert_eq!(session.len(), 2);
        assert_eq!(session.snapshot()[0].role, Role::Assistant);
    }

    #[test]
    fn zero_window_is_raised_to_one() {
        let store = SessionStore::new(0);
        assert_eq!(store.max_turns(), 1);
        let session = store.get_or_create(&UserId::from(9));
        session.append_and_trim(Turn::user("a"));
        session.append_and_trim(Turn::user("b"));
        assert_eq!(texts(&session.snapshot()), vec!["b"]);
    }

    #[test]
    fn huge_window_does_not_allocate_up_front() {
        let store = SessionStore::new(1usize << 62);
        let session = store.get_or_create(&UserId::from(1));
        session.append_and_trim(Turn::user("a"));
        session.append_and_trim(Turn::assistant("b"));
        assert_eq!(texts(&session.snapshot()), vec!["a", "b"]);
    }

    #[test]
    fn snapshot_is_independent_of_later_appends() {
        let store = SessionStore::new(10);
        let session = store.get_or_create(&UserId::from(1));
        session.append_and_trim(Turn::user("first"));
        let snap = session.snapshot();
        session.append_and_trim(Turn::assistant("second"));
        assert_eq!(snap.len(), 1);
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn get_does_not_create() {
        let store = SessionStore::new(10);
        assert!(store.get(&UserId::from(5)).is_none());
        assert!(store.is_empty());
        let created = store.get_or_create(&UserId::from(5));
        let found = store.get(&UserId::from(5)).unwrap();
        assert!(Arc::ptr_eq(&created, &found));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sessions_are_isolated_per_user() {
        let store = SessionStore::new(10);
        store
            .get_or_create(&UserId::from(1))
            .append_and_trim(Turn::user("one"));
        store
            .get_or_create(&UserId::from(2))
            .append_and_trim(Turn::user("two"));
        assert_eq!(texts(&store.get_or_create(&UserId::from(1)).snapshot()), vec!["one"]);
        assert_eq!(texts(&store.get_or_create(&UserId::from(2)).snapshot()), vec!["two"]);
    }

    #[test]
    fn concurrent_get_or_create_yields_one_session() {
        const THREADS: usize = 16;
        let store = Arc::new(SessionStore::new(10));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.get_or_create(&UserId::from(777))
                })
            })
            .collect();

        let sessions: Vec<Arc<Session>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for s in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], s));
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_snapshots_see_consistent_states() {
        const APPENDS: usize = 500;
        let store = Arc::new(SessionStore::new(10));
        let session = store.get_or_create(&UserId::from(1));

        let writer = {
            let session = session.clone();
            std::thread::spawn(move || {
                for i in 0..APPENDS {
                    session.append_and_trim(Turn::user(i.to_string()));
                }
            })
        };

        let mut last_first = 0usize;
        for _ in 0..APPENDS {
            let snap = session.snapshot();
            assert!(snap.len() <= 10);
            let ids: Vec<usize> = snap.iter().map(|t| t.content.parse().unwrap()).collect();
            // Every snapshot is a contiguous, ordered window of the appends.
            for pair in ids.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
            if let Some(&first) = ids.first() {
                assert!(first >= last_first);
                last_first = first;
                // A window only falls short of the maximum before the first trim.
                if first > 0 {
                    assert_eq!(ids.len(), 10);
                }
            }
        }

        writer.join().unwrap();
        assert_eq!(session.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_lose_nothing() {
        let store = Arc::new(SessionStore::new(1_000));
        let mut handles = Vec::new();
        for task in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let session = store.get_or_create(&UserId::from(1));
                for i in 0..50 {
                    session.append_and_trim(Turn::user(format!("{task}-{i}")));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let snap = store.get_or_create(&UserId::from(1)).snapshot();
        assert_eq!(snap.len(), 400);
        let mut unique = texts(&snap);
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 400);
    }
}
