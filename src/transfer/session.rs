//! Session Store
//!
//! One record per session id. Each record sits behind its own async mutex so
//! protocol runs for one id are totally ordered while different ids proceed
//! in parallel. The current state is mirrored in an atomic so queries never
//! wait on an in-flight run.
//!
//! Eviction marks a record as evicted while holding its lock. A caller that
//! picked up the handle before eviction sees the mark once it gets the lock
//! and must open the session again.

use std::sync::Arc;
use std::sync::atomic::{AtomicI16, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::state::ProtocolState;
use super::types::{
    BurnReceipt, PaymentAgreement, PublicKeyAgreement, RedemptionKey, Session, SessionId,
};
use crate::secret::SecretBytes;
use crate::transport::DispatchAck;

/// Mutable state of one in-flight transfer
#[derive(Debug)]
pub struct SessionRecord {
    pub session: Session,
    pub state: ProtocolState,
    pub spend_key: Option<SecretBytes>,
    pub burn: Option<BurnReceipt>,
    pub commit_receipt: Option<DispatchAck>,
    pub public_key_agreement: Option<PublicKeyAgreement>,
    pub redemption_key: Option<RedemptionKey>,
    pub payment: Option<PaymentAgreement>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Removed from the store; no longer reachable by id
    pub evicted: bool,
}

impl SessionRecord {
    pub fn new(session: Session) -> Self {
        let now = Utc::now();
        Self {
            session,
            state: ProtocolState::New,
            spend_key: None,
            burn: None,
            commit_receipt: None,
            public_key_agreement: None,
            redemption_key: None,
            payment: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            evicted: false,
        }
    }
}

pub struct SessionHandle {
    state: AtomicI16,
    record: Arc<Mutex<SessionRecord>>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            state: AtomicI16::new(ProtocolState::New.id()),
            record: Arc::new(Mutex::new(SessionRecord::new(session))),
        }
    }

    /// Current state without waiting for the record lock
    pub fn state(&self) -> ProtocolState {
        ProtocolState::from_id(self.state.load(Ordering::Acquire)).unwrap_or(ProtocolState::New)
    }

    /// Exclusive access for one protocol run
    pub async fn lock(&self) -> OwnedMutexGuard<SessionRecord> {
        self.record.clone().lock_owned().await
    }

    /// Record that `state` has been entered
    pub fn enter(&self, record: &mut SessionRecord, state: ProtocolState) {
        record.state = state;
        record.updated_at = Utc::now();
        if state.is_terminal() && record.completed_at.is_none() {
            record.completed_at = Some(record.updated_at);
        }
        self.state.store(state.id(), Ordering::Release);
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `session.session_id`, creating a NEW record if absent
    ///
    /// Returns `true` when the record was created by this call.
    pub fn open(&self, session: Session) -> (Arc<SessionHandle>, bool) {
        let id = session.session_id;
        let mut created = false;
        let handle = self
            .sessions
            .entry(id)
            .or_insert_with(|| {
                created = true;
                Arc::new(SessionHandle::new(session))
            })
            .clone();
        (handle, created)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(&id).map(|h| h.clone())
    }

    pub fn state(&self, id: SessionId) -> Option<ProtocolState> {
        self.sessions.get(&id).map(|h| h.state())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop COMPLETED sessions finished more than `retention` ago
    ///
    /// Sessions whose lock is held by a running transfer are skipped. The
    /// evicted mark is set under the record lock, inside the same map
    /// operation that removes the entry.
    pub fn evict_completed(&self, retention: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|keep| Utc::now().checked_sub_signed(keep))
        else {
            return 0;
        };

        let candidates: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().state().is_terminal())
            .map(|entry| *entry.key())
            .collect();

        candidates
            .into_iter()
            .filter(|id| {
                self.sessions
                    .remove_if(id, |_, handle| {
                        let Ok(mut record) = handle.record.try_lock() else {
                            return false;
                        };
                        let expired = record.state.is_terminal()
                            && record.completed_at.is_some_and(|at| at <= cutoff);
                        if expired {
                            record.evicted = true;
                        }
                        expired
                    })
                    .is_some()
            })
            .count()
    }
}
