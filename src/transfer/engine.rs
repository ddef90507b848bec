//! Transfer Engine
//!
//! Drives a session through the protocol table. Each arrival runs the target
//! state's entry action, and the state is committed only once that action
//! succeeds. `transfer()` keeps firing forward triggers until COMPLETED or
//! the first failure.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use super::adapters::WalletAdapter;
use super::error::TransferError;
use super::machine::{EdgeKind, Transition, TransitionTable};
use super::session::{SessionHandle, SessionRecord, SessionStore};
use super::state::{ProtocolState, Trigger};
use super::types::{PaymentAgreement, PublicKeyAgreement, RedemptionKey, Session, SessionId};
use crate::crypto;
use crate::logging::PROTOCOL_TARGET;
use crate::transport::{
    DispatchAck, MessageEnvelope, MessageKind, MessageTransport, TransportError,
};

const REDEMPTION_KEY_BYTES: usize = 32;

pub struct TransferEngine {
    wallet: Arc<dyn WalletAdapter>,
    transport: Arc<dyn MessageTransport>,
    table: &'static TransitionTable,
    sessions: SessionStore,
}

impl TransferEngine {
    /// Create an engine; fails if the transition table is inconsistent
    pub fn new(
        wallet: Arc<dyn WalletAdapter>,
        transport: Arc<dyn MessageTransport>,
    ) -> Result<Self, TransferError> {
        let table = TransitionTable::shared();
        table
            .validate()
            .map_err(TransferError::InvalidTransitionTable)?;

        info!(wallet = wallet.name(), "Transfer engine ready");
        Ok(Self {
            wallet,
            transport,
            table,
            sessions: SessionStore::new(),
        })
    }

    /// Register a session in NEW without running anything
    pub fn open_session(&self, session: Session) -> Result<SessionId, TransferError> {
        validate(&session)?;
        let id = session.session_id;
        let (_, created) = self.sessions.open(session);
        if created {
            debug!(session_id = %id, "Session opened");
        }
        Ok(id)
    }

    /// Run the protocol for `session` as far as it will go
    ///
    /// A NEW session starts with `Verify`; any other session is re-verified
    /// and then driven forward. Steps already done are not repeated.
    pub async fn transfer(&self, session: Session) -> Result<ProtocolState, TransferError> {
        validate(&session)?;
        let id = session.session_id;
        let (handle, created, mut record) = loop {
            let (handle, created) = self.sessions.open(session.clone());
            let record = handle.lock().await;
            if !record.evicted {
                break (handle, created, record);
            }
            debug!(session_id = %id, "Session evicted while waiting, reopening");
        };

        if !created && record.state == ProtocolState::New {
            record.session = session;
        }

        let start = self
            .table
            .resolve(record.state, Trigger::Verify)
            .ok_or(TransferError::InvalidTransition {
                state: record.state,
                trigger: Trigger::Verify,
            })?;
        self.apply(&handle, &mut record, start).await?;

        while let Some(next) = self.table.forward(record.state) {
            self.apply(&handle, &mut record, next).await?;
        }

        info!(session_id = %id, state = %record.state, "Transfer finished");
        Ok(record.state)
    }

    /// Fire one trigger and run the resulting state's entry action
    ///
    /// Does not chain into later states. `Verify` on a NEW session is
    /// rejected; sessions start through [`TransferEngine::transfer`].
    pub async fn fire(
        &self,
        id: SessionId,
        trigger: Trigger,
    ) -> Result<ProtocolState, TransferError> {
        let handle = self
            .sessions
            .get(id)
            .ok_or(TransferError::SessionNotFound(id))?;
        let mut record = handle.lock().await;
        if record.evicted {
            return Err(TransferError::SessionNotFound(id));
        }

        let transition = self
            .table
            .resolve(record.state, trigger)
            .filter(|t| t.kind != EdgeKind::Start)
            .ok_or(TransferError::InvalidTransition {
                state: record.state,
                trigger,
            })?;
        self.apply(&handle, &mut record, transition).await?;
        Ok(record.state)
    }

    /// Last successfully entered state
    pub fn current_state(&self, id: SessionId) -> Result<ProtocolState, TransferError> {
        self.sessions
            .state(id)
            .ok_or(TransferError::SessionNotFound(id))
    }

    /// Read a session record; waits for any run in progress on it
    pub async fn inspect<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&SessionRecord) -> R,
    ) -> Result<R, TransferError> {
        let handle = self
            .sessions
            .get(id)
            .ok_or(TransferError::SessionNotFound(id))?;
        let record = handle.lock().await;
        if record.evicted {
            return Err(TransferError::SessionNotFound(id));
        }
        Ok(f(&record))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn evict_completed(&self, retention: Duration) -> usize {
        self.sessions.evict_completed(retention)
    }

    /// Graphviz rendering of the transition table
    pub fn graph(&self) -> String {
        self.table.to_dot()
    }

    async fn apply(
        &self,
        handle: &SessionHandle,
        record: &mut SessionRecord,
        transition: Transition,
    ) -> Result<(), TransferError> {
        let id = record.session.session_id;
        debug!(
            target: PROTOCOL_TARGET,
            session_id = %id,
            from = %transition.from,
            trigger = %transition.trigger,
            to = %transition.to,
            "Firing"
        );

        let rerun = transition.kind == EdgeKind::Reentry;
        if let Err(e) = self.enter(record, transition.to, rerun).await {
            warn!(
                session_id = %id,
                state = %record.state,
                burned = record.state.is_irreversible(),
                code = e.code(),
                error = %e,
                "Entry action failed"
            );
            return Err(e);
        }

        handle.enter(record, transition.to);
        info!(
            target: PROTOCOL_TARGET,
            session_id = %id,
            state = %transition.to,
            trigger = %transition.trigger,
            "Entered"
        );
        Ok(())
    }

    /// Entry action for `state`
    ///
    /// Irreversible steps whose artifact already exists are skipped unless
    /// the arrival is that state's own self-loop.
    async fn enter(
        &self,
        record: &mut SessionRecord,
        state: ProtocolState,
        rerun: bool,
    ) -> Result<(), TransferError> {
        match state {
            ProtocolState::New | ProtocolState::Completed => Ok(()),
            ProtocolState::Audited => self.audit(record, state).await,
            ProtocolState::Keys => self.unlock(record, state).await,
            ProtocolState::Burned if rerun || record.burn.is_none() => {
                self.burn(record, state).await
            }
            ProtocolState::Committed if rerun || record.commit_receipt.is_none() => {
                self.commit_receiver(record, state).await
            }
            ProtocolState::PublicKeyAgree if rerun || record.public_key_agreement.is_none() => {
                self.agree_public_key(record, state).await
            }
            ProtocolState::RedemptionKey if rerun || record.redemption_key.is_none() => {
                self.prepare_redemption_key(record, state).await
            }
            ProtocolState::Payment if rerun || record.payment.is_none() => {
                record.payment = Some(PaymentAgreement {
                    amount: record.session.amount,
                    agreed_at: Utc::now(),
                });
                Ok(())
            }
            _ => {
                debug!(session_id = %record.session.session_id, state = %state, "Step already done");
                Ok(())
            }
        }
    }

    async fn audit(
        &self,
        record: &mut SessionRecord,
        state: ProtocolState,
    ) -> Result<(), TransferError> {
        let session = &record.session;
        let sufficient = self
            .wallet
            .check_sufficient_funds(session.session_id, session.amount, &session.sender)
            .await
            .map_err(|e| TransferError::InsufficientFunds {
                state,
                required: session.amount,
                cause: e.to_string(),
            })?;

        if !sufficient {
            return Err(TransferError::InsufficientFunds {
                state,
                required: session.amount,
                cause: "available balance is lower".into(),
            });
        }
        Ok(())
    }

    async fn unlock(
        &self,
        record: &mut SessionRecord,
        state: ProtocolState,
    ) -> Result<(), TransferError> {
        let key = self
            .wallet
            .unlock_spend_key(&record.session.sender)
            .await
            .map_err(|e| TransferError::KeyUnlockFailure {
                state,
                cause: e.to_string(),
            })?;
        record.spend_key = Some(key);
        Ok(())
    }

    async fn burn(
        &self,
        record: &mut SessionRecord,
        state: ProtocolState,
    ) -> Result<(), TransferError> {
        let session = &record.session;
        let receipt = self
            .wallet
            .burn(session.session_id, session.amount, &session.sender)
            .await
            .map_err(|e| TransferError::BurnFailure {
                state,
                cause: e.to_string(),
            })?;
        record.burn = Some(receipt);
        Ok(())
    }

    async fn commit_receiver(
        &self,
        record: &mut SessionRecord,
        state: ProtocolState,
    ) -> Result<(), TransferError> {
        let body = json!({
            "session": record.session.session_id.to_string(),
            "amount": record.session.amount.to_string(),
            "burn": record.burn.as_ref().map(|b| b.hash.clone()),
        });
        let ack = self
            .dispatch(record, state, MessageKind::ReceiverCommit, body)
            .await?;
        record.commit_receipt = Some(ack);
        Ok(())
    }

    async fn agree_public_key(
        &self,
        record: &mut SessionRecord,
        state: ProtocolState,
    ) -> Result<(), TransferError> {
        let keys = crypto::key_pair();
        let body = json!({
            "session": record.session.session_id.to_string(),
            "publicKey": keys.public_key,
        });
        let ack = self
            .dispatch(record, state, MessageKind::PublicKeyAgreement, body)
            .await?;
        record.public_key_agreement = Some(PublicKeyAgreement {
            public_key: keys.public_key,
            secret_key: keys.secret_key,
            ack,
        });
        Ok(())
    }

    async fn prepare_redemption_key(
        &self,
        record: &mut SessionRecord,
        state: ProtocolState,
    ) -> Result<(), TransferError> {
        let key = crypto::random_bytes(REDEMPTION_KEY_BYTES);
        let body = key.expose(|k| {
            json!({
                "session": record.session.session_id.to_string(),
                "redemptionKey": STANDARD.encode(k),
            })
        });
        let ack = self
            .dispatch(record, state, MessageKind::RedemptionKey, body)
            .await?;
        record.redemption_key = Some(RedemptionKey { key, ack });
        Ok(())
    }

    async fn dispatch(
        &self,
        record: &SessionRecord,
        state: ProtocolState,
        kind: MessageKind,
        body: serde_json::Value,
    ) -> Result<DispatchAck, TransferError> {
        let session = &record.session;
        let failure = |e: TransportError| TransferError::DispatchFailure {
            state,
            message: kind,
            cause: e.to_string(),
        };

        if !self.transport.is_reachable().await {
            return Err(failure(TransportError::Unreachable));
        }

        let envelope = MessageEnvelope::new(kind, &session.receiver_public_key, body.to_string());
        let ack = self.transport.dispatch(envelope).await.map_err(failure)?;
        debug!(
            session_id = %session.session_id,
            message = %kind,
            transaction_id = %ack.transaction_id,
            "Dispatched"
        );

        // The message is out; a tracking failure must not fail the step
        if let Err(e) = self
            .wallet
            .record_dispatch(&session.sender, &session.receiver_public_key)
            .await
        {
            warn!(
                session_id = %session.session_id,
                message = %kind,
                error = %e,
                "Message tracking update failed"
            );
        }

        Ok(ack)
    }
}

fn validate(session: &Session) -> Result<(), TransferError> {
    if session.amount <= rust_decimal::Decimal::ZERO {
        return Err(TransferError::InvalidAmount);
    }
    if session.receiver_public_key.trim().is_empty() {
        return Err(TransferError::MissingReceiver);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SecretString;
    use crate::transfer::adapters::mock::{MockTransport, MockWallet};
    use crate::vault::VaultAuth;
    use rust_decimal::Decimal;

    fn setup() -> (Arc<TransferEngine>, Arc<MockWallet>, Arc<MockTransport>) {
        let wallet = Arc::new(MockWallet::new());
        let transport = Arc::new(MockTransport::new());
        let engine = TransferEngine::new(wallet.clone(), transport.clone()).unwrap();
        (Arc::new(engine), wallet, transport)
    }

    fn session(amount: i64) -> Session {
        Session::new(
            Decimal::from(amount),
            VaultAuth::new(SecretString::new("id_sender"), SecretString::new("pass")),
            "ab".repeat(32),
        )
    }

    /// Fire forward triggers one at a time until `target`
    async fn advance_to(engine: &TransferEngine, id: SessionId, target: ProtocolState) {
        let table = TransitionTable::shared();
        while engine.current_state(id).unwrap() != target {
            let next = table.forward(engine.current_state(id).unwrap()).unwrap();
            engine.fire(id, next.trigger).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_new_then_completed() {
        let (engine, wallet, transport) = setup();
        let s = session(25);
        let id = engine.open_session(s.clone()).unwrap();
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::New);

        let state = engine.transfer(s).await.unwrap();
        assert_eq!(state, ProtocolState::Completed);
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Completed);

        assert_eq!(wallet.funds_checks(), 1);
        assert_eq!(wallet.unlocks(), 1);
        assert_eq!(wallet.burns(), 1);
        assert_eq!(wallet.dispatch_records(), 3);
        assert_eq!(transport.count(MessageKind::ReceiverCommit), 1);
        assert_eq!(transport.count(MessageKind::PublicKeyAgreement), 1);
        assert_eq!(transport.count(MessageKind::RedemptionKey), 1);
    }

    #[tokio::test]
    async fn test_artifacts_recorded() {
        let (engine, _, transport) = setup();
        let s = session(40);
        let id = s.session_id;
        engine.transfer(s.clone()).await.unwrap();

        let (has_key, burn, payment, completed) = engine
            .inspect(id, |r| {
                (
                    r.spend_key.is_some(),
                    r.burn.clone(),
                    r.payment.clone(),
                    r.completed_at.is_some(),
                )
            })
            .await
            .unwrap();
        assert!(has_key);
        assert_eq!(burn.unwrap().hash, format!("burn-{}", id));
        assert_eq!(payment.unwrap().amount, Decimal::from(40));
        assert!(completed);

        let envelopes = transport.envelopes();
        assert_eq!(envelopes.len(), 3);
        assert!(envelopes.iter().all(|e| e.address == s.receiver_public_key));
        let body: serde_json::Value = serde_json::from_str(&envelopes[0].body).unwrap();
        assert_eq!(body["amount"], "40");
    }

    #[tokio::test]
    async fn test_verify_from_new_rejected() {
        let (engine, wallet, _) = setup();
        let id = engine.open_session(session(5)).unwrap();

        let err = engine.fire(id, Trigger::Verify).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::InvalidTransition {
                state: ProtocolState::New,
                trigger: Trigger::Verify
            }
        ));
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::New);
        assert_eq!(wallet.funds_checks(), 0);
    }

    #[tokio::test]
    async fn test_verify_from_every_later_state() {
        let (engine, wallet, transport) = setup();
        let s = session(30);
        let id = s.session_id;

        wallet.set_fail_unlock(true);
        assert!(engine.transfer(s).await.is_err());
        wallet.set_fail_unlock(false);
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Audited);

        for target in &ProtocolState::ALL[1..] {
            advance_to(&engine, id, *target).await;
            let checks = wallet.funds_checks();

            let state = engine.fire(id, Trigger::Verify).await.unwrap();
            assert_eq!(state, ProtocolState::Audited);
            assert_eq!(wallet.funds_checks(), checks + 1);
        }

        advance_to(&engine, id, ProtocolState::Completed).await;
        assert_eq!(wallet.burns(), 1);
        assert_eq!(transport.count(MessageKind::ReceiverCommit), 1);
        assert_eq!(transport.count(MessageKind::PublicKeyAgreement), 1);
        assert_eq!(transport.count(MessageKind::RedemptionKey), 1);
    }

    #[tokio::test]
    async fn test_torch_reentry_reburns_only() {
        let (engine, wallet, transport) = setup();
        let s = session(12);
        let id = s.session_id;

        transport.set_fail_dispatch(Some(MessageKind::ReceiverCommit));
        let err = engine.transfer(s.clone()).await.unwrap_err();
        assert_eq!(err.state(), Some(ProtocolState::Committed));
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Burned);

        let (checks, unlocks, commits) = (
            wallet.funds_checks(),
            wallet.unlocks(),
            transport.count(MessageKind::ReceiverCommit),
        );
        let state = engine.fire(id, Trigger::Torch).await.unwrap();
        assert_eq!(state, ProtocolState::Burned);
        assert_eq!(wallet.burns(), 2);
        assert_eq!(wallet.funds_checks(), checks);
        assert_eq!(wallet.unlocks(), unlocks);
        assert_eq!(transport.count(MessageKind::ReceiverCommit), commits);

        transport.set_fail_dispatch(None);
        assert_eq!(engine.transfer(s).await.unwrap(), ProtocolState::Completed);
        assert_eq!(wallet.burns(), 2);
    }

    #[tokio::test]
    async fn test_unlock_reentry() {
        let (engine, wallet, _) = setup();
        let s = session(12);
        let id = s.session_id;

        wallet.set_fail_burn(true);
        assert!(matches!(
            engine.transfer(s).await,
            Err(TransferError::BurnFailure { state: ProtocolState::Burned, .. })
        ));
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Keys);

        engine.fire(id, Trigger::Unlock).await.unwrap();
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Keys);
        assert_eq!(wallet.unlocks(), 2);
        assert_eq!(wallet.burns(), 1);
        assert_eq!(wallet.funds_checks(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_keeps_new() {
        let (engine, wallet, _) = setup();
        let s = session(1000);
        let id = s.session_id;

        wallet.set_fail_funds(true);
        let err = engine.transfer(s.clone()).await.unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(err.state(), Some(ProtocolState::Audited));
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::New);
        assert_eq!(wallet.unlocks(), 0);

        wallet.set_fail_funds(false);
        assert_eq!(engine.transfer(s).await.unwrap(), ProtocolState::Completed);
    }

    #[tokio::test]
    async fn test_dispatch_failure_then_retry() {
        let (engine, wallet, transport) = setup();
        let s = session(8);
        let id = s.session_id;

        transport.set_fail_dispatch(Some(MessageKind::PublicKeyAgreement));
        let err = engine.transfer(s.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::DispatchFailure {
                state: ProtocolState::PublicKeyAgree,
                message: MessageKind::PublicKeyAgreement,
                ..
            }
        ));
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Committed);

        transport.set_fail_dispatch(None);
        engine.fire(id, Trigger::Verify).await.unwrap();
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Audited);
        assert_eq!(engine.transfer(s).await.unwrap(), ProtocolState::Completed);

        assert_eq!(wallet.burns(), 1);
        assert_eq!(transport.count(MessageKind::ReceiverCommit), 1);
        assert_eq!(transport.count(MessageKind::PublicKeyAgreement), 2);
    }

    #[tokio::test]
    async fn test_unreachable_transport() {
        let (engine, _, transport) = setup();
        let s = session(8);
        let id = s.session_id;

        transport.set_unreachable(true);
        let err = engine.transfer(s).await.unwrap_err();
        assert!(err.to_string().contains("Transport unreachable"));
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Burned);
        assert_eq!(transport.count(MessageKind::ReceiverCommit), 0);
    }

    #[tokio::test]
    async fn test_tracking_failure_does_not_fail_step() {
        let (engine, wallet, _) = setup();
        wallet.set_fail_record(true);
        assert_eq!(engine.transfer(session(3)).await.unwrap(), ProtocolState::Completed);
        assert_eq!(wallet.dispatch_records(), 3);
    }

    #[tokio::test]
    async fn test_reverify_completed_session() {
        let (engine, wallet, transport) = setup();
        let s = session(9);
        let id = s.session_id;
        engine.transfer(s.clone()).await.unwrap();

        assert_eq!(engine.fire(id, Trigger::Verify).await.unwrap(), ProtocolState::Audited);
        assert_eq!(engine.transfer(s).await.unwrap(), ProtocolState::Completed);

        assert_eq!(wallet.funds_checks(), 3);
        assert_eq!(wallet.unlocks(), 2);
        assert_eq!(wallet.burns(), 1);
        assert_eq!(transport.count(MessageKind::RedemptionKey), 1);
    }

    #[tokio::test]
    async fn test_invalid_sessions() {
        let (engine, _, _) = setup();
        assert!(matches!(
            engine.transfer(session(0)).await,
            Err(TransferError::InvalidAmount)
        ));
        assert!(matches!(
            engine.transfer(session(-5)).await,
            Err(TransferError::InvalidAmount)
        ));

        let mut s = session(5);
        s.receiver_public_key = "  ".into();
        assert!(matches!(
            engine.open_session(s),
            Err(TransferError::MissingReceiver)
        ));
        assert_eq!(engine.session_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (engine, _, _) = setup();
        let id = SessionId::new();
        assert!(matches!(
            engine.current_state(id),
            Err(TransferError::SessionNotFound(_))
        ));
        let err = engine.fire(id, Trigger::Verify).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_invalid_trigger_for_state() {
        let (engine, _, _) = setup();
        let s = session(4);
        let id = s.session_id;
        engine.transfer(s).await.unwrap();

        let err = engine.fire(id, Trigger::Torch).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Completed);
    }

    #[tokio::test]
    async fn test_distinct_sessions_independent() {
        let (engine, wallet, _) = setup();
        let gate = wallet.gate_amount(Decimal::from(13));

        let blocked = session(13);
        let blocked_id = blocked.session_id;
        let task = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.transfer(blocked).await })
        };

        while wallet.funds_checks() == 0 {
            tokio::task::yield_now().await;
        }

        let free = session(10);
        let free_id = free.session_id;
        assert_eq!(engine.transfer(free).await.unwrap(), ProtocolState::Completed);
        assert_eq!(engine.current_state(free_id).unwrap(), ProtocolState::Completed);
        assert_eq!(engine.current_state(blocked_id).unwrap(), ProtocolState::New);

        gate.notify_one();
        assert_eq!(task.await.unwrap().unwrap(), ProtocolState::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_session_serialized() {
        let (engine, wallet, transport) = setup();
        wallet.set_check_delay(Duration::from_millis(20));
        let s = session(6);

        let runs: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let s = s.clone();
                tokio::spawn(async move { engine.transfer(s).await })
            })
            .collect();
        for run in futures::future::join_all(runs).await {
            assert_eq!(run.unwrap().unwrap(), ProtocolState::Completed);
        }

        assert_eq!(wallet.funds_checks(), 4);
        assert_eq!(wallet.max_in_flight(), 1);
        assert_eq!(wallet.burns(), 1);
        assert_eq!(transport.count(MessageKind::ReceiverCommit), 1);
    }

    #[tokio::test]
    async fn test_evicted_handle_reopened() {
        let (engine, wallet, _) = setup();
        let s = session(8);
        let id = s.session_id;
        engine.transfer(s.clone()).await.unwrap();

        // handle picked up by a run that has not locked it yet
        let stale = engine.sessions.get(id).unwrap();
        assert_eq!(engine.evict_completed(Duration::ZERO), 1);
        assert!(stale.lock().await.evicted);
        assert!(matches!(
            engine.fire(id, Trigger::Verify).await,
            Err(TransferError::SessionNotFound(_))
        ));

        assert_eq!(engine.transfer(s).await.unwrap(), ProtocolState::Completed);
        assert_eq!(engine.current_state(id).unwrap(), ProtocolState::Completed);
        assert_eq!(engine.session_count(), 1);
        assert!(!engine.inspect(id, |r| r.evicted).await.unwrap());
        assert_eq!(wallet.funds_checks(), 2);
    }

    #[test]
    fn test_graph() {
        let (engine, _, _) = setup();
        let dot = engine.graph();
        assert!(dot.contains("\"NEW\" -> \"AUDITED\""));
    }
}
