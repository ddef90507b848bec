//! Transition Table
//!
//! Explicit `(state, trigger) -> next state` pairs. `Verify` is legal from
//! every state after NEW and always lands on AUDITED; that rule is written out
//! per state rather than inherited.
//!
//! ```text
//! NEW ─Verify→ AUDITED ─Unlock→ KEYS ─Torch→ BURNED ─Commit→ COMMITTED
//!     ─PublicKeyAgreement→ PUBLIC_KEY_AGREE ─PrepareRedemptionKey→ REDEMPTION_KEY
//!     ─PaymentAgreement→ PAYMENT ─Complete→ COMPLETED
//!
//! every state except NEW ─Verify→ AUDITED
//! self-loops: AUDITED/Verify, KEYS/Unlock, BURNED/Torch
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use once_cell::sync::Lazy;

use super::state::{ProtocolState, Trigger};

/// How a transition relates to the protocol sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// NEW -> AUDITED, only taken by a transfer run
    Start,
    /// Next step of the protocol
    Forward,
    /// Self-loop: re-run the current state's entry action only
    Reentry,
    /// Back to AUDITED from a later state
    Reverify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ProtocolState,
    pub trigger: Trigger,
    pub to: ProtocolState,
    pub kind: EdgeKind,
}

pub struct TransitionTable {
    edges: HashMap<(ProtocolState, Trigger), Transition>,
    /// Insertion order, used for rendering
    order: Vec<(ProtocolState, Trigger)>,
}

static PROTOCOL: Lazy<TransitionTable> = Lazy::new(TransitionTable::protocol);

impl TransitionTable {
    /// Shared protocol table
    pub fn shared() -> &'static TransitionTable {
        &PROTOCOL
    }

    fn protocol() -> Self {
        use super::state::ProtocolState::*;

        let mut table = Self::empty();
        table.add(New, Trigger::Verify, Audited, EdgeKind::Start);

        table.add(Audited, Trigger::Verify, Audited, EdgeKind::Reentry);
        table.add(Audited, Trigger::Unlock, Keys, EdgeKind::Forward);

        table.add(Keys, Trigger::Unlock, Keys, EdgeKind::Reentry);
        table.add(Keys, Trigger::Torch, Burned, EdgeKind::Forward);

        table.add(Burned, Trigger::Torch, Burned, EdgeKind::Reentry);
        table.add(Burned, Trigger::Commit, Committed, EdgeKind::Forward);

        table.add(Committed, Trigger::PublicKeyAgreement, PublicKeyAgree, EdgeKind::Forward);
        table.add(PublicKeyAgree, Trigger::PrepareRedemptionKey, RedemptionKey, EdgeKind::Forward);
        table.add(RedemptionKey, Trigger::PaymentAgreement, Payment, EdgeKind::Forward);
        table.add(Payment, Trigger::Complete, Completed, EdgeKind::Forward);

        for state in [
            Keys,
            Burned,
            Committed,
            PublicKeyAgree,
            RedemptionKey,
            Payment,
            Completed,
        ] {
            table.add(state, Trigger::Verify, Audited, EdgeKind::Reverify);
        }

        table
    }

    fn empty() -> Self {
        Self {
            edges: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn add(&mut self, from: ProtocolState, trigger: Trigger, to: ProtocolState, kind: EdgeKind) {
        let key = (from, trigger);
        if !self.edges.contains_key(&key) {
            self.order.push(key);
        }
        self.edges.insert(
            key,
            Transition {
                from,
                trigger,
                to,
                kind,
            },
        );
    }

    pub fn resolve(&self, from: ProtocolState, trigger: Trigger) -> Option<Transition> {
        self.edges.get(&(from, trigger)).copied()
    }

    /// The step that moves `state` forward, if any
    pub fn forward(&self, state: ProtocolState) -> Option<Transition> {
        self.order
            .iter()
            .filter_map(|key| self.edges.get(key))
            .find(|t| t.from == state && matches!(t.kind, EdgeKind::Start | EdgeKind::Forward))
            .copied()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.order.iter().filter_map(|key| self.edges.get(key))
    }

    /// Check the table is complete and consistent
    pub fn validate(&self) -> Result<(), String> {
        for state in ProtocolState::ALL {
            let verify = self.resolve(state, Trigger::Verify);
            match verify {
                Some(t) if t.to == ProtocolState::Audited => {}
                _ => return Err(format!("{} has no Verify edge to AUDITED", state)),
            }

            let forward: Vec<_> = self
                .transitions()
                .filter(|t| t.from == state && matches!(t.kind, EdgeKind::Start | EdgeKind::Forward))
                .collect();
            match (state.is_terminal(), forward.len()) {
                (true, 0) | (false, 1) => {}
                (true, _) => return Err(format!("terminal state {} has a forward edge", state)),
                (false, n) => return Err(format!("{} has {} forward edges", state, n)),
            }
        }

        for t in self.transitions() {
            let ok = match t.kind {
                EdgeKind::Start => t.from == ProtocolState::New,
                EdgeKind::Reentry => t.from == t.to,
                EdgeKind::Reverify => t.to == ProtocolState::Audited && t.from != ProtocolState::New,
                EdgeKind::Forward => t.from != t.to && t.from != ProtocolState::New,
            };
            if !ok {
                return Err(format!("{} --{}--> {} is not a valid {:?} edge", t.from, t.trigger, t.to, t.kind));
            }
        }

        let mut reached = HashSet::new();
        let mut cursor = Some(ProtocolState::New);
        while let Some(state) = cursor {
            if !reached.insert(state) {
                return Err(format!("forward path loops at {}", state));
            }
            cursor = self.forward(state).map(|t| t.to);
        }
        if let Some(missing) = ProtocolState::ALL.iter().find(|s| !reached.contains(s)) {
            return Err(format!("{} is not on the forward path", missing));
        }

        Ok(())
    }

    /// Graphviz rendering
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph transfer {\n    rankdir=LR;\n");
        for t in self.transitions() {
            let style = match t.kind {
                EdgeKind::Start | EdgeKind::Forward => "solid",
                EdgeKind::Reentry => "bold",
                EdgeKind::Reverify => "dashed",
            };
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\" [label=\"{}\", style={}];",
                t.from, t.to, t.trigger, style
            );
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::state::ProtocolState::*;

    #[test]
    fn test_protocol_table_is_valid() {
        TransitionTable::shared().validate().unwrap();
    }

    #[test]
    fn test_forward_path() {
        let table = TransitionTable::shared();
        let mut path = vec![New];
        let mut state = New;
        while let Some(t) = table.forward(state) {
            state = t.to;
            path.push(state);
        }
        assert_eq!(
            path,
            vec![
                New,
                Audited,
                Keys,
                Burned,
                Committed,
                PublicKeyAgree,
                RedemptionKey,
                Payment,
                Completed
            ]
        );
    }

    #[test]
    fn test_verify_lands_on_audited() {
        let table = TransitionTable::shared();
        for state in ProtocolState::ALL {
            let t = table.resolve(state, Trigger::Verify).unwrap();
            assert_eq!(t.to, Audited);
        }
        assert_eq!(table.resolve(New, Trigger::Verify).unwrap().kind, EdgeKind::Start);
        assert_eq!(table.resolve(Audited, Trigger::Verify).unwrap().kind, EdgeKind::Reentry);
        assert_eq!(table.resolve(Completed, Trigger::Verify).unwrap().kind, EdgeKind::Reverify);
    }

    #[test]
    fn test_self_loops() {
        let table = TransitionTable::shared();
        assert_eq!(table.resolve(Keys, Trigger::Unlock).unwrap().to, Keys);
        assert_eq!(table.resolve(Burned, Trigger::Torch).unwrap().to, Burned);
    }

    #[test]
    fn test_unlisted_pairs_rejected() {
        let table = TransitionTable::shared();
        assert!(table.resolve(New, Trigger::Torch).is_none());
        assert!(table.resolve(Audited, Trigger::Commit).is_none());
        assert!(table.resolve(Committed, Trigger::Torch).is_none());
        assert!(table.resolve(Completed, Trigger::Complete).is_none());
    }

    #[test]
    fn test_validate_catches_missing_verify() {
        let mut table = TransitionTable::protocol();
        table.edges.remove(&(Payment, Trigger::Verify));
        let err = table.validate().unwrap_err();
        assert!(err.contains("PAYMENT"));
    }

    #[test]
    fn test_validate_catches_broken_chain() {
        let mut table = TransitionTable::protocol();
        table.edges.remove(&(RedemptionKey, Trigger::PaymentAgreement));
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_dot_output() {
        let dot = TransitionTable::shared().to_dot();
        assert!(dot.starts_with("digraph transfer {"));
        assert!(dot.contains("\"KEYS\" -> \"BURNED\" [label=\"TORCH\", style=solid];"));
        assert!(dot.contains("\"COMPLETED\" -> \"AUDITED\" [label=\"VERIFY\", style=dashed];"));
    }
}
