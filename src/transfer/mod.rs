//! Transfer Protocol
//!
//! Drives one peer-to-peer value transfer through a fixed sequence of
//! cryptographic steps. Sessions live in memory; each is locked for the
//! duration of a run, so runs on one session never overlap while different
//! sessions proceed independently.
//!
//! # State Machine
//!
//! ```text
//! NEW → AUDITED → KEYS → BURNED → COMMITTED → PUBLIC_KEY_AGREE
//!     → REDEMPTION_KEY → PAYMENT → COMPLETED
//!
//! Verify from any state after NEW → AUDITED
//! ```
//!
//! # Invariants
//!
//! 1. **Commit after success**: a state is entered only once its entry action succeeded
//! 2. **No silent repeats**: burn and dispatch steps are skipped when their artifact
//!    exists, unless re-fired through the state's own self-loop
//! 3. **Caller retries**: the engine never retries on its own; fire `Verify` again

pub mod adapters;
pub mod engine;
pub mod error;
pub mod janitor;
pub mod machine;
pub mod session;
pub mod state;
pub mod types;


pub use adapters::{AdapterError, VaultWalletAdapter, WalletAdapter};
pub use engine::TransferEngine;
pub use error::TransferError;
pub use janitor::{JanitorConfig, SessionJanitor};
pub use machine::{EdgeKind, Transition, TransitionTable};
pub use session::SessionRecord;
pub use state::{ProtocolState, Trigger};
pub use types::{BurnReceipt, PaymentAgreement, PublicKeyAgreement, RedemptionKey, Session, SessionId};
