//! Cypher - Wallet Client
//!
//! Peer-to-peer value transfer over a fixed cryptographic protocol, plus the
//! wallet bookkeeping it runs on.
//!
//! # Modules
//!
//! - [`transfer`] - Protocol state machine, session store and engine
//! - [`wallet`] - Transaction records, change selection, wallet service
//! - [`vault`] - Versioned secret store interface and in-memory backend
//! - [`transport`] - Message dispatch to peers and onion probe
//! - [`crypto`] - Key pairs, password hashing, random bytes
//! - [`secret`] - Zeroizing secret wrappers
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod crypto;
pub mod logging;
pub mod secret;
pub mod transfer;
pub mod transport;
pub mod vault;
pub mod wallet;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use secret::{SecretBytes, SecretString};
pub use transfer::{
    ProtocolState, Session, SessionId, TransferEngine, TransferError, Trigger, VaultWalletAdapter,
};
pub use transport::{ChannelTransport, MessageTransport, transport_channel};
pub use vault::{InMemoryVault, SecretStore, VaultAuth};
pub use wallet::{TransactionChange, TransactionKind, TransactionRecord, WalletService};
