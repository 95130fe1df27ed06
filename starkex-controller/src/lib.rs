//! starkex-controller
//!
//! A controller for a hierarchy of deterministic Stark-curve key pairs,
//! serving a fixed set of layer-2 exchange operations over a typed RPC
//! surface.
//!
//! # Architecture
//!
//! - [`store::Store`]: opaque async key/value persistence collaborator.
//! - [`accounts::AccountKeyStore`]: path-addressed key-pair cache with a
//!   lazy load-once contract, a single active key pair, and the identity
//!   assertion every mutating operation passes.
//! - [`exchange`]: unsigned-transaction assembly for the exchange
//!   contract's fixed method table; nothing here signs or submits.
//! - [`methods`]: the wire contract, request/response envelopes and typed
//!   per-operation parameter records, decoded once at the boundary.
//! - [`controller::StarkController`]: the operation handlers and the
//!   dispatcher that normalizes every failure into `{id, error}`.
//!
//! Requests flow: envelope → typed call → handler → (identity check) →
//! (key store) → signature or unsigned transaction → envelope.

pub mod accounts;
pub mod controller;
pub mod error;
pub mod exchange;
pub mod methods;
pub mod store;

pub use accounts::{AccountKeyStore, DEFAULT_ACCOUNT_MAPPING_KEY};
pub use controller::{ControllerConfig, StarkController};
pub use error::{ControllerError, StoreError};
pub use exchange::UnsignedTransaction;
pub use methods::{RequestEnvelope, ResponseEnvelope, RpcError, StarkMethod};
pub use store::{MemoryStore, Store};
