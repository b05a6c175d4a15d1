//! Transaction plumbing for action call trees.
//!
//! One physical transaction is opened per call tree. The outermost action
//! begins it on a [`TransactionEngine`], nested actions join it, and the
//! outermost action commits or rolls it back before dispatching terminal
//! hooks to every participant.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TransactionScope                         │
//! │  (open transaction, participants, restricted phase)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ Transaction │       │ Isolation   │       │   Phase     │
//!  │   Engine    │       │   Level     │       │   Guard     │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use txn_actions::transaction::{RecordingEngine, TransactionScope};
//!
//! let engine = Arc::new(RecordingEngine::new());
//! let mut scope = TransactionScope::new(engine.clone());
//!
//! CreateOrder::new(user).call(&mut scope)?;
//! assert_eq!(engine.commit_count(), 1);
//! ```

mod engine;
mod error;
mod isolation;
mod scope;

pub use engine::{EngineEvent, RecordingEngine, TransactionEngine, TransactionHandle};
pub use error::{EngineError, EngineResult};
pub use isolation::{IsolationLevel, IsolationLevelValidator};
pub use scope::{Phase, PhaseGuard, TransactionScope};
