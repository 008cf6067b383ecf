//! # fortdocs-integrity
//!
//! Runtime device-integrity gate for the FortDocs secure document store.
//! Before the encrypted store is unlocked, the host asks the gate whether
//! the runtime environment can be trusted.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      IntegrityGate                           │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │ KnownArtifact│  │ Writability  │  │ Symlink /    │      │
//! │  │ Probe        │  │ Probe        │  │ Process probe│      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │              ProbeRegistry                        │      │
//! │  │   (concurrent, per-probe deadline, stable order)  │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │              aggregator::score                    │      │
//! │  │   (weighted mean, thresholds → TrustDecision)     │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │             GateAction: Allow / AllowDegraded / Deny         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! - **Fail-closed by default**: no usable evidence means no proof of trust
//! - **Non-fatal probes**: a probe that errors, panics or hangs becomes
//!   neutral evidence and never aborts the evaluation
//! - **No residue**: the writability probe always removes its artifact
//! - **No termination**: the gate returns `Deny`; the host keeps the store
//!   locked
//!
//! ## Example
//!
//! ```no_run
//! use fortdocs_integrity::{GateAction, IntegrityConfig, IntegrityGate};
//!
//! let gate = IntegrityGate::from_config(IntegrityConfig::default())?;
//! let verdict = gate.evaluate()?;
//! if gate.decide(&verdict) == GateAction::Deny {
//!     // keep the document store locked
//! }
//! # Ok::<(), fortdocs_integrity::IntegrityError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::doc_markdown)] // Allow product names without backticks
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::missing_panics_doc)] // Panic documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod aggregator;
pub mod audit;
pub mod config;
pub mod error;
pub mod gate;
pub mod monitor;
pub mod probes;
pub mod registry;
pub mod types;

pub use audit::{AuditRecord, AUDIT_TARGET};
pub use config::{ErrorWeighting, IntegrityConfig, Policy, ProbeSpec};
pub use error::{IntegrityError, ProbeError};
pub use gate::IntegrityGate;
pub use monitor::IntegrityMonitor;
pub use probes::{
    ArtifactFs, KnownArtifactProbe, Probe, ProcessAnomalyProbe, StdArtifactFs, SymlinkProbe,
    WritabilityProbe,
};
pub use registry::ProbeRegistry;
pub use types::{
    Evidence, GateAction, ProbeCategory, TrustDecision, Verdict, WeightedEvidence,
};
