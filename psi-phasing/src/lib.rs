#![deny(missing_docs)]

//! Configuration and dispatch for two-party circuit-based private set intersection runs.
//!
//! A run goes through two steps. [`options::resolve`] turns command line arguments into a
//! validated [`RunConfig`], and [`dispatch::dispatch`] hands that configuration to a
//! [`PsiCircuitEvaluator`], choosing Boolean sharing or Yao's garbled circuits. The
//! [`session::SessionEvaluator`] is the evaluator used by the `psi_phasing` binary.

pub mod config;
pub mod dispatch;
mod errors;
pub mod options;
pub mod phasing;
pub mod seclvl;
pub mod session;

pub use crate::{
    config::{CircuitSharing, MtGenAlg, Role, RunConfig},
    dispatch::{dispatch, CircuitRequest, PsiCircuitEvaluator},
    errors::*,
    seclvl::{SecurityLevel, SecurityLevelResolver, StandardLevels},
};
