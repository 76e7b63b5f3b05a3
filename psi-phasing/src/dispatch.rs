//! Turning a [`RunConfig`] into one call into a PSI circuit evaluator.
use crate::config::{CircuitSharing, MtGenAlg, Role, RunConfig};
use crate::errors::{Error, Result};
use crate::seclvl::{SecurityLevel, SecurityLevelResolver};
use log::info;

/// Everything an evaluator needs to run the phasing PSI circuit.
#[derive(Clone, Debug, PartialEq)]
pub struct CircuitRequest<'a> {
    /// Network role of this party.
    pub role: Role,
    /// Peer host.
    pub address: &'a str,
    /// Peer port.
    pub port: u16,
    /// Resolved security level.
    pub seclvl: SecurityLevel,
    /// Number of set elements.
    pub num_elements: u32,
    /// Bit width of each element.
    pub bitlen: u32,
    /// Cuckoo load factor.
    pub epsilon: f64,
    /// Evaluator threads.
    pub num_threads: u32,
    /// Multiplication-triple generation algorithm.
    pub mt_alg: MtGenAlg,
    /// Circuit construction.
    pub sharing: CircuitSharing,
}

/// A party's side of the two-party PSI circuit.
///
/// `run_phasing_circuit` blocks until the protocol run with the peer has finished.
pub trait PsiCircuitEvaluator {
    /// What a finished run reports back.
    type Output;

    /// Run the PSI circuit described by `request`.
    fn run_phasing_circuit(&mut self, request: &CircuitRequest<'_>) -> eyre::Result<Self::Output>;
}

/// Consume `config` and run it on `evaluator`.
///
/// The security level is resolved through `levels` before the evaluator is touched, so an
/// unsupported level never starts a run.
pub fn dispatch<R, E>(config: RunConfig, levels: &R, evaluator: &mut E) -> Result<E::Output>
where
    R: SecurityLevelResolver + ?Sized,
    E: PsiCircuitEvaluator + ?Sized,
{
    let seclvl = levels.resolve(config.security_bits())?;
    let request = CircuitRequest {
        role: config.role(),
        address: config.address(),
        port: config.port(),
        seclvl,
        num_elements: config.num_elements(),
        bitlen: config.bitlen(),
        epsilon: config.cuckoo_epsilon(),
        num_threads: config.num_threads(),
        mt_alg: config.mt_generation_algorithm(),
        sharing: config.sharing(),
    };
    info!(
        "running PSI as {} with {} ({} elements of {} bits)",
        request.role, request.sharing, request.num_elements, request.bitlen
    );
    evaluator
        .run_phasing_circuit(&request)
        .map_err(Error::EvaluatorError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_THREADS;
    use crate::seclvl::{StandardLevels, LT, ST};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Role, String, u16, SecurityLevel, CircuitSharing)>,
    }

    impl PsiCircuitEvaluator for Recorder {
        type Output = usize;

        fn run_phasing_circuit(&mut self, request: &CircuitRequest<'_>) -> eyre::Result<usize> {
            self.calls.push((
                request.role,
                request.address.to_string(),
                request.port,
                request.seclvl,
                request.sharing,
            ));
            Ok(self.calls.len())
        }
    }

    struct Failing;

    impl PsiCircuitEvaluator for Failing {
        type Output = ();

        fn run_phasing_circuit(&mut self, _: &CircuitRequest<'_>) -> eyre::Result<()> {
            eyre::bail!("peer aborted")
        }
    }

    struct NoLevels;

    impl SecurityLevelResolver for NoLevels {
        fn resolve(&self, symbits: u32) -> Result<SecurityLevel> {
            Err(Error::UnsupportedSecurityLevel(symbits))
        }
    }

    fn config(use_garbled_circuit: bool, security_bits: u32) -> RunConfig {
        RunConfig {
            role: Role::Responder,
            bitlen: 32,
            num_elements: 31,
            security_bits,
            address: "127.0.0.1".to_string(),
            port: 7766,
            cuckoo_epsilon: 1.2,
            use_garbled_circuit,
            num_threads: DEFAULT_THREADS,
            mt_generation_algorithm: MtGenAlg::Ot,
        }
    }

    #[test]
    fn test_sharing_selection() {
        let mut evaluator = Recorder::default();
        dispatch(config(false, 128), &StandardLevels, &mut evaluator).unwrap();
        dispatch(config(true, 80), &StandardLevels, &mut evaluator).unwrap();
        assert_eq!(
            evaluator.calls,
            vec![
                (
                    Role::Responder,
                    "127.0.0.1".to_string(),
                    7766,
                    LT,
                    CircuitSharing::Boolean
                ),
                (
                    Role::Responder,
                    "127.0.0.1".to_string(),
                    7766,
                    ST,
                    CircuitSharing::Yao
                ),
            ]
        );
    }

    #[test]
    fn test_unresolved_level_skips_evaluator() {
        let mut evaluator = Recorder::default();
        let err = dispatch(config(true, 128), &NoLevels, &mut evaluator).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSecurityLevel(128)));
        assert!(evaluator.calls.is_empty());
    }

    #[test]
    fn test_evaluator_failure() {
        let err = dispatch(config(false, 128), &StandardLevels, &mut Failing).unwrap_err();
        assert!(matches!(err, Error::EvaluatorError(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("peer aborted"));
    }
}
