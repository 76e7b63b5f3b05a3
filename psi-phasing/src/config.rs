//! The resolved configuration of one run.
use crate::errors::Error;
use std::fmt;

/// Number of evaluator threads the harness requests.
pub const DEFAULT_THREADS: u32 = 1;

/// Network role of a party in the two-party protocol.
///
/// The initiator opens the connection; the responder listens for it.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
#[repr(u8)]
pub enum Role {
    /// Role `0`.
    Initiator = 0,
    /// Role `1`.
    Responder = 1,
}

impl Role {
    /// The role the peer must hold.
    pub fn peer(self) -> Role {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }
}

impl TryFrom<u64> for Role {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Initiator),
            1 => Ok(Role::Responder),
            r => Err(Error::InvalidRole(r)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

/// Circuit construction used to evaluate the PSI circuit.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum CircuitSharing {
    /// Boolean sharing, evaluated gate by gate (GMW).
    Boolean = 0,
    /// Yao's garbled circuits.
    Yao = 1,
}

impl fmt::Display for CircuitSharing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitSharing::Boolean => write!(f, "boolean sharing"),
            CircuitSharing::Yao => write!(f, "yao garbled circuits"),
        }
    }
}

/// Multiplication-triple generation algorithm.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default)]
#[repr(u8)]
pub enum MtGenAlg {
    /// Oblivious-transfer based generation. The only one the harness selects.
    #[default]
    Ot = 0,
    /// Paillier-based generation.
    Paillier = 1,
    /// DGK-based generation.
    Dgk = 2,
}

impl TryFrom<u8> for MtGenAlg {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MtGenAlg::Ot),
            1 => Ok(MtGenAlg::Paillier),
            2 => Ok(MtGenAlg::Dgk),
            v => Err(v),
        }
    }
}

/// A fully validated PSI run configuration.
///
/// Only [`crate::options::resolve`] builds one, so every `RunConfig` satisfies the role, port,
/// epsilon and security-level constraints.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub(crate) role: Role,
    pub(crate) bitlen: u32,
    pub(crate) num_elements: u32,
    pub(crate) security_bits: u32,
    pub(crate) address: String,
    pub(crate) port: u16,
    pub(crate) cuckoo_epsilon: f64,
    pub(crate) use_garbled_circuit: bool,
    pub(crate) num_threads: u32,
    pub(crate) mt_generation_algorithm: MtGenAlg,
}

impl RunConfig {
    /// Network role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Bit width of each set element.
    pub fn bitlen(&self) -> u32 {
        self.bitlen
    }

    /// Number of elements in the input set.
    pub fn num_elements(&self) -> u32 {
        self.num_elements
    }

    /// Symmetric security parameter.
    pub fn security_bits(&self) -> u32 {
        self.security_bits
    }

    /// Peer host.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Peer port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Cuckoo hashing load factor.
    pub fn cuckoo_epsilon(&self) -> f64 {
        self.cuckoo_epsilon
    }

    /// Was Yao's garbled circuit construction requested?
    pub fn use_garbled_circuit(&self) -> bool {
        self.use_garbled_circuit
    }

    /// Evaluator threads requested.
    pub fn num_threads(&self) -> u32 {
        self.num_threads
    }

    /// Multiplication-triple generation algorithm.
    pub fn mt_generation_algorithm(&self) -> MtGenAlg {
        self.mt_generation_algorithm
    }

    /// The circuit construction selected by [`Self::use_garbled_circuit`].
    pub fn sharing(&self) -> CircuitSharing {
        if self.use_garbled_circuit {
            CircuitSharing::Yao
        } else {
            CircuitSharing::Boolean
        }
    }
}
