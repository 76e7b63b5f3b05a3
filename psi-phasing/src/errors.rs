/// Errors produced while resolving and dispatching a PSI run.
#[derive(Debug)]
pub enum Error {
    /// The arguments did not match the option schema, or help/version was requested.
    Usage(clap::Error),
    /// The role is neither 0 nor 1.
    InvalidRole(u64),
    /// The port does not fit in 16 bits.
    PortOutOfRange(u64),
    /// The cuckoo epsilon is below 1.0 (or not a number).
    InvalidEpsilon(f64),
    /// No security level is defined for this many symmetric security bits.
    UnsupportedSecurityLevel(u32),
    /// The evaluator failed while running the circuit.
    EvaluatorError(eyre::Report),
}

/// Process exit status for a successful run, or for explicitly requested help.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit status when the evaluator fails.
pub const EXIT_RUN_FAILURE: i32 = 1;
/// Process exit status for arguments that do not match the option schema.
pub const EXIT_USAGE: i32 = 2;
/// Process exit status for arguments that parse but fail validation.
pub const EXIT_INVALID_CONFIG: i32 = 3;

impl Error {
    /// Is this a post-parse validation failure?
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidRole(_)
                | Error::PortOutOfRange(_)
                | Error::InvalidEpsilon(_)
                | Error::UnsupportedSecurityLevel(_)
        )
    }

    /// Is this an explicit `--help` or `--version` request rather than a failure?
    pub fn is_help_request(&self) -> bool {
        match self {
            Error::Usage(e) => matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ),
            _ => false,
        }
    }

    /// The process exit status the binary reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            _ if self.is_help_request() => EXIT_SUCCESS,
            Error::Usage(_) => EXIT_USAGE,
            Error::EvaluatorError(_) => EXIT_RUN_FAILURE,
            _ => EXIT_INVALID_CONFIG,
        }
    }
}

impl std::error::Error for Error {}

impl From<clap::Error> for Error {
    #[inline]
    fn from(e: clap::Error) -> Error {
        Error::Usage(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Usage(e) => write!(f, "{}", e),
            Error::InvalidRole(r) => write!(f, "invalid role {}: expected 0 or 1", r),
            Error::PortOutOfRange(p) => {
                write!(f, "port {} does not fit in 16 bits (max {})", p, u16::MAX)
            }
            Error::InvalidEpsilon(e) => write!(
                f,
                "cuckoo epsilon {} is infeasible: it must be finite and at least 1.0",
                e
            ),
            Error::UnsupportedSecurityLevel(bits) => write!(
                f,
                "no security level for {} symmetric security bits (supported: 80, 112, 128, 192, 256)",
                bits
            ),
            Error::EvaluatorError(e) => write!(f, "PSI circuit evaluation failed: {:#}", e),
        }
    }
}

/// Result type specialized to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
