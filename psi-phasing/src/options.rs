/*!
Command line options for a PSI run.

The option schema is the [`clap::Command`] derived from [`Cli`]. Build it once with [`schema`],
then hand it by reference to [`resolve`] to turn an argument vector into a [`RunConfig`].
*/
use crate::config::{MtGenAlg, Role, RunConfig, DEFAULT_THREADS};
use crate::errors::{Error, Result};
use crate::seclvl::SecurityLevel;
use clap::{Command, CommandFactory, FromArgMatches, Parser};
use log::debug;
use std::ffi::OsString;

/// Cuckoo hashing load factor used when `-e` is absent.
pub const DEFAULT_EPSILON: f64 = 1.2;
/// Smallest cuckoo load factor for which the hash table can hold every element.
pub const MIN_EPSILON: f64 = 1.0;
/// Symmetric security bits used when `-s` is absent.
pub const DEFAULT_SECURITY_BITS: u32 = 128;
/// Peer address used when `-a` is absent.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
/// Peer port used when `-p` is absent.
pub const DEFAULT_PORT: u16 = 7766;

/// Private set intersection test harness.
#[derive(Parser, Debug)]
#[clap(name = "psi_phasing")]
#[clap(author = "psi-phasing authors")]
#[clap(version)]
pub struct Cli {
    /// Role: 0/1
    #[arg(short = 'r', long, value_name = "NUM")]
    pub role: u64,

    /// Number of elements
    #[arg(short = 'n', long = "num-elements", value_name = "NUM")]
    pub num_elements: u32,

    /// Bit-length
    #[arg(short = 'b', long, value_name = "NUM")]
    pub bitlen: u32,

    /// Epsilon for Cuckoo hashing
    #[arg(
        short = 'e',
        long,
        value_name = "FLOAT",
        default_value_t = DEFAULT_EPSILON,
        allow_negative_numbers = true
    )]
    pub epsilon: f64,

    /// Symmetric Security Bits
    #[arg(
        short = 's',
        long = "security-bits",
        value_name = "NUM",
        default_value_t = DEFAULT_SECURITY_BITS
    )]
    pub security_bits: u32,

    /// IP-address
    #[arg(short = 'a', long, value_name = "STR", default_value_t = DEFAULT_ADDRESS.to_string())]
    pub address: String,

    /// Port [default: 7766]
    #[arg(short = 'p', long, value_name = "NUM")]
    pub port: Option<u64>,

    /// Use Yao's garbled circuits instead of Boolean sharing
    #[arg(short = 'y', long = "use-yao")]
    pub use_yao: bool,
}

impl Cli {
    /// Check the parsed values and narrow them into a [`RunConfig`].
    pub fn validate(self) -> Result<RunConfig> {
        let role = Role::try_from(self.role)?;

        // Range check on the wide value, then narrow.
        let port = match self.port {
            Some(p) => u16::try_from(p).map_err(|_| Error::PortOutOfRange(p))?,
            None => DEFAULT_PORT,
        };

        if !self.epsilon.is_finite() || self.epsilon < MIN_EPSILON {
            return Err(Error::InvalidEpsilon(self.epsilon));
        }

        SecurityLevel::from_symbits(self.security_bits)?;

        Ok(RunConfig {
            role,
            bitlen: self.bitlen,
            num_elements: self.num_elements,
            security_bits: self.security_bits,
            address: self.address,
            port,
            cuckoo_epsilon: self.epsilon,
            use_garbled_circuit: self.use_yao,
            num_threads: DEFAULT_THREADS,
            mt_generation_algorithm: MtGenAlg::Ot,
        })
    }
}

/// Build the option schema.
pub fn schema() -> Command {
    Cli::command()
}

/// Parse `args` (including the program name) against `schema` and validate the result.
///
/// A missing required option, an unparseable value, or a help/version request is returned as
/// [`Error::Usage`]. Values that parse but violate a constraint get their own error variant.
pub fn resolve<I, T>(schema: &Command, args: I) -> Result<RunConfig>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = schema.clone().try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    debug!("parsed options: {:?}", cli);
    cli.validate()
}

/// Render the full help text for `schema`, listing every option.
pub fn usage(schema: &Command) -> String {
    schema.clone().render_help().to_string()
}
