//! The two-party session that carries a PSI run.
//!
//! [`SessionEvaluator`] connects the parties according to their [`Role`], makes sure both sides
//! were launched with the same run parameters, and fixes the [`PhasingTable`] geometry they
//! will hash into. Circuit evaluation proper belongs to the MPC engine layered on top of the
//! session; this evaluator stops once both parties agree on the table.
use crate::config::{CircuitSharing, MtGenAlg, Role};
use crate::dispatch::{CircuitRequest, PsiCircuitEvaluator};
use crate::phasing::PhasingTable;
use crate::seclvl::SecurityLevel;
use eyre::{bail, WrapErr};
use log::{debug, info, warn};
use phasing_channel::Channel;
use std::fmt;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

/// How many times the initiator tries to reach the responder.
pub const CONNECT_ATTEMPTS: usize = 600;
/// Pause between two connection attempts.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

const SESSION_MAGIC: u32 = u32::from_le_bytes(*b"PSIP");
const SESSION_VERSION: u16 = 1;

/// The peer disagrees about how the run should go.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The peer's header does not start with the session magic or has an unknown version.
    BadHeader {
        /// Magic number received.
        magic: u32,
        /// Version received.
        version: u16,
    },
    /// The peer claims a role it cannot have, or an encoding that names no role.
    RoleClash(u8),
    /// The peer was launched with a different value for `field`.
    ParameterMismatch {
        /// Name of the mismatching parameter.
        field: &'static str,
        /// Our value.
        ours: String,
        /// The peer's value.
        theirs: String,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::BadHeader { magic, version } => write!(
                f,
                "peer sent an unrecognized session header (magic {:#010x}, version {})",
                magic, version
            ),
            SessionError::RoleClash(r) => {
                write!(f, "peer announced role {}, which does not complement ours", r)
            }
            SessionError::ParameterMismatch {
                field,
                ours,
                theirs,
            } => write!(
                f,
                "parameter mismatch on {}: ours is {}, peer's is {}",
                field, ours, theirs
            ),
        }
    }
}

impl std::error::Error for SessionError {}

/// The run parameters each party announces to the other.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionHeader {
    /// Sender's role.
    pub role: Role,
    /// Number of set elements.
    pub num_elements: u32,
    /// Element bit width.
    pub bitlen: u32,
    /// Cuckoo load factor.
    pub epsilon: f64,
    /// Symmetric security bits.
    pub symbits: u32,
    /// Circuit construction.
    pub sharing: CircuitSharing,
    /// Multiplication-triple generation algorithm.
    pub mt_alg: MtGenAlg,
    /// Evaluator threads.
    pub num_threads: u32,
}

fn mismatch<T: fmt::Display>(field: &'static str, ours: T, theirs: T) -> SessionError {
    SessionError::ParameterMismatch {
        field,
        ours: ours.to_string(),
        theirs: theirs.to_string(),
    }
}

impl SessionHeader {
    /// The header a party running `request` announces.
    pub fn from_request(request: &CircuitRequest<'_>) -> SessionHeader {
        SessionHeader {
            role: request.role,
            num_elements: request.num_elements,
            bitlen: request.bitlen,
            epsilon: request.epsilon,
            symbits: request.seclvl.symbits,
            sharing: request.sharing,
            mt_alg: request.mt_alg,
            num_threads: request.num_threads,
        }
    }

    /// Send the header.
    pub fn write(&self, channel: &mut Channel<'_>) -> eyre::Result<()> {
        channel.write(&SESSION_MAGIC)?;
        channel.write(&SESSION_VERSION)?;
        channel.write(&(self.role as u8))?;
        channel.write(&self.num_elements)?;
        channel.write(&self.bitlen)?;
        channel.write(&self.epsilon)?;
        channel.write(&self.symbits)?;
        channel.write(&(self.sharing == CircuitSharing::Yao))?;
        channel.write(&(self.mt_alg as u8))?;
        channel.write(&self.num_threads)?;
        Ok(())
    }

    /// Receive a header.
    pub fn read(channel: &mut Channel<'_>) -> eyre::Result<SessionHeader> {
        let magic = channel.read::<u32>()?;
        let version = channel.read::<u16>()?;
        if magic != SESSION_MAGIC || version != SESSION_VERSION {
            return Err(SessionError::BadHeader { magic, version }.into());
        }
        let role = channel.read::<u8>()?;
        let role = match role {
            0 => Role::Initiator,
            1 => Role::Responder,
            r => return Err(SessionError::RoleClash(r).into()),
        };
        let num_elements = channel.read()?;
        let bitlen = channel.read()?;
        let epsilon = channel.read()?;
        let symbits = channel.read()?;
        let sharing = if channel.read::<bool>()? {
            CircuitSharing::Yao
        } else {
            CircuitSharing::Boolean
        };
        let mt_alg = channel.read::<u8>()?;
        let mt_alg = MtGenAlg::try_from(mt_alg)
            .map_err(|v| eyre::eyre!("unknown multiplication triple algorithm {v}"))?;
        let num_threads = channel.read()?;
        Ok(SessionHeader {
            role,
            num_elements,
            bitlen,
            epsilon,
            symbits,
            sharing,
            mt_alg,
            num_threads,
        })
    }

    /// Check that `peer` is the header of the other half of our run.
    pub fn check_peer(&self, peer: &SessionHeader) -> Result<(), SessionError> {
        if peer.role != self.role.peer() {
            return Err(SessionError::RoleClash(peer.role as u8));
        }
        if peer.num_elements != self.num_elements {
            return Err(mismatch("num_elements", self.num_elements, peer.num_elements));
        }
        if peer.bitlen != self.bitlen {
            return Err(mismatch("bitlen", self.bitlen, peer.bitlen));
        }
        if peer.epsilon.to_bits() != self.epsilon.to_bits() {
            return Err(mismatch("epsilon", self.epsilon, peer.epsilon));
        }
        if peer.symbits != self.symbits {
            return Err(mismatch("security_bits", self.symbits, peer.symbits));
        }
        if peer.sharing != self.sharing {
            return Err(mismatch("sharing", self.sharing, peer.sharing));
        }
        if peer.mt_alg != self.mt_alg {
            return Err(mismatch(
                "mt_alg",
                format!("{:?}", self.mt_alg),
                format!("{:?}", peer.mt_alg),
            ));
        }
        if peer.num_threads != self.num_threads {
            return Err(mismatch("num_threads", self.num_threads, peer.num_threads));
        }
        Ok(())
    }
}

/// Agree on the run with the peer over `channel` and return the table both sides will use.
pub fn run_session(
    channel: &mut Channel<'_>,
    request: &CircuitRequest<'_>,
) -> eyre::Result<PhasingTable> {
    let ours = SessionHeader::from_request(request);
    ours.write(channel)?;
    let theirs = SessionHeader::read(channel).wrap_err("reading peer session header")?;
    ours.check_peer(&theirs)?;
    debug!("peer header matches: {:?}", theirs);

    let table = PhasingTable::new(request.num_elements, request.bitlen, request.epsilon);
    match request.role {
        Role::Initiator => {
            channel.write(&table.nbins)?;
            if !channel.read::<bool>()? {
                bail!("responder rejected a table of {} bins", table.nbins);
            }
        }
        Role::Responder => {
            let nbins = channel.read::<u64>()?;
            let agreed = nbins == table.nbins;
            channel.write(&agreed)?;
            channel.force_flush()?;
            if !agreed {
                return Err(mismatch("nbins", table.nbins, nbins).into());
            }
        }
    }
    Ok(table)
}

/// What a finished session reports.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    /// Our role.
    pub role: Role,
    /// The peer's socket address, when the OS reports one.
    pub peer: Option<SocketAddr>,
    /// Agreed hash table geometry.
    pub table: PhasingTable,
    /// Circuit construction.
    pub sharing: CircuitSharing,
    /// Security level of the run.
    pub seclvl: SecurityLevel,
    /// Wall-clock time from connecting to agreement.
    pub elapsed: Duration,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with ", self.role)?;
        match self.peer {
            Some(peer) => write!(f, "{}", peer)?,
            None => write!(f, "unknown peer")?,
        }
        write!(
            f,
            ": {}, {}-bit security, {} bins, {}-bit stored elements, {:?}",
            self.sharing,
            self.seclvl.symbits,
            self.table.nbins,
            self.table.reduced_bitlen,
            self.elapsed
        )
    }
}

/// [`PsiCircuitEvaluator`] that runs the session over TCP.
///
/// The responder listens on the requested address and port; the initiator connects to it.
#[derive(Clone, Debug)]
pub struct SessionEvaluator {
    attempts: usize,
    retry_delay: Duration,
}

impl Default for SessionEvaluator {
    fn default() -> Self {
        SessionEvaluator {
            attempts: CONNECT_ATTEMPTS,
            retry_delay: CONNECT_RETRY_DELAY,
        }
    }
}

impl SessionEvaluator {
    /// An evaluator with the default connection retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how often, and how patiently, the initiator retries connecting.
    pub fn with_retries(mut self, attempts: usize, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    fn connect(&self, request: &CircuitRequest<'_>) -> eyre::Result<TcpStream> {
        let addr = (request.address, request.port);
        match request.role {
            Role::Responder => {
                let listener = TcpListener::bind(addr)
                    .wrap_err_with(|| format!("binding {}:{}", request.address, request.port))?;
                info!("listening on {:?}", listener.local_addr()?);
                let (stream, peer) = listener.accept().wrap_err("accepting initiator")?;
                info!("accepted connection from {:?}", peer);
                Ok(stream)
            }
            Role::Initiator => {
                for attempt in 1..=self.attempts {
                    match TcpStream::connect(addr) {
                        Ok(stream) => {
                            info!("connected to {}:{}", request.address, request.port);
                            return Ok(stream);
                        }
                        Err(e) => {
                            debug!("connection attempt {} failed: {}", attempt, e);
                            if attempt < self.attempts {
                                thread::sleep(self.retry_delay);
                            }
                        }
                    }
                }
                warn!("giving up on {}:{}", request.address, request.port);
                bail!(
                    "could not connect to {}:{} after {} attempts",
                    request.address,
                    request.port,
                    self.attempts
                )
            }
        }
    }
}

impl PsiCircuitEvaluator for SessionEvaluator {
    type Output = SessionSummary;

    fn run_phasing_circuit(
        &mut self,
        request: &CircuitRequest<'_>,
    ) -> eyre::Result<SessionSummary> {
        let start = Instant::now();
        let stream = self.connect(request)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr().ok();
        let table = Channel::with(stream, |channel| run_session(channel, request))?;
        info!(
            "agreed on {} bins ({} index bits, {} stored bits)",
            table.nbins, table.index_bits, table.reduced_bitlen
        );
        Ok(SessionSummary {
            role: request.role,
            peer,
            table,
            sharing: request.sharing,
            seclvl: request.seclvl,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seclvl::LT;
    use phasing_channel::local::local_channel_pair;

    fn request(role: Role) -> CircuitRequest<'static> {
        CircuitRequest {
            role,
            address: "127.0.0.1",
            port: 0,
            seclvl: LT,
            num_elements: 31,
            bitlen: 32,
            epsilon: 1.2,
            num_threads: 1,
            mt_alg: MtGenAlg::Ot,
            sharing: CircuitSharing::Boolean,
        }
    }

    fn session_error(report: &eyre::Report) -> Option<&SessionError> {
        report.chain().find_map(|e| e.downcast_ref::<SessionError>())
    }

    #[test]
    fn test_parties_agree() {
        let initiator = request(Role::Initiator);
        let responder = request(Role::Responder);
        let (a, b) = local_channel_pair(
            |c| run_session(c, &initiator),
            |c| run_session(c, &responder),
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a, PhasingTable::new(31, 32, 1.2));
    }

    #[test]
    fn test_same_role_is_rejected() {
        let one = request(Role::Initiator);
        let two = request(Role::Initiator);
        let err = local_channel_pair(|c| run_session(c, &one), |c| run_session(c, &two))
            .unwrap_err();
        assert!(matches!(
            session_error(&err),
            Some(SessionError::RoleClash(0))
        ));
    }

    #[test]
    fn test_mismatched_parameters_are_rejected() {
        let initiator = request(Role::Initiator);
        let mut responder = request(Role::Responder);
        responder.sharing = CircuitSharing::Yao;
        let err = local_channel_pair(
            |c| run_session(c, &initiator),
            |c| run_session(c, &responder),
        )
        .unwrap_err();
        match session_error(&err) {
            Some(SessionError::ParameterMismatch { field, .. }) => assert_eq!(*field, "sharing"),
            other => panic!("expected a sharing mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_magic() {
        let responder = request(Role::Responder);
        let err = local_channel_pair(
            |c| run_session(c, &responder),
            |c| {
                SessionHeader::read(c)?;
                c.write(&0xdead_beef_u32)?;
                c.write(&SESSION_VERSION)?;
                Ok(())
            },
        )
        .unwrap_err();
        assert!(matches!(
            session_error(&err),
            Some(SessionError::BadHeader {
                magic: 0xdead_beef,
                ..
            })
        ));
    }

    #[test]
    fn test_header_round_trip() {
        let header = SessionHeader::from_request(&request(Role::Responder));
        let (read, _) =
            local_channel_pair(|c| SessionHeader::read(c), |c| header.write(c)).unwrap();
        assert_eq!(read, header);
    }

    #[test]
    fn test_initiator_gives_up() {
        // Bind and drop to find a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut req = request(Role::Initiator);
        req.port = port;
        let mut evaluator = SessionEvaluator::new().with_retries(2, Duration::from_millis(1));
        let err = evaluator.run_phasing_circuit(&req).unwrap_err();
        assert!(err.to_string().contains("after 2 attempts"));
    }
}
