//! In-process connections, so both parties of a run can be driven from one test.

use std::io::{Read, Write};

use eyre::Context;

use crate::Channel;

#[cfg(unix)]
type Stream = std::os::unix::net::UnixStream;
#[cfg(not(unix))]
type Stream = std::net::TcpStream;

#[cfg(unix)]
fn stream_pair() -> std::io::Result<(Stream, Stream)> {
    Stream::pair()
}

#[cfg(not(unix))]
fn stream_pair() -> std::io::Result<(Stream, Stream)> {
    loopback_pair()
}

/// Two connected TCP streams over loopback.
#[cfg(any(test, not(unix)))]
fn loopback_pair() -> std::io::Result<(std::net::TcpStream, std::net::TcpStream)> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    let dialer = std::net::TcpStream::connect(listener.local_addr()?)?;
    let (accepted, _) = listener.accept()?;
    Ok((accepted, dialer))
}

/// One end of an in-process, full-duplex connection.
///
/// Unix stream pairs are used where available, loopback TCP elsewhere.
pub struct LocalSocket {
    stream: Stream,
}

impl LocalSocket {
    /// Create both ends of a connection.
    ///
    /// ```
    /// use std::io::{Read, Write};
    /// use phasing_channel::local::LocalSocket;
    ///
    /// let (mut initiator, mut responder) = LocalSocket::pair().unwrap();
    /// initiator.write_all(&7766_u16.to_le_bytes()).unwrap();
    /// let mut port = [0; 2];
    /// responder.read_exact(&mut port).unwrap();
    /// assert_eq!(u16::from_le_bytes(port), 7766);
    /// ```
    pub fn pair() -> eyre::Result<(Self, Self)> {
        let (a, b) = stream_pair().wrap_err("creating local socket pair")?;
        Ok((LocalSocket { stream: a }, LocalSocket { stream: b }))
    }
}

impl Read for LocalSocket {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for LocalSocket {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

/// Run `ours` on the calling thread and `theirs` on a scoped thread, connected by a [`Channel`].
///
/// If both sides fail, the error from `theirs` is attached as context to the one from `ours`.
///
/// # Example
/// ```
/// let (a, b) = phasing_channel::local::local_channel_pair(
///     |c| {
///         let out = c.read::<u64>()?;
///         c.write(&1_u64)?;
///         Ok(out)
///     },
///     |c| {
///         c.write(&0_u64)?;
///         c.read::<u64>()
///     },
/// )
/// .unwrap();
/// assert_eq!((a, b), (0, 1));
/// ```
pub fn local_channel_pair<T, U: Send, F, G>(ours: F, theirs: G) -> eyre::Result<(T, U)>
where
    for<'a, 'b> F: FnOnce(&'b mut Channel<'a>) -> eyre::Result<T>,
    for<'a, 'b> G: Send + FnOnce(&'b mut Channel<'a>) -> eyre::Result<U>,
{
    let (our_socket, their_socket) = LocalSocket::pair()?;
    std::thread::scope(|scope| {
        let peer = scope.spawn(move || Channel::with(their_socket, theirs));
        let mine = Channel::with(our_socket, ours);
        let peer = peer
            .join()
            .unwrap_or_else(|_| Err(eyre::eyre!("peer thread panicked")));
        match (mine, peer) {
            (Ok(t), Ok(u)) => Ok((t, u)),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(peer_err)) => Err(e.wrap_err(peer_err)),
        }
    })
}

#[test]
fn test_loopback_pair() {
    let (mut a, mut b) = loopback_pair().unwrap();
    a.set_read_timeout(Some(std::time::Duration::from_secs(1)))
        .unwrap();
    b.set_read_timeout(Some(std::time::Duration::from_secs(1)))
        .unwrap();
    let mut buf = [0; 6];
    a.write_all(b"role 0").unwrap();
    b.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"role 0");
    b.write_all(b"role 1").unwrap();
    a.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"role 1");
}
