//! Byte channels between the two parties of a PSI run.
//!
//! A [`Channel`] wraps one full-duplex connection (in practice a `TcpStream`) with a read buffer
//! and a write buffer, and flushes pending writes before it blocks on a read, so that callers
//! can write a message and then wait for the reply without thinking about flushing. The
//! [`local`] module builds connected channels inside one process for tests.

#![deny(missing_docs)]

use std::io::{ErrorKind, Read, Write};

use eyre::Context;

pub mod local;

/// `dyn Read + Write` is not expressible directly, so the channel stores a `dyn Duplex`.
trait Duplex: Read + Write {}
impl<T: Read + Write + ?Sized> Duplex for T {}

/// Marks an error as having come from the connection rather than from the protocol.
///
/// ```rust
/// use phasing_channel::NetworkError;
///
/// let e = eyre::eyre!("connection reset").wrap_err(NetworkError);
/// let e = e.wrap_err("reading peer header");
/// assert!(e.is::<NetworkError>());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct NetworkError;

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "network error")
    }
}

impl std::error::Error for NetworkError {}

/// A fixed-width value that can be sent over a [`Channel`].
///
/// All multi-byte values travel little-endian.
pub trait WireValue: Sized {
    /// The byte representation of the value.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    /// Encode `self`.
    fn to_wire(&self) -> Self::Bytes;

    /// Decode a value, failing if `bytes` is not a valid encoding.
    fn from_wire(bytes: Self::Bytes) -> eyre::Result<Self>;
}

macro_rules! wire_value_le {
    ($($ty:ty),*) => {
        $(
            impl WireValue for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                #[inline]
                fn to_wire(&self) -> Self::Bytes {
                    self.to_le_bytes()
                }

                #[inline]
                fn from_wire(bytes: Self::Bytes) -> eyre::Result<Self> {
                    Ok(<$ty>::from_le_bytes(bytes))
                }
            }
        )*
    };
}

wire_value_le!(u8, u16, u32, u64, f64);

impl WireValue for bool {
    type Bytes = [u8; 1];

    #[inline]
    fn to_wire(&self) -> Self::Bytes {
        [u8::from(*self)]
    }

    #[inline]
    fn from_wire(bytes: Self::Bytes) -> eyre::Result<Self> {
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            b => eyre::bail!("invalid boolean encoding {b:#04x}"),
        }
    }
}

/// Capacities, in bytes, of a [`Channel`]'s buffers.
pub struct BufferSizes {
    /// Read buffer capacity.
    pub read: usize,
    /// Write buffer capacity.
    pub write: usize,
}

impl Default for BufferSizes {
    fn default() -> Self {
        BufferSizes {
            read: 1 << 16,
            write: 1 << 14,
        }
    }
}

/// Bytes received from the connection but not yet handed to the caller.
struct Inbox {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

impl Inbox {
    fn new(capacity: usize) -> Self {
        Inbox {
            data: vec![0; capacity.max(1)],
            start: 0,
            end: 0,
        }
    }

    fn pending(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// Move up to `dst.len()` pending bytes into `dst`, returning how many were moved.
    fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.end - self.start);
        dst[..n].copy_from_slice(&self.data[self.start..self.start + n]);
        self.start += n;
        n
    }

    /// Replace the (empty) inbox with whatever one `read` call on `src` returns.
    fn refill(&mut self, src: &mut dyn Duplex) -> std::io::Result<()> {
        debug_assert!(self.pending().is_empty());
        loop {
            match src.read(&mut self.data) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    ))
                }
                Ok(n) => {
                    self.start = 0;
                    self.end = n;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// A buffered, self-flushing channel over one connection.
///
/// # Flushing
/// Every read flushes pending writes first, and [`Channel::with`] flushes on the way out, so
/// [`Channel::force_flush`] is only needed when a party stops reading for a long time.
///
/// # Error Handling
/// After an error the channel's state is unknown: there is no telling how much of a failed
/// write reached the peer. Abandon the run instead of retrying on the same channel.
pub struct Channel<'a> {
    inbox: Inbox,
    outbox: Vec<u8>,
    conn: &'a mut dyn Duplex,
}

impl Channel<'_> {
    /// Run `thunk` on a channel over `conn` with the default [`BufferSizes`].
    pub fn with<C, T, F>(conn: C, thunk: F) -> eyre::Result<T>
    where
        for<'a, 'b> F: FnOnce(&'a mut Channel<'b>) -> eyre::Result<T>,
        C: Read + Write,
    {
        Self::with_sizes(conn, BufferSizes::default(), thunk)
    }

    /// Run `thunk` on a channel over `conn`, then flush whatever it left in the write buffer.
    ///
    /// `conn` is moved in so that no partially consumed read buffer can outlive the channel.
    /// Since the channel buffers on its own, an unbuffered `conn` is preferable.
    ///
    /// ```rust
    /// fn say_hello(conn: std::net::TcpStream) -> eyre::Result<()> {
    ///     phasing_channel::Channel::with_sizes(conn, Default::default(), |channel| {
    ///         channel.write_bytes(b"hello!")
    ///     })
    /// }
    /// ```
    pub fn with_sizes<C, T, F>(mut conn: C, sizes: BufferSizes, thunk: F) -> eyre::Result<T>
    where
        for<'a, 'b> F: FnOnce(&'a mut Channel<'b>) -> eyre::Result<T>,
        C: Read + Write,
    {
        let mut channel = Channel {
            inbox: Inbox::new(sizes.read),
            outbox: Vec::with_capacity(sizes.write.max(1)),
            conn: &mut conn,
        };
        let out = thunk(&mut channel)?;
        channel.force_flush()?;
        Ok(out)
    }

    /// Push buffered writes to the connection and flush it.
    pub fn force_flush(&mut self) -> eyre::Result<()> {
        if self.outbox.is_empty() {
            return Ok(());
        }
        self.conn.write_all(&self.outbox).wrap_err(NetworkError)?;
        self.outbox.clear();
        self.conn.flush().wrap_err(NetworkError)
    }

    /// Queue `bytes` for the peer.
    ///
    /// Writes that do not fit in the write buffer go straight to the connection, after the
    /// buffer has been flushed to keep the byte order intact.
    ///
    /// ```
    /// let mut dst = [0; 5];
    /// phasing_channel::local::local_channel_pair(
    ///     |c| c.read_bytes(&mut dst),
    ///     |c| c.write_bytes(b"hello"),
    /// )
    /// .unwrap();
    /// assert_eq!(dst.as_slice(), b"hello");
    /// ```
    pub fn write_bytes(&mut self, bytes: &[u8]) -> eyre::Result<()> {
        let room = self.outbox.capacity() - self.outbox.len();
        if bytes.len() <= room {
            self.outbox.extend_from_slice(bytes);
            return Ok(());
        }
        self.force_flush()?;
        if bytes.len() <= self.outbox.capacity() {
            self.outbox.extend_from_slice(bytes);
            return Ok(());
        }
        // An empty outbox is what tells `force_flush` there is nothing to do, so a direct
        // write must be flushed here.
        self.conn.write_all(bytes).wrap_err(NetworkError)?;
        self.conn.flush().wrap_err(NetworkError)
    }

    /// Fill `dst` with the next `dst.len()` bytes from the peer.
    pub fn read_bytes(&mut self, mut dst: &mut [u8]) -> eyre::Result<()> {
        self.force_flush()?;
        loop {
            let n = self.inbox.drain_into(dst);
            dst = &mut dst[n..];
            if dst.is_empty() {
                return Ok(());
            }
            if dst.len() >= self.inbox.data.len() {
                // Too big to stage; read it in place.
                return self.conn.read_exact(dst).wrap_err(NetworkError);
            }
            self.inbox.refill(self.conn).wrap_err(NetworkError)?;
        }
    }

    /// Read and decode a `T`.
    ///
    /// ```
    /// let (port, _) = phasing_channel::local::local_channel_pair(
    ///     |c| c.read::<u16>(),
    ///     |c| c.write(&7766_u16),
    /// )
    /// .unwrap();
    /// assert_eq!(port, 7766);
    /// ```
    pub fn read<T: WireValue>(&mut self) -> eyre::Result<T> {
        let mut bytes = T::Bytes::default();
        self.read_bytes(bytes.as_mut())?;
        T::from_wire(bytes)
    }

    /// Encode `value` and queue it for the peer.
    pub fn write<T: WireValue>(&mut self, value: &T) -> eyre::Result<()> {
        self.write_bytes(value.to_wire().as_ref())
    }
}

#[cfg(test)]
mod tests;
