use proptest::collection::vec as pvec;
use proptest::prelude::*;

use crate::local::{local_channel_pair, LocalSocket};
use crate::{BufferSizes, Channel, NetworkError};

/// One message of a scripted conversation: who sends it, and its bytes.
type Script = Vec<(bool, Vec<u8>)>;

/// Play `script` from one side. `speaker` is true for the side that sends `true` messages.
fn play(socket: LocalSocket, speaker: bool, script: &Script) -> eyre::Result<()> {
    // Tiny buffers push every transfer through the slow paths.
    let sizes = BufferSizes { read: 2, write: 2 };
    Channel::with_sizes(socket, sizes, |channel| {
        let mut scratch = [0u8; 16];
        for (sender, bytes) in script {
            if *sender == speaker {
                channel.write_bytes(bytes)?;
            } else {
                let received = &mut scratch[..bytes.len()];
                channel.read_bytes(received)?;
                eyre::ensure!(received == bytes.as_slice(), "corrupted message");
            }
        }
        Ok(())
    })
}

proptest! {
    #[test]
    fn test_scripted_conversation(
        script in pvec((any::<bool>(), pvec(any::<u8>(), 0..=16)), 0..128),
    ) {
        let (a, b) = LocalSocket::pair().unwrap();
        let (ra, rb) = std::thread::scope(|scope| {
            let peer = scope.spawn(|| play(b, false, &script));
            let mine = play(a, true, &script);
            (mine, peer.join().unwrap())
        });
        prop_assert!(ra.is_ok(), "{:?}", ra);
        prop_assert!(rb.is_ok(), "{:?}", rb);
    }

    #[test]
    fn test_typed_values(x in any::<u64>(), y in any::<u16>(), z in any::<f64>(), flag in any::<bool>()) {
        let ((rx, ry, rz, rflag), _) = local_channel_pair(
            |c| Ok((c.read::<u64>()?, c.read::<u16>()?, c.read::<f64>()?, c.read::<bool>()?)),
            |c| {
                c.write(&x)?;
                c.write(&y)?;
                c.write(&z)?;
                c.write(&flag)
            },
        )
        .unwrap();
        prop_assert_eq!(rx, x);
        prop_assert_eq!(ry, y);
        prop_assert_eq!(rz.to_bits(), z.to_bits());
        prop_assert_eq!(rflag, flag);
    }
}

#[test]
fn test_large_write_bypasses_buffer() {
    let payload: Vec<u8> = (0..=255).cycle().take(100_000).collect();
    let (received, _) = local_channel_pair(
        |c| {
            let mut buf = vec![0; payload.len()];
            c.read_bytes(&mut buf)?;
            Ok(buf)
        },
        |c| c.write_bytes(&payload),
    )
    .unwrap();
    assert_eq!(received, payload);
}

#[test]
fn test_bool_rejects_garbage() {
    let result = local_channel_pair(|c| c.read::<bool>(), |c| c.write(&2_u8));
    assert!(result.is_err());
}

#[test]
fn test_eof_is_network_error() {
    let err = local_channel_pair(|c| c.read::<u32>(), |_| Ok(())).unwrap_err();
    assert!(err.is::<NetworkError>());
}
