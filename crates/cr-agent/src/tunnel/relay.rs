//! Bidirectional byte relay
//!
//! Two independent copy loops per connection, one per direction. Either
//! side reaching EOF (or erroring) shuts down the opposite write half,
//! so a close on one side propagates promptly instead of leaving a
//! half-open socket behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use cr_core::time::current_time_millis;

const RELAY_BUFFER_SIZE: usize = 8192;

/// Relay bytes between two streams until both directions are done.
///
/// `activity` is stamped with the current time on every transferred
/// chunk; the idle reaper uses it to find dead sessions.
pub async fn relay_streams<A, B>(a: A, b: B, activity: Arc<AtomicU64>)
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);

    let forward = tokio::spawn(copy_half(a_read, b_write, Arc::clone(&activity)));
    let backward = tokio::spawn(copy_half(b_read, a_write, activity));

    let _ = forward.await;
    let _ = backward.await;
}

/// Copy one direction until EOF or error, then propagate a half-close.
async fn copy_half<R, W>(mut reader: R, mut writer: W, activity: Arc<AtomicU64>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; RELAY_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                activity.store(current_time_millis(), Ordering::Relaxed);
                if writer.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_relay_forwards_both_directions() {
        let (client, client_far) = tokio::io::duplex(1024);
        let (server, server_far) = tokio::io::duplex(1024);
        let activity = Arc::new(AtomicU64::new(0));

        let relay = tokio::spawn(relay_streams(client_far, server_far, Arc::clone(&activity)));

        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        client_write.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server_write.write_all(b"pong").await.unwrap();
        client_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        assert!(activity.load(Ordering::Relaxed) > 0);

        // Closing the client side propagates EOF through the relay.
        client_write.shutdown().await.unwrap();
        let n = server_read.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);

        // Dropping the server side ends the remaining direction; both
        // copy loops terminate and the relay finishes.
        drop(server_write);
        drop(server_read);
        drop(client_read);
        tokio::time::timeout(Duration::from_secs(5), relay)
            .await
            .expect("relay did not terminate after close")
            .unwrap();
    }
}
