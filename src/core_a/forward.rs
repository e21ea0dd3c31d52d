//! Bidirectional byte pump between client and backend.
//!
//! No HTTP awareness at all past the header: once admitted, a slot is just
//! two `tokio::io::copy` halves racing each other.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Chunk size for each direction's copy loop.
pub const BUFFER_SIZE: usize = 4096;

/// Pumps bytes in both directions between `client` and `backend` until
/// either side finishes (EOF or error), then shuts down the write half of
/// the other so a half-closed peer doesn't linger forever. Returns once both
/// directions have stopped.
///
/// The first direction to finish forces teardown of the other, implemented
/// with `tokio::select!` racing the two copies; both halves are polled every
/// iteration of the underlying copy loops, so neither can starve the other.
pub async fn pump(client: &mut TcpStream, backend: &mut TcpStream) -> io::Result<()> {
    let (mut client_rd, mut client_wr) = client.split();
    let (mut backend_rd, mut backend_wr) = backend.split();

    tokio::select! {
        result = copy(&mut client_rd, &mut backend_wr) => {
            let _ = backend_wr.shutdown().await;
            result
        }
        result = copy(&mut backend_rd, &mut client_wr) => {
            let _ = client_wr.shutdown().await;
            result
        }
    }
}

/// Thin wrapper over [`tokio::io::copy`] with the shared [`BUFFER_SIZE`];
/// `tokio::io::copy` already internally buffers in 2 KiB chunks, but naming
/// the constant here keeps it visible as a single tunable.
async fn copy<R, W>(reader: &mut R, writer: &mut W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        use tokio::io::{AsyncReadExt, AsyncWriteExt as _};
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::{TcpListener, TcpStream};

    async fn pair() -> ((TcpStream, TcpStream), (TcpStream, TcpStream)) {
        let client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client_listener.local_addr().unwrap();
        let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend_listener.local_addr().unwrap();

        let client_connect = TcpStream::connect(client_addr);
        let backend_connect = TcpStream::connect(backend_addr);

        let (client_side, backend_side, (client_accept, _), (backend_accept, _)) = tokio::join!(
            client_connect,
            backend_connect,
            async { client_listener.accept().await.unwrap() },
            async { backend_listener.accept().await.unwrap() },
        );

        ((client_side.unwrap(), client_accept), (backend_side.unwrap(), backend_accept))
    }

    #[tokio::test]
    async fn forwards_bytes_from_client_to_backend_and_back() {
        let ((mut client, mut client_peer), (mut backend, mut backend_peer)) = pair().await;

        let pump_task = tokio::spawn(async move { pump(&mut client_peer, &mut backend_peer).await });

        client.write_all(b"hello backend").await.unwrap();
        let mut buf = [0u8; 64];
        use tokio::io::AsyncReadExt;
        let n = backend.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello backend");

        backend.write_all(b"hi client").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hi client");

        drop(client);
        let _ = pump_task.await.unwrap();
    }
}
