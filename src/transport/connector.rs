//! Connectors open the byte stream a session runs over.
//!
//! - Unix: TCP or Unix Domain Socket
//! - Windows: TCP

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::Endpoint;

/// Boxed future type for connectors.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A bidirectional byte stream.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Type-erased connected stream.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens a transport to an endpoint.
///
/// Called once per connection attempt, including every reconnect.
pub trait Connector: Send + Sync + 'static {
    /// Connect to `endpoint`.
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<BoxedStream>>;
}

/// Connector for real sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

impl Connector for DefaultConnector {
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<BoxedStream>> {
        Box::pin(async move {
            match endpoint {
                Endpoint::Tcp(host_port) => {
                    let stream = TcpStream::connect(host_port.as_str()).await?;
                    stream.set_nodelay(true)?;
                    Ok(Box::new(stream) as BoxedStream)
                }
                #[cfg(unix)]
                Endpoint::Ipc(path) => {
                    let stream = tokio::net::UnixStream::connect(path).await?;
                    Ok(Box::new(stream) as BoxedStream)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let endpoint = Endpoint::Tcp(addr.to_string());
        let mut stream = DefaultConnector.connect(&endpoint).await.unwrap();
        stream.write_all(b"ping").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ipc_connect() {
        let path = std::env::temp_dir().join(format!("zmtp-client-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = tokio::net::UnixListener::bind(&path).unwrap();

        let endpoint = Endpoint::Ipc(path.clone());
        let (accepted, connected) =
            tokio::join!(listener.accept(), DefaultConnector.connect(&endpoint));
        assert!(accepted.is_ok());
        assert!(connected.is_ok());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Endpoint::Tcp(addr.to_string());
        assert!(DefaultConnector.connect(&endpoint).await.is_err());
    }
}
