use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;

// -----------------------------------------------------------------------------
// ----- Dialer ----------------------------------------------------------------

/// How a session reaches the gateway. Shared by every session in a pool.
#[derive(Clone)]
pub enum Dialer {
    Plain,
    Tls {
        connector: TlsConnector,
        server_name: ServerName<'static>,
    },
}

impl std::fmt::Debug for Dialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialer::Plain => f.write_str("Plain"),
            Dialer::Tls { server_name, .. } => {
                write!(f, "Tls({})", server_name.to_str())
            }
        }
    }
}

impl Dialer {
    pub(crate) async fn dial(&self, endpoint: &str) -> io::Result<GatewayTransport> {
        let stream = TcpStream::connect(endpoint).await?;
        stream.set_nodelay(true)?;

        match self {
            Dialer::Plain => Ok(GatewayTransport::Plain(stream)),
            Dialer::Tls {
                connector,
                server_name,
            } => {
                let tls = connector.connect(server_name.clone(), stream).await?;
                Ok(GatewayTransport::Tls(Box::new(tls)))
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayTransport ------------------------------------------------------

#[derive(Debug)]
pub(crate) enum GatewayTransport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl GatewayTransport {
    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            GatewayTransport::Plain(stream) => {
                stream.write_all(buf).await?;
                stream.flush().await
            }
            GatewayTransport::Tls(stream) => {
                stream.write_all(buf).await?;
                stream.flush().await
            }
        }
    }

    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            GatewayTransport::Plain(stream) => stream.read(buf).await,
            GatewayTransport::Tls(stream) => stream.read(buf).await,
        }
    }

    pub(crate) async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            GatewayTransport::Plain(stream) => stream.shutdown().await,
            GatewayTransport::Tls(stream) => stream.shutdown().await,
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
