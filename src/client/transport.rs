//! The TCP / TLS byte transport underneath a client.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::{HandshakeError, TlsConnector, TlsStream};

use super::ClientOptions;

/// An error raised while opening the transport.
pub(super) type ConnectError = Box<dyn std::error::Error + Send + Sync>;

/// A connected byte-duplex to the router.
pub(super) enum Transport {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    #[cfg(test)]
    Mock(mock::MockStream),
}

impl Transport {
    /// Opens a socket to the router described by `options` within its
    /// connect timeout, wrapping it in TLS when requested.
    pub(super) fn open(options: &ClientOptions) -> Result<Self, ConnectError> {
        let stream = connect_tcp(
            options.host(),
            options.effective_port(),
            options.connect_timeout(),
        )?;

        if !options.is_ssl() {
            return Ok(Self::Tcp(stream));
        }

        // Routers ship self-signed certificates; the API contract is
        // encryption without CA or hostname validation.
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;

        // The handshake is bounded by the connect timeout too; a router
        // that accepts the socket but stalls mid-handshake must not hang
        // the connect call.
        stream.set_read_timeout(Some(options.connect_timeout()))?;
        stream.set_write_timeout(Some(options.connect_timeout()))?;

        let stream = connector
            .connect(options.host(), stream)
            .map_err(|err| match err {
                HandshakeError::Failure(err) => ConnectError::from(err),
                HandshakeError::WouldBlock(_) => {
                    ConnectError::from(io::Error::new(
                        io::ErrorKind::WouldBlock,
                        "TLS handshake interrupted",
                    ))
                }
            })?;

        // Commands block in reads indefinitely once connected.
        stream.get_ref().set_read_timeout(None)?;
        stream.get_ref().set_write_timeout(None)?;

        Ok(Self::Tls(Box::new(stream)))
    }

    /// Shuts both directions of the connection down.
    pub(super) fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            Self::Tls(stream) => stream.get_ref().shutdown(Shutdown::Both),
            #[cfg(test)]
            Self::Mock(stream) => stream.shutdown(),
        }
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, ConnectError> {
    let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "host resolved to no addresses")
    })?;

    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_nodelay(true)?;

    Ok(stream)
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
            #[cfg(test)]
            Self::Mock(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
            #[cfg(test)]
            Self::Mock(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
            #[cfg(test)]
            Self::Mock(stream) => stream.flush(),
        }
    }
}
