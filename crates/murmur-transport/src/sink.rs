use std::io;
use std::net::{ToSocketAddrs, UdpSocket};

/// Raw datagram send primitive the transport hands finished packets to.
/// Implementations must not block the audio thread beyond a socket write.
pub trait DatagramSink: Send + Sync {
    fn send(&self, packet: &[u8]) -> io::Result<usize>;
}

/// Connected UDP socket sink.
pub struct UdpDatagramSink {
    socket: UdpSocket,
}

impl UdpDatagramSink {
    pub fn connect(remote: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(remote)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }
}

impl DatagramSink for UdpDatagramSink {
    fn send(&self, packet: &[u8]) -> io::Result<usize> {
        self.socket.send(packet)
    }
}
