//! Transfer operations
//!
//! Handles data channel setup for FTP active (PORT) and passive (PASV) modes.

use log::{debug, info};
use rand::Rng;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{ProtocolError, TransferError};
use crate::transfer::modes::DataChannel;

/// How many random ports PASV tries before giving up
const PASV_BIND_ATTEMPTS: usize = 16;

/// Largest value accepted for a single PORT octet
const MAX_PORT_OCTET: u16 = 256;

/// Address announced by a PORT command.
///
/// Octets are accepted up to 256 on the wire, so the host and port are kept
/// as given and only turned into a socket address when connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAddress {
    host: String,
    port: u32,
}

impl PortAddress {
    /// Parses `h1,h2,h3,h4,p1,p2` where every octet lies in [0, 256]
    pub fn parse(arg: &str) -> Result<Self, ProtocolError> {
        let octets = arg
            .split(',')
            .map(|segment| segment.trim().parse::<u16>().ok())
            .collect::<Option<Vec<u16>>>()
            .filter(|octets| octets.len() == 6)
            .filter(|octets| octets.iter().all(|&o| o <= MAX_PORT_OCTET))
            .ok_or_else(|| ProtocolError::IllegalPort(arg.to_string()))?;

        let host = octets[..4]
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(".");
        let port = u32::from(octets[4]) * 256 + u32::from(octets[5]);

        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    /// The address to connect to, if the octets form a real IPv4 endpoint
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let ip = self.host.parse::<Ipv4Addr>().ok()?;
        let port = u16::try_from(self.port).ok()?;
        Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
    }

    /// Opens the outbound data connection for active mode
    pub async fn connect(&self) -> Result<TcpStream, TransferError> {
        let addr = self
            .socket_addr()
            .ok_or_else(|| TransferError::InvalidAddress(self.to_string()))?;

        TcpStream::connect(addr)
            .await
            .map_err(|e| TransferError::ConnectFailed(self.to_string(), e))
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One-shot listener created by PASV
#[derive(Debug)]
pub struct PassiveListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    advertised: Ipv4Addr,
}

impl PassiveListener {
    /// Binds a listener on a random port p1*256+p2 with p1 in [100, 255]
    pub async fn bind(bind_ip: IpAddr, advertised: Ipv4Addr) -> Result<Self, TransferError> {
        let mut last_error = None;

        for _ in 0..PASV_BIND_ATTEMPTS {
            let (p1, p2) = random_port_octets();
            let port = u16::from(p1) * 256 + u16::from(p2);

            match TcpListener::bind((bind_ip, port)).await {
                Ok(listener) => {
                    let local_addr = listener.local_addr().map_err(TransferError::PassiveBindFailed)?;
                    return Ok(Self {
                        listener,
                        local_addr,
                        advertised,
                    });
                }
                Err(e) => {
                    debug!("Passive port {} unavailable: {}", port, e);
                    last_error = Some(e);
                }
            }
        }

        Err(TransferError::PassiveBindFailed(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrInUse, "no passive port available")
        })))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `h1,h2,h3,h4,p1,p2` as written inside the 227 reply
    pub fn reply_tuple(&self) -> String {
        let [h1, h2, h3, h4] = self.advertised.octets();
        let port = self.local_addr.port();
        format!("{},{},{},{},{},{}", h1, h2, h3, h4, port / 256, port % 256)
    }

    /// Waits for the single inbound data connection
    pub async fn accept(self) -> Result<TcpStream, TransferError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransferError::AcceptFailed)?;
        debug!("Passive data connection from {} on {}", peer, self.local_addr);
        Ok(stream)
    }
}

fn random_port_octets() -> (u8, u8) {
    let mut rng = rand::thread_rng();
    (rng.gen_range(100..=255), rng.gen_range(0..=255))
}

/// Records a PORT address on the channel, replacing any passive listener.
///
/// A malformed argument leaves the channel untouched.
pub fn setup_active_mode(
    channel: &mut DataChannel,
    arg: &str,
) -> Result<PortAddress, ProtocolError> {
    let address = PortAddress::parse(arg)?;

    if let Some(old) = channel.passive_addr() {
        info!("Closing passive listener on {} in favour of PORT", old);
    }
    *channel = DataChannel::Active(address.clone());

    Ok(address)
}

/// Replaces the channel with a freshly bound passive listener.
///
/// The previous listener is closed before the new one is bound.
pub async fn setup_passive_mode(
    channel: &mut DataChannel,
    bind_ip: IpAddr,
    advertised: Ipv4Addr,
) -> Result<String, TransferError> {
    if let Some(old) = channel.passive_addr() {
        info!("Closing previous passive listener on {}", old);
    }
    channel.close();

    let listener = PassiveListener::bind(bind_ip, advertised).await?;
    let tuple = listener.reply_tuple();
    info!("Passive data listener on {}", listener.local_addr());

    *channel = DataChannel::Passive(listener);
    Ok(tuple)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_argument_maps_to_host_and_port() {
        let addr = PortAddress::parse("127,0,0,1,200,10").unwrap();
        assert_eq!(addr.host(), "127.0.0.1");
        assert_eq!(addr.port(), 200 * 256 + 10);
        assert_eq!(addr.to_string(), "127.0.0.1:51210");
        assert_eq!(addr.socket_addr(), Some("127.0.0.1:51210".parse().unwrap()));
    }

    #[test]
    fn every_in_range_argument_parses() {
        for (o1, o5, o6) in [(0u16, 0u16, 0u16), (10, 1, 255), (192, 255, 255), (256, 256, 256)] {
            let arg = format!("{o1},168,1,2,{o5},{o6}");
            let addr = PortAddress::parse(&arg).unwrap();
            assert_eq!(addr.host(), format!("{o1}.168.1.2"));
            assert_eq!(addr.port(), u32::from(o5) * 256 + u32::from(o6));
        }
    }

    #[test]
    fn malformed_port_arguments() {
        for arg in [
            "",
            "127,0,0,1,200",
            "127,0,0,1,200,10,1",
            "127,0,0,1,257,0",
            "127,0,0,-1,1,1",
            "a,b,c,d,e,f",
            "127.0.0.1:2000",
            "127,0,0,1,,1",
        ] {
            assert!(PortAddress::parse(arg).is_err(), "{arg:?} should be rejected");
        }
    }

    #[test]
    fn octet_256_is_accepted_but_not_connectable() {
        let addr = PortAddress::parse("256,0,0,1,1,1").unwrap();
        assert_eq!(addr.socket_addr(), None);

        let addr = PortAddress::parse("127,0,0,1,256,0").unwrap();
        assert_eq!(addr.port(), 65536);
        assert_eq!(addr.socket_addr(), None);
    }

    #[test]
    fn failed_port_keeps_channel() {
        let mut channel = DataChannel::Active(PortAddress::parse("127,0,0,1,100,1").unwrap());
        assert!(setup_active_mode(&mut channel, "garbage").is_err());
        match channel {
            DataChannel::Active(addr) => assert_eq!(addr.port(), 25601),
            other => panic!("channel changed: {other:?}"),
        }
    }

    #[test]
    fn random_octets_stay_in_range() {
        for _ in 0..1000 {
            let (p1, _) = random_port_octets();
            assert!(p1 >= 100);
        }
    }

    #[tokio::test]
    async fn pasv_replaces_previous_listener() {
        let mut channel = DataChannel::None;
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();

        setup_passive_mode(&mut channel, ip, Ipv4Addr::LOCALHOST).await.unwrap();
        let first = channel.passive_addr().unwrap();

        let tuple = setup_passive_mode(&mut channel, ip, Ipv4Addr::LOCALHOST).await.unwrap();
        let second = channel.passive_addr().unwrap();

        let parts: Vec<u16> = tuple.split(',').map(|p| p.parse().unwrap()).collect();
        assert_eq!(&parts[..4], &[127, 0, 0, 1]);
        assert_eq!(parts[4] * 256 + parts[5], second.port());

        if first != second {
            // the first listener was dropped, so its port no longer accepts
            assert!(TcpStream::connect(first).await.is_err());
        }
    }

    #[tokio::test]
    async fn port_replaces_passive_listener() {
        let mut channel = DataChannel::None;
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();
        setup_passive_mode(&mut channel, ip, Ipv4Addr::LOCALHOST).await.unwrap();
        let passive = channel.passive_addr().unwrap();

        setup_active_mode(&mut channel, "127,0,0,1,100,1").unwrap();
        assert!(matches!(channel, DataChannel::Active(_)));
        assert!(TcpStream::connect(passive).await.is_err());
    }
}
