//! Module `data_channel`
//!
//! Produces the data connection for a single transfer from the mode
//! negotiated with PORT or PASV. Active mode connects out to the client and
//! stays configured for later transfers; passive mode accepts one connection
//! and then the listener is gone, so the next transfer needs a new PASV.

use log::{error, info};
use std::future::Future;
use std::mem;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::TransferError;
use crate::transfer::modes::DataChannel;

/// Hands out one data connection per transfer request
#[derive(Debug, Clone, Default)]
pub struct DataChannelBroker {
    timeout: Option<Duration>,
}

impl DataChannelBroker {
    /// `timeout` bounds both active connect and passive accept
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Obtains the data connection for the next transfer.
    ///
    /// A passive listener is taken out of `channel` and closed once the
    /// connection has been accepted. Active addresses are left in place.
    pub async fn obtain(
        &self,
        channel: &mut DataChannel,
        client_addr: &SocketAddr,
    ) -> Result<TcpStream, TransferError> {
        let result = match mem::take(channel) {
            DataChannel::None => Err(TransferError::NoDataChannel),
            DataChannel::Active(address) => {
                info!(
                    "Active mode: connecting to client {} at {}",
                    client_addr, address
                );
                let result = self.bounded(address.connect()).await;
                *channel = DataChannel::Active(address);
                result
            }
            DataChannel::Passive(listener) => {
                info!(
                    "Passive mode: waiting for client {} on {}",
                    client_addr,
                    listener.local_addr()
                );
                self.bounded(listener.accept()).await
            }
        };

        result.inspect_err(|e| error!("Data connection for client {} failed: {}", client_addr, e))
    }

    async fn bounded<F>(&self, fut: F) -> Result<TcpStream, TransferError>
    where
        F: Future<Output = Result<TcpStream, TransferError>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| TransferError::Timeout(limit))?,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::operations::{setup_active_mode, setup_passive_mode};
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn port_arg(addr: SocketAddr) -> String {
        let port = addr.port();
        format!("127,0,0,1,{},{}", port / 256, port % 256)
    }

    #[tokio::test]
    async fn no_channel_is_an_error() {
        let broker = DataChannelBroker::default();
        let mut channel = DataChannel::None;
        assert!(matches!(
            broker.obtain(&mut channel, &client()).await,
            Err(TransferError::NoDataChannel)
        ));
    }

    #[tokio::test]
    async fn active_mode_connects_and_persists() {
        let client_side = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = client_side.local_addr().unwrap();

        let broker = DataChannelBroker::new(Some(Duration::from_secs(5)));
        let mut channel = DataChannel::None;
        setup_active_mode(&mut channel, &port_arg(addr)).unwrap();

        for _ in 0..2 {
            let mut stream = broker.obtain(&mut channel, &client()).await.unwrap();
            let (mut accepted, _) = client_side.accept().await.unwrap();
            stream.write_all(b"hi").await.unwrap();
            drop(stream);
            let mut buf = Vec::new();
            accepted.read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf, b"hi");
            assert!(matches!(channel, DataChannel::Active(_)));
        }
    }

    #[tokio::test]
    async fn active_connect_failure_is_reported() {
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let broker = DataChannelBroker::new(Some(Duration::from_secs(5)));
        let mut channel = DataChannel::None;
        setup_active_mode(&mut channel, &port_arg(closed)).unwrap();

        assert!(matches!(
            broker.obtain(&mut channel, &client()).await,
            Err(TransferError::ConnectFailed(_, _))
        ));
        assert!(channel.is_set());
    }

    #[tokio::test]
    async fn unconnectable_port_address_is_reported() {
        let broker = DataChannelBroker::default();
        let mut channel = DataChannel::None;
        setup_active_mode(&mut channel, "256,0,0,1,1,1").unwrap();
        assert!(matches!(
            broker.obtain(&mut channel, &client()).await,
            Err(TransferError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn passive_mode_is_one_shot() {
        let broker = DataChannelBroker::new(Some(Duration::from_secs(5)));
        let mut channel = DataChannel::None;
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();
        setup_passive_mode(&mut channel, ip, Ipv4Addr::LOCALHOST).await.unwrap();
        let addr = channel.passive_addr().unwrap();

        let connector = tokio::spawn(async move { TcpStream::connect(addr).await });
        let stream = broker.obtain(&mut channel, &client()).await.unwrap();
        assert!(connector.await.unwrap().is_ok());
        drop(stream);

        assert!(!channel.is_set());
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn passive_accept_times_out() {
        let broker = DataChannelBroker::new(Some(Duration::from_millis(100)));
        let mut channel = DataChannel::None;
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();
        setup_passive_mode(&mut channel, ip, Ipv4Addr::LOCALHOST).await.unwrap();

        assert!(matches!(
            broker.obtain(&mut channel, &client()).await,
            Err(TransferError::Timeout(_))
        ));
        assert!(!channel.is_set());
    }
}
