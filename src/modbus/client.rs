//! Per-endpoint Modbus client: a real TCP connection or a dummy stand-in
//! used for tests and the `host: test|debug|none` configuration escape hatch.

use super::ClientEndpoint;
use crate::error::{FusewattError, Result};
use tokio::time::timeout;
use tokio_modbus::client::tcp;
use tokio_modbus::prelude::*;

/// A single Modbus endpoint: either a live TCP connection or a dummy.
pub enum ClientHandle {
    Real(RealClient),
    Dummy,
}

impl ClientHandle {
    pub(super) fn real(endpoint: ClientEndpoint) -> Self {
        ClientHandle::Real(RealClient::new(endpoint))
    }

    pub(super) fn dummy() -> Self {
        ClientHandle::Dummy
    }

    pub(super) async fn connect(&mut self) -> Result<()> {
        match self {
            ClientHandle::Real(client) => client.connect().await,
            ClientHandle::Dummy => Ok(()),
        }
    }

    pub(super) async fn close(&mut self) {
        if let ClientHandle::Real(client) = self {
            client.close();
        }
    }

    /// Read `count` registers starting at `address`, dispatching to holding
    /// or input registers by the leading digit of `address` (§4.2, §6).
    /// Returns `None` for dummy clients (sentinel handled by the manager).
    pub(super) async fn read(
        &mut self,
        address: u16,
        count: u16,
        device_id: u8,
    ) -> Result<Option<Vec<u16>>> {
        match self {
            ClientHandle::Dummy => Ok(None),
            ClientHandle::Real(client) => client.read(address, count, device_id).await.map(Some),
        }
    }

    /// Write `words` starting at `address`. Dummies accept and discard silently.
    pub(super) async fn write(&mut self, address: u16, words: &[u16], device_id: u8) -> Result<()> {
        match self {
            ClientHandle::Dummy => Ok(()),
            ClientHandle::Real(client) => client.write(address, words, device_id).await,
        }
    }
}

/// A live Modbus/TCP connection, lazily (re)connected by the owning manager.
pub struct RealClient {
    endpoint: ClientEndpoint,
    context: Option<tokio_modbus::client::Context>,
}

impl RealClient {
    fn new(endpoint: ClientEndpoint) -> Self {
        Self { endpoint, context: None }
    }

    async fn connect(&mut self) -> Result<()> {
        let address = format!("{}:{}", self.endpoint.host, self.endpoint.port);
        let socket_addr: std::net::SocketAddr = address
            .parse()
            .map_err(|e| FusewattError::transport(self.endpoint.name.clone(), format!("invalid address: {e}")))?;

        match timeout(self.endpoint.timeout, tcp::connect(socket_addr)).await {
            Ok(Ok(ctx)) => {
                self.context = Some(ctx);
                Ok(())
            }
            Ok(Err(e)) => Err(FusewattError::transport(self.endpoint.name.clone(), e.to_string())),
            Err(_) => Err(FusewattError::transport(self.endpoint.name.clone(), "connect timeout")),
        }
    }

    fn close(&mut self) {
        self.context = None;
    }

    fn context_mut(&mut self) -> Result<&mut tokio_modbus::client::Context> {
        self.context
            .as_mut()
            .ok_or_else(|| FusewattError::connect_failed(self.endpoint.name.clone()))
    }

    /// Leading digit of a register address selects the register class
    /// (§4.2, §6): `3` = input register, `4` = holding register, anything
    /// else is a programmer error.
    async fn read(&mut self, address: u16, count: u16, device_id: u8) -> Result<Vec<u16>> {
        let name = self.endpoint.name.clone();
        let timeout_duration = self.endpoint.timeout;
        let prefix = address.to_string().chars().next();
        let ctx = self.context_mut()?;
        ctx.set_slave(Slave(device_id));

        let request = match prefix {
            Some('4') => timeout(timeout_duration, ctx.read_holding_registers(address, count)),
            Some('3') => timeout(timeout_duration, ctx.read_input_registers(address, count)),
            _ => {
                return Err(FusewattError::programmer(format!(
                    "unrecognized register address prefix for {address}"
                )));
            }
        };

        match request.await {
            Ok(Ok(Ok(words))) => Ok(words),
            Ok(Ok(Err(exception))) => Err(FusewattError::modbus(u8::from(exception))),
            Ok(Err(io_err)) => Err(FusewattError::transport(name, io_err.to_string())),
            Err(_) => Err(FusewattError::transport(name, "read operation timed out")),
        }
    }

    async fn write(&mut self, address: u16, words: &[u16], device_id: u8) -> Result<()> {
        let name = self.endpoint.name.clone();
        let timeout_duration = self.endpoint.timeout;
        let ctx = self.context_mut()?;
        ctx.set_slave(Slave(device_id));

        match timeout(timeout_duration, ctx.write_multiple_registers(address, words)).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(exception))) => Err(FusewattError::modbus(u8::from(exception))),
            Ok(Err(io_err)) => Err(FusewattError::transport(name, io_err.to_string())),
            Err(_) => Err(FusewattError::transport(name, "write operation timed out")),
        }
    }
}
