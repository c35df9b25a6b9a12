//! Modbus TCP client manager for grid-tied inverters and the data manager (§4.2)
//!
//! Owns a named set of Modbus/TCP clients (real or dummy), and performs
//! per-client and fan-out reads/writes, translating Modbus exception codes
//! into the crate's error taxonomy.

mod client;

pub use client::ClientHandle;

use crate::codec::{self, DType, Scalar, Scaling};
use crate::error::{FusewattError, Result};
use crate::logging::get_logger;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::time::Duration;

/// Endpoint description for one Modbus client (§3 `ClientEndpoint`).
#[derive(Debug, Clone)]
pub struct ClientEndpoint {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub reconnect_delay: Duration,
}

impl ClientEndpoint {
    /// Whether this endpoint's host literal selects a [`client::DummyClient`]
    /// rather than a real TCP connection (§3).
    fn is_dummy(&self) -> bool {
        matches!(self.host.to_lowercase().as_str(), "test" | "debug" | "none")
    }
}

/// Owns a named set of Modbus clients and performs all register I/O on
/// behalf of the controllers (§4.2).
pub struct ModbusManager {
    clients: HashMap<String, ClientHandle>,
    closed: bool,
    logger: crate::logging::StructuredLogger,
}

impl ModbusManager {
    /// Construct a manager from a list of endpoints, without connecting.
    pub fn new(endpoints: Vec<ClientEndpoint>) -> Self {
        let logger = get_logger("modbus_manager");
        let mut clients = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let handle = if endpoint.is_dummy() {
                logger.debug(&format!("creating dummy client for {}", endpoint.name));
                ClientHandle::dummy()
            } else {
                logger.debug(&format!("creating modbus client for {}", endpoint.name));
                ClientHandle::real(endpoint.clone())
            };
            clients.insert(endpoint.name.clone(), handle);
        }
        Self { clients, closed: false, logger }
    }

    /// Open every real client. Dummies are skipped. Fails with
    /// `ConnectFailed(name)` on the first client that does not reach a
    /// connected state.
    pub async fn connect(&mut self) -> Result<()> {
        for (name, handle) in self.clients.iter_mut() {
            self.logger.debug(&format!("connecting to {name}"));
            handle.connect().await.map_err(|_| FusewattError::connect_failed(name.clone()))?;
        }
        Ok(())
    }

    /// Close all real clients. Idempotent; the manager is single-use after this.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        for handle in self.clients.values_mut() {
            handle.close().await;
        }
        self.closed = true;
    }

    fn word_count(dtype: DType) -> usize {
        codec::words_for(dtype)
    }

    /// Read a single register from the named client (§4.2).
    pub async fn read_one(
        &mut self,
        name: &str,
        address: u16,
        dtype: DType,
        device_id: u8,
        scaling: Option<&Scaling>,
    ) -> Result<Scalar> {
        if self.closed {
            return Err(FusewattError::programmer("manager is closed"));
        }
        let handle = self
            .clients
            .get_mut(name)
            .ok_or_else(|| FusewattError::programmer(format!("unknown client '{name}'")))?;

        let count = Self::word_count(dtype) as u16;
        let words = handle.read(address, count, device_id).await.map_err(|e| {
            self.logger.warn(&format!("read from '{name}' failed: {e}"));
            e
        })?;

        match words {
            None => Ok(Scalar::Int(12345)),
            Some(words) => codec::decode(dtype, &words, scaling),
        }
    }

    /// Fan out one read per real client in parallel; all-or-nothing (§4.2, §5).
    pub async fn read_all(
        &mut self,
        address: u16,
        dtype: DType,
        device_id: u8,
        scaling: Option<&Scaling>,
    ) -> Result<HashMap<String, Scalar>> {
        if self.closed {
            return Err(FusewattError::programmer("manager is closed"));
        }
        let count = Self::word_count(dtype) as u16;

        let futures = self.clients.iter_mut().map(|(name, handle)| {
            let name = name.clone();
            async move {
                let words = handle.read(address, count, device_id).await?;
                Ok::<(String, Option<Vec<u16>>), FusewattError>((name, words))
            }
        });

        let results = match try_join_all(futures).await {
            Ok(results) => results,
            Err(e) => {
                self.logger.warn(&format!("parallel read failed: {e}"));
                self.close().await;
                return Err(e);
            }
        };

        let mut out = HashMap::with_capacity(results.len());
        for (name, words) in results {
            let scalar = match words {
                None => Scalar::Int(12345),
                Some(words) => codec::decode(dtype, &words, scaling)?,
            };
            out.insert(name, scalar);
        }
        Ok(out)
    }

    /// Write to a single named client (§4.2). Dummies accept and discard.
    pub async fn write_one(
        &mut self,
        name: &str,
        address: u16,
        words: &[u16],
        device_id: u8,
    ) -> Result<()> {
        if self.closed {
            return Err(FusewattError::programmer("manager is closed"));
        }
        let handle = self
            .clients
            .get_mut(name)
            .ok_or_else(|| FusewattError::programmer(format!("unknown client '{name}'")))?;
        handle.write(address, words, device_id).await
    }

    /// Fan-out parallel write to every real client; a single failure
    /// propagates after all complete (§4.2, §5).
    pub async fn write_all(&mut self, address: u16, words: &[u16], device_id: u8) -> Result<()> {
        if self.closed {
            return Err(FusewattError::programmer("manager is closed"));
        }
        let futures = self.clients.values_mut().map(|handle| handle.write(address, words, device_id));
        try_join_all(futures).await?;
        Ok(())
    }

    /// Names of all configured clients, real and dummy.
    pub fn client_names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_endpoints(names: &[&str]) -> Vec<ClientEndpoint> {
        names
            .iter()
            .map(|n| ClientEndpoint {
                name: n.to_string(),
                host: "test".to_string(),
                port: 502,
                timeout: Duration::from_secs(5),
                reconnect_delay: Duration::from_secs(10),
            })
            .collect()
    }

    #[tokio::test]
    async fn connect_skips_dummies_and_succeeds() {
        let mut mgr = ModbusManager::new(dummy_endpoints(&["inv1", "inv2"]));
        mgr.connect().await.unwrap();
    }

    #[tokio::test]
    async fn dummy_read_returns_sentinel() {
        let mut mgr = ModbusManager::new(dummy_endpoints(&["inv1"]));
        mgr.connect().await.unwrap();
        let value = mgr.read_one("inv1", 40001, DType::U16, 3, None).await.unwrap();
        assert_eq!(value, Scalar::Int(12345));
    }

    #[tokio::test]
    async fn dummy_write_is_silently_discarded() {
        let mut mgr = ModbusManager::new(dummy_endpoints(&["inv1"]));
        mgr.connect().await.unwrap();
        mgr.write_one("inv1", 40149, &[0, 0], 3).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_client_name_is_programmer_error() {
        let mut mgr = ModbusManager::new(dummy_endpoints(&["inv1"]));
        mgr.connect().await.unwrap();
        let err = mgr.read_one("nope", 40001, DType::U16, 3, None).await.unwrap_err();
        assert!(matches!(err, FusewattError::Programmer { .. }));
    }

    #[tokio::test]
    async fn read_all_fans_out_across_all_dummy_clients() {
        let mut mgr = ModbusManager::new(dummy_endpoints(&["inv1", "inv2", "inv3"]));
        mgr.connect().await.unwrap();
        let results = mgr.read_all(30777, DType::S32, 3, None).await.unwrap();
        assert_eq!(results.len(), 3);
        for v in results.values() {
            assert_eq!(*v, Scalar::Int(12345));
        }
    }

    #[tokio::test]
    async fn after_close_operations_fail_deterministically() {
        let mut mgr = ModbusManager::new(dummy_endpoints(&["inv1"]));
        mgr.connect().await.unwrap();
        mgr.close().await;
        let err = mgr.read_one("inv1", 40001, DType::U16, 3, None).await.unwrap_err();
        assert!(matches!(err, FusewattError::Programmer { .. }));
        let err = mgr.write_one("inv1", 40149, &[0, 0], 3).await.unwrap_err();
        assert!(matches!(err, FusewattError::Programmer { .. }));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut mgr = ModbusManager::new(dummy_endpoints(&["inv1"]));
        mgr.connect().await.unwrap();
        mgr.close().await;
        mgr.close().await;
    }
}
