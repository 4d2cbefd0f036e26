//! Runtime configuration of the client

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_ABORT_TIMEOUT_MS, DEFAULT_SDP_DB_SIZE, DEFAULT_STOP_TIMEOUT_MS,
        DEFAULT_SUSPEND_TIMEOUT_MS, OBEX_DEFAULT_MTU, OBEX_MIN_MTU,
    },
    error::Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Wait for the peer to answer an abort
    pub abort_timeout_ms: u64,
    /// Wait for the peer to answer a disconnect
    pub stop_timeout_ms: u64,
    /// Wait for the peer to answer a session suspend
    pub suspend_timeout_ms: u64,
    /// List the root folder after a fresh File Transfer open
    pub auto_list_root: bool,
    /// Register a local service record on enable
    pub advertise_service: bool,
    /// Largest packet offered to the peer at connect
    pub obex_mtu: u16,
    pub sdp_db_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            abort_timeout_ms: DEFAULT_ABORT_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            suspend_timeout_ms: DEFAULT_SUSPEND_TIMEOUT_MS,
            auto_list_root: false,
            advertise_service: false,
            obex_mtu: OBEX_DEFAULT_MTU,
            sdp_db_size: DEFAULT_SDP_DB_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn abort_timeout(&self) -> Duration {
        Duration::from_millis(self.abort_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn suspend_timeout(&self) -> Duration {
        Duration::from_millis(self.suspend_timeout_ms)
    }

    /// Packet size used for requests once the peer's limit is known
    pub fn packet_size(&self, peer_mtu: u16) -> usize {
        let local = self.obex_mtu.max(OBEX_MIN_MTU);
        let peer = if peer_mtu == 0 {
            OBEX_MIN_MTU
        } else {
            peer_mtu.max(OBEX_MIN_MTU)
        };
        local.min(peer) as usize
    }
}
