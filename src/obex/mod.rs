//! The OBEX engine as seen by the client.
//!
//! Header encoding, segmentation and link security are owned by the transport.
//! Requests are issued through [`ObexTransport`] and every response comes back
//! later as an [`ObexEvent`] on the event bus.

use std::fmt;

use bitflags::bitflags;
use bytes::Bytes;

use crate::{discovery::BdAddr, error::Result};

pub mod packet;
pub mod response;

pub use packet::{ActionId, Header, HeaderId, ObexPacket};
pub use response::ResponseCode;

/// Handle of a transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObexHandle(pub u16);

bitflags! {
    /// Link security requested when connecting
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SecurityMask: u8 {
        const AUTHORIZE = 0b00000001;
        const AUTHENTICATE = 0b00000010;
        const ENCRYPT = 0b00000100;
        const MITM = 0b00001000;
    }
}

bitflags! {
    /// SetPath flags (IrOBEX 3.3.6)
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SetPathFlags: u8 {
        /// Back up one level before applying the name
        const BACKUP = 0b00000001;
        /// Don't create the folder if it does not exist
        const NO_CREATE = 0b00000010;
    }
}

/// Where the peer's service was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Rfcomm(u8),
    L2cap(u16),
}

/// Reliable session identifier (OBEX 1.5 session id)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionToken(pub [u8; 16]);

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", hex::encode(self.0))
    }
}

/// Reliable session parameters sent with a connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReliableSession {
    /// Create a new session with the client nonce
    Create { nonce: Bytes },
    /// Resume a suspended session at the saved sequence number
    Resume { token: SessionToken, sequence: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub address: BdAddr,
    pub channel: Channel,
    pub security: SecurityMask,
    /// Largest packet we accept
    pub mtu: u16,
    pub reliable: Option<ReliableSession>,
}

/// Session operations (OBEX 1.5 session opcode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Create,
    Close,
    Suspend,
    Resume,
    SetTimeout,
}

/// Session state granted by the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGrant {
    pub token: SessionToken,
    pub sequence: u8,
    /// The peer resumed a previously suspended session
    pub resumed: bool,
}

/// Where a session was interrupted when the link dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspendPoint {
    pub sequence: u8,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObexEventKind {
    ConnectRsp {
        peer_mtu: u16,
        session: Option<SessionGrant>,
    },
    PutRsp,
    GetRsp,
    SetPathRsp,
    ActionRsp,
    AbortRsp,
    SessionRsp {
        op: SessionOp,
    },
    /// Authentication challenge from the peer
    Password {
        realm: Option<Bytes>,
        charset: u8,
        userid_required: bool,
    },
    /// The transport connection is gone. A reliable session that was
    /// implicitly suspended reports where it stopped.
    Close {
        suspended: Option<SuspendPoint>,
    },
}

/// A response or indication delivered by the transport.
/// The client owns the packet once the event is posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObexEvent {
    pub handle: ObexHandle,
    pub kind: ObexEventKind,
    pub response: ResponseCode,
    pub packet: Option<ObexPacket>,
}

/// Requests the client can issue. Packets are moved into the transport on send.
pub trait ObexTransport: Send {
    fn connect(&mut self, request: ConnectRequest, packet: ObexPacket) -> Result<ObexHandle>;

    /// Graceful disconnect, completes with [`ObexEventKind::Close`]
    fn disconnect(&mut self, handle: ObexHandle) -> Result<()>;

    /// Drop the link without waiting for the peer
    fn force_close(&mut self, handle: ObexHandle);

    fn put(&mut self, handle: ObexHandle, final_packet: bool, packet: ObexPacket) -> Result<()>;

    fn get(&mut self, handle: ObexHandle, final_packet: bool, packet: ObexPacket) -> Result<()>;

    fn set_path(
        &mut self,
        handle: ObexHandle,
        flags: SetPathFlags,
        packet: ObexPacket,
    ) -> Result<()>;

    fn action(&mut self, handle: ObexHandle, packet: ObexPacket) -> Result<()>;

    fn abort(&mut self, handle: ObexHandle, packet: Option<ObexPacket>) -> Result<()>;

    fn session(&mut self, handle: ObexHandle, op: SessionOp) -> Result<()>;

    fn auth_response(
        &mut self,
        handle: ObexHandle,
        password: &[u8],
        userid: Option<&[u8]>,
    ) -> Result<()>;
}
