//! Per-client session state.
//!
//! The control block is created on enable and dropped on disable. Everything
//! that needs releasing (the outbound packet, the local file, the timer task)
//! is owned here so dropping the block releases it.

use std::fmt;

use bytes::Bytes;

use crate::{
    bus::ResponseTimer,
    callout::{FileDescriptor, SessionInfo},
    discovery::{BdAddr, RecordHandle, ServiceClass, ServiceMask},
    error::Status,
    event::{ActionKind, ClientEvent},
    obex::{ObexHandle, ObexPacket, SecurityMask, SessionToken},
    state::State,
    tlv::PhoneBookQuery,
};

pub type Callback = Box<dyn FnMut(ClientEvent) + Send>;

/// Operation owning the transport channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetFile,
    PutFile,
    Delete,
    GetListing,
    MakeDir,
    ChangeDir,
    Copy,
    Move,
    SetPermission,
}

impl Operation {
    /// Multi-packet operations survive a suspend, single-shot ones are retried
    /// by the application instead
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            Operation::GetFile | Operation::PutFile | Operation::GetListing
        )
    }

    /// Event that reports the end of the operation to the application
    pub fn completion(self, status: Status) -> ClientEvent {
        match self {
            Operation::GetFile => ClientEvent::GetFile { status },
            Operation::PutFile => ClientEvent::PutFile { status },
            Operation::Delete => ClientEvent::Remove { status },
            Operation::GetListing => ClientEvent::Listing {
                data: Bytes::new(),
                final_packet: true,
                status,
            },
            Operation::MakeDir => ClientEvent::MkDir { status },
            Operation::ChangeDir => ClientEvent::ChDir { status },
            Operation::Copy => ClientEvent::Action {
                kind: ActionKind::Copy,
                status,
            },
            Operation::Move => ClientEvent::Action {
                kind: ActionKind::Move,
                status,
            },
            Operation::SetPermission => ClientEvent::Action {
                kind: ActionKind::SetPermission,
                status,
            },
        }
    }
}

/// What a Get pulls into the local file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GetTarget {
    #[default]
    File,
    PhoneBook(PhoneBookQuery),
    VCard(PhoneBookQuery),
}

impl GetTarget {
    pub fn query(&self) -> Option<&PhoneBookQuery> {
        match self {
            GetTarget::File => None,
            GetTarget::PhoneBook(query) | GetTarget::VCard(query) => Some(query),
        }
    }
}

/// Who asked for an abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOrigin {
    Application,
    /// Raised by the client itself, e.g. a local read failure during a Put
    Internal,
}

/// Completion steps of an abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortStep {
    RequestSent,
    ResponseReceived,
    CalloutDone,
}

/// Tracks an abort until the peer and the call-out layer have both settled.
/// Steps only ever get set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbortProgress {
    pub request_sent: bool,
    pub response_received: bool,
    pub callout_done: bool,
}

impl AbortProgress {
    pub fn merge(&mut self, step: AbortStep) {
        match step {
            AbortStep::RequestSent => self.request_sent = true,
            AbortStep::ResponseReceived => self.response_received = true,
            AbortStep::CalloutDone => self.callout_done = true,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            AbortProgress {
                request_sent: true,
                response_received: true,
                callout_done: true,
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortState {
    pub origin: AbortOrigin,
    pub progress: AbortProgress,
    /// The terminal completion has been reported
    pub finished: bool,
}

impl AbortState {
    pub fn new(origin: AbortOrigin) -> Self {
        Self {
            origin,
            progress: AbortProgress::default(),
            finished: false,
        }
    }
}

/// Reason the response timer is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPurpose {
    Abort,
    Stop,
    Suspend,
}

/// Call-out the client is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callout {
    Open,
    Read,
    Write,
    Session,
}

/// Progress of the active Get, Put or listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub offset: u64,
    pub total: Option<u64>,
    /// No response (Get) or request (Put) has been exchanged yet. Length, type
    /// and application parameters are only looked at on the first packet.
    pub first_packet: bool,
    /// The last response or read said there is no more data
    pub final_packet: bool,
    /// The first request has gone out on the wire
    pub request_sent: bool,
    /// Bytes handed to the last read or write call-out
    pub in_flight: usize,
    pub target: GetTarget,
    pub local_path: Option<String>,
    /// The local file was created by this transfer, remove it on failure
    pub created_file: bool,
}

impl TransferProgress {
    pub fn new(target: GetTarget, local_path: Option<String>) -> Self {
        Self {
            first_packet: true,
            target,
            local_path,
            ..Default::default()
        }
    }
}

/// Parameters of the open in progress
#[derive(Debug, Clone, Default)]
pub struct OpenParams {
    pub address: BdAddr,
    pub security: SecurityMask,
    /// Services not tried yet
    pub remaining: ServiceMask,
    pub reliable: bool,
    pub nonce: Option<Bytes>,
    /// Session saved by an earlier suspend
    pub resume: Option<SessionInfo>,
}

pub struct ControlBlock {
    pub state: State,
    pub app_id: u8,
    pub callback: Callback,

    pub active_operation: Option<Operation>,
    pub request_pending: bool,
    pub callout_pending: Option<Callout>,
    pub abort: Option<AbortState>,
    pub file_descriptor: Option<FileDescriptor>,
    pub pending_packet: Option<ObexPacket>,
    pub transfer: TransferProgress,

    pub session_token: Option<SessionToken>,
    /// Next reliable session sequence number
    pub sequence: u8,
    pub service_selector: Option<ServiceClass>,
    pub response_timer: ResponseTimer,

    pub handle: Option<ObexHandle>,
    pub peer_mtu: u16,
    pub version: u16,
    pub open: OpenParams,
    pub discovery_pending: bool,
    /// Open has been reported to the application
    pub opened: bool,
    /// Status reported once the close completes
    pub close_status: Option<Status>,
    pub suspended: bool,
    pub transport_closed: bool,
    pub disabling: bool,
    pub record: Option<RecordHandle>,
    /// Set once the block has been released and must be dropped
    pub released: bool,
}

impl ControlBlock {
    pub fn new(callback: Callback, app_id: u8) -> Self {
        Self {
            state: State::Idle,
            app_id,
            callback,
            active_operation: None,
            request_pending: false,
            callout_pending: None,
            abort: None,
            file_descriptor: None,
            pending_packet: None,
            transfer: TransferProgress::default(),
            session_token: None,
            sequence: 0,
            service_selector: None,
            response_timer: ResponseTimer::default(),
            handle: None,
            peer_mtu: 0,
            version: 0,
            open: OpenParams::default(),
            discovery_pending: false,
            opened: false,
            close_status: None,
            suspended: false,
            transport_closed: false,
            disabling: false,
            record: None,
            released: false,
        }
    }

    pub fn report(&mut self, event: ClientEvent) {
        (self.callback)(event)
    }

    pub fn is_aborting(&self) -> bool {
        self.abort.is_some()
    }

    /// An operation is active but neither a response nor a call-out is expected
    pub fn is_stalled(&self) -> bool {
        self.active_operation.is_some() && !self.request_pending && self.callout_pending.is_none()
    }

    /// Clear everything scoped to one open/close cycle
    pub fn clear_session(&mut self) {
        self.session_token = None;
        self.sequence = 0;
        self.service_selector = None;
        self.response_timer.clear_purpose();
        self.handle = None;
        self.peer_mtu = 0;
        self.version = 0;
        self.open = OpenParams::default();
        self.discovery_pending = false;
        self.opened = false;
        self.close_status = None;
        self.suspended = false;
        self.transport_closed = false;
    }
}

impl fmt::Debug for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("state", &self.state)
            .field("app_id", &self.app_id)
            .field("active_operation", &self.active_operation)
            .field("request_pending", &self.request_pending)
            .field("callout_pending", &self.callout_pending)
            .field("abort", &self.abort)
            .field("service_selector", &self.service_selector)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
