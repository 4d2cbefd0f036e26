//! Events consumed by the dispatcher and events reported to the application

use bytes::Bytes;

use crate::{
    callout::{CalloutStatus, FileDescriptor, SessionInfo},
    discovery::{BdAddr, SdpResult, ServiceClass, ServiceMask},
    error::Status,
    obex::{ObexEvent, ObexEventKind, SecurityMask},
    session::TimerPurpose,
    tlv::{ListingQuery, PhoneBookQuery, VCardFilter, VCardFormat},
};

/// SetPath target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChDir {
    Root,
    Parent,
    Child(String),
}

/// Single-shot OBEX Action operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Copy,
    Move,
    SetPermission,
}

/// Permission bits of the Action permissions header (IrOBEX 3.4.8.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    pub user: u8,
    pub group: u8,
    pub other: u8,
}

impl Permissions {
    pub fn to_header_value(self) -> u32 {
        (self.user as u32) << 16 | (self.group as u32) << 8 | self.other as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub address: BdAddr,
    pub security: SecurityMask,
    pub services: ServiceMask,
    pub reliable: bool,
    pub nonce: Option<Bytes>,
}

/// Application requests, posted by [`crate::client::ClientHandle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    Disable,
    Open(OpenRequest),
    Close,
    PutFile {
        local_path: String,
    },
    GetFile {
        remote: String,
        local_path: String,
    },
    GetPhoneBook {
        remote: String,
        local_path: String,
        query: PhoneBookQuery,
    },
    GetVCard {
        remote: String,
        local_path: String,
        filter: VCardFilter,
        format: VCardFormat,
    },
    ListDir {
        path: String,
    },
    ListPhoneBook {
        path: String,
        query: ListingQuery,
    },
    ChDir(ChDir),
    MakeDir {
        name: String,
    },
    Remove {
        name: String,
    },
    Copy {
        source: String,
        destination: String,
    },
    Move {
        source: String,
        destination: String,
    },
    SetPermission {
        name: String,
        permissions: Permissions,
    },
    Abort,
    Suspend,
    AuthResponse {
        password: Bytes,
        userid: Option<Bytes>,
    },
}

/// Everything the dispatcher consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Api(ApiRequest),
    Sdp(SdpResult),
    /// Try the next requested service after a discovery failure
    NextService,
    Obex(ObexEvent),
    CiOpen {
        status: CalloutStatus,
        fd: Option<FileDescriptor>,
        size: Option<u64>,
    },
    CiRead {
        status: CalloutStatus,
        fd: FileDescriptor,
        data: Bytes,
    },
    CiWrite {
        status: CalloutStatus,
        fd: FileDescriptor,
    },
    CiSession {
        info: Option<SessionInfo>,
    },
    ResponseTimeout {
        purpose: TimerPurpose,
        generation: u64,
    },
    /// Raised internally to close the session with a status
    CloseRequest {
        status: Status,
    },
    /// A suspend was asked for on a session that can't be suspended
    SuspendRejected,
    CloseComplete,
}

/// Key of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ApiDisable,
    ApiOpen,
    ApiClose,
    ApiPutFile,
    ApiGetFile,
    ApiGetPhoneBook,
    ApiGetVCard,
    ApiListDir,
    ApiListPhoneBook,
    ApiChDir,
    ApiMakeDir,
    ApiRemove,
    ApiAction,
    ApiAbort,
    ApiSuspend,
    ApiAuthResponse,
    SdpOk,
    SdpFail,
    NextService,
    ObxConnectRsp,
    ObxPutRsp,
    ObxGetRsp,
    ObxSetPathRsp,
    ObxActionRsp,
    ObxAbortRsp,
    ObxSessionRsp,
    ObxPassword,
    ObxClose,
    CiOpen,
    CiRead,
    CiWrite,
    CiSession,
    ResponseTimeout,
    CloseRequest,
    SuspendRejected,
    CloseComplete,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Api(request) => match request {
                ApiRequest::Disable => EventKind::ApiDisable,
                ApiRequest::Open(_) => EventKind::ApiOpen,
                ApiRequest::Close => EventKind::ApiClose,
                ApiRequest::PutFile { .. } => EventKind::ApiPutFile,
                ApiRequest::GetFile { .. } => EventKind::ApiGetFile,
                ApiRequest::GetPhoneBook { .. } => EventKind::ApiGetPhoneBook,
                ApiRequest::GetVCard { .. } => EventKind::ApiGetVCard,
                ApiRequest::ListDir { .. } => EventKind::ApiListDir,
                ApiRequest::ListPhoneBook { .. } => EventKind::ApiListPhoneBook,
                ApiRequest::ChDir(_) => EventKind::ApiChDir,
                ApiRequest::MakeDir { .. } => EventKind::ApiMakeDir,
                ApiRequest::Remove { .. } => EventKind::ApiRemove,
                ApiRequest::Copy { .. }
                | ApiRequest::Move { .. }
                | ApiRequest::SetPermission { .. } => EventKind::ApiAction,
                ApiRequest::Abort => EventKind::ApiAbort,
                ApiRequest::Suspend => EventKind::ApiSuspend,
                ApiRequest::AuthResponse { .. } => EventKind::ApiAuthResponse,
            },
            Event::Sdp(SdpResult::Found { .. }) => EventKind::SdpOk,
            Event::Sdp(SdpResult::NotFound { .. }) => EventKind::SdpFail,
            Event::NextService => EventKind::NextService,
            Event::Obex(obex) => match obex.kind {
                ObexEventKind::ConnectRsp { .. } => EventKind::ObxConnectRsp,
                ObexEventKind::PutRsp => EventKind::ObxPutRsp,
                ObexEventKind::GetRsp => EventKind::ObxGetRsp,
                ObexEventKind::SetPathRsp => EventKind::ObxSetPathRsp,
                ObexEventKind::ActionRsp => EventKind::ObxActionRsp,
                ObexEventKind::AbortRsp => EventKind::ObxAbortRsp,
                ObexEventKind::SessionRsp { .. } => EventKind::ObxSessionRsp,
                ObexEventKind::Password { .. } => EventKind::ObxPassword,
                ObexEventKind::Close { .. } => EventKind::ObxClose,
            },
            Event::CiOpen { .. } => EventKind::CiOpen,
            Event::CiRead { .. } => EventKind::CiRead,
            Event::CiWrite { .. } => EventKind::CiWrite,
            Event::CiSession { .. } => EventKind::CiSession,
            Event::ResponseTimeout { .. } => EventKind::ResponseTimeout,
            Event::CloseRequest { .. } => EventKind::CloseRequest,
            Event::SuspendRejected => EventKind::SuspendRejected,
            Event::CloseComplete => EventKind::CloseComplete,
        }
    }

    /// Completion of an open, read or write call-out
    pub fn is_file_callout(&self) -> bool {
        matches!(
            self,
            Event::CiOpen { .. } | Event::CiRead { .. } | Event::CiWrite { .. }
        )
    }

    pub fn is_callout(&self) -> bool {
        self.is_file_callout() || matches!(self, Event::CiSession { .. })
    }
}

/// Events reported to the application callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Enable {
        status: Status,
    },
    Disable,
    Open {
        status: Status,
        service: Option<ServiceClass>,
        version: u16,
        /// A suspended session was resumed
        resumed: bool,
    },
    Close {
        status: Status,
        /// The session was suspended and can be resumed later
        suspended: bool,
    },
    PutFile {
        status: Status,
    },
    GetFile {
        status: Status,
    },
    Progress {
        bytes: usize,
        total: Option<u64>,
    },
    Listing {
        data: Bytes,
        final_packet: bool,
        status: Status,
    },
    ChDir {
        status: Status,
    },
    MkDir {
        status: Status,
    },
    Remove {
        status: Status,
    },
    Action {
        kind: ActionKind,
        status: Status,
    },
    Auth {
        realm: Option<Bytes>,
        charset: u8,
        userid_required: bool,
    },
    PhoneBook {
        size: Option<u16>,
        missed_calls: Option<u8>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_header_value() {
        let permissions = Permissions {
            user: 0b111,
            group: 0b101,
            other: 0b001,
        };
        assert_eq!(permissions.to_header_value(), 0x0007_0501);
    }

    #[test]
    fn test_copy_move_and_permission_share_a_kind() {
        let copy = Event::Api(ApiRequest::Copy {
            source: "a".into(),
            destination: "b".into(),
        });
        let permission = Event::Api(ApiRequest::SetPermission {
            name: "a".into(),
            permissions: Permissions::default(),
        });
        assert_eq!(copy.kind(), EventKind::ApiAction);
        assert_eq!(permission.kind(), EventKind::ApiAction);
    }
}
