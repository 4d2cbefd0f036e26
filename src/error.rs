use std::result::Result as StdResult;

use thiserror::Error;

use crate::obex::ResponseCode;

pub type Result<T> = StdResult<T, Error>;

/// Result of an operation as seen by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    /// Another operation already owns the transport channel
    Busy,
    /// Empty or absent object name, or the peer has no such object
    NotFound,
    /// Write against a read-only profile, or inaccessible local file
    NoPermission,
    /// No matching service on the peer
    ServiceUnavailable,
    /// Peer storage full or request too large
    Full,
    /// Cooperative cancellation completed
    Aborted,
    /// Any other failure reported by the OBEX layer
    TransportError,
    /// No response within the configured window
    Timeout,
    /// A listing response carried neither data nor the final flag
    NoContent,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// Map an OBEX response code onto the status taxonomy.
///
/// The mapping is many-to-one, most codes collapse to [`Status::TransportError`].
pub fn status_of(code: ResponseCode) -> Status {
    use ResponseCode::*;
    match code {
        Continue | Ok | Created | Accepted => Status::Ok,
        NoContent => Status::NoContent,
        Unauthorized | Forbidden | MethodNotAllowed | NotAcceptable | DatabaseLocked => {
            Status::NoPermission
        }
        NotFound => Status::NotFound,
        Gone => Status::Aborted,
        RequestEntityTooLarge | DatabaseFull => Status::Full,
        ServiceUnavailable => Status::ServiceUnavailable,
        Conflict => Status::Busy,
        RequestTimeout | GatewayTimeout => Status::Timeout,
        NonAuthoritativeInfo | ResetContent | PartialContent | MultipleChoices
        | MovedPermanently | MovedTemporarily | SeeOther | NotModified | UseProxy | BadRequest
        | PaymentRequired | ProxyAuthenticationRequired | LengthRequired | PreconditionFailed
        | RequestUrlTooLarge | UnsupportedMediaType | InternalServerError | NotImplemented
        | BadGateway | HttpVersionNotSupported => Status::TransportError,
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport request failed: {0:?}")]
    Transport(Status),
    #[error("service discovery failed: {0:?}")]
    Discovery(Status),
    #[error("file system call-out failed: {0:?}")]
    Callout(Status),
    #[error("no transport connection")]
    NotConnected,
    #[error("event bus closed")]
    BusClosed,
    #[error("application parameter block exceeds {0} bytes")]
    AppParamOverflow(usize),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Project the error onto the status reported to the application
    pub fn status(&self) -> Status {
        match self {
            Error::Transport(status) | Error::Discovery(status) | Error::Callout(status) => {
                *status
            }
            Error::NotConnected | Error::BusClosed => Status::TransportError,
            Error::AppParamOverflow(_) => Status::Full,
            Error::Config(_) => Status::TransportError,
        }
    }
}
