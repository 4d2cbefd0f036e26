//! File system call-outs.
//!
//! `open`, `read` and `write` complete asynchronously through
//! [`crate::event::Event::CiOpen`], [`crate::event::Event::CiRead`] and
//! [`crate::event::Event::CiWrite`]. At most one of them is pending at a time.

use bitflags::bitflags;
use bytes::Bytes;

use crate::{
    error::{Result, Status},
    obex::SessionToken,
    session::Operation,
};

/// Local file handle handed out by the call-out layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDescriptor(pub u32);

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct OpenMode: u8 {
        const READ = 0b00000001;
        const WRITE = 0b00000010;
        const CREATE = 0b00000100;
        const TRUNCATE = 0b00001000;
        const APPEND = 0b00010000;
    }
}

/// Completion status of a call-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutStatus {
    Ok,
    /// A read reached end of file, the returned data is the last segment
    Eof,
    NoPermission,
    NotFound,
    Full,
    Fail,
}

impl CalloutStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, CalloutStatus::Ok | CalloutStatus::Eof)
    }

    pub fn status(self) -> Status {
        match self {
            CalloutStatus::Ok | CalloutStatus::Eof => Status::Ok,
            CalloutStatus::NoPermission => Status::NoPermission,
            CalloutStatus::NotFound => Status::NotFound,
            CalloutStatus::Full => Status::Full,
            CalloutStatus::Fail => Status::TransportError,
        }
    }
}

/// What was saved about a reliable session when it got suspended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub token: SessionToken,
    /// Next sequence number to use once resumed
    pub sequence: u8,
    /// Operation that was in progress, `None` if the session was idle
    pub operation: Option<Operation>,
    /// Local file of a transfer that was in progress
    pub local_path: Option<String>,
    /// Bytes transferred before the suspend
    pub offset: u64,
    pub total: Option<u64>,
}

pub trait FsCallout: Send {
    /// Open `path`, starting at `offset` for reads
    fn open(&mut self, path: &str, mode: OpenMode, offset: u64, app_id: u8) -> Result<()>;

    /// Read up to `len` bytes
    fn read(&mut self, fd: FileDescriptor, len: usize, app_id: u8) -> Result<()>;

    fn write(&mut self, fd: FileDescriptor, data: Bytes, app_id: u8) -> Result<()>;

    fn close(&mut self, fd: FileDescriptor, app_id: u8) -> Result<()>;

    fn unlink(&mut self, path: &str, app_id: u8) -> Result<()>;

    /// Persist the state of a suspended session
    fn suspend(&mut self, info: SessionInfo, app_id: u8) -> Result<()>;

    /// Ask for the last suspended session, completes with `CiSession`
    fn resume(&mut self, app_id: u8) -> Result<()>;
}
