//! Service discovery contract.
//!
//! Discovery is a one-shot request, the result comes back as
//! [`crate::event::Event::Sdp`].

use std::fmt;

use bitflags::bitflags;

use crate::{error::Result, obex::Channel};

/// Bluetooth device address, most significant byte first
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr(pub [u8; 6]);

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BdAddr({self})")
    }
}

/// Object exchange profiles the client can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceClass {
    FileTransfer,
    PhoneBookAccess,
    ObjectPush,
    Imaging,
}

impl ServiceClass {
    /// Order in which services are tried when several are requested
    pub const PREFERENCE: [ServiceClass; 4] = [
        ServiceClass::FileTransfer,
        ServiceClass::PhoneBookAccess,
        ServiceClass::ObjectPush,
        ServiceClass::Imaging,
    ];

    pub fn mask(self) -> ServiceMask {
        match self {
            ServiceClass::FileTransfer => ServiceMask::FTP,
            ServiceClass::PhoneBookAccess => ServiceMask::PBAP,
            ServiceClass::ObjectPush => ServiceMask::OPP,
            ServiceClass::Imaging => ServiceMask::BIP,
        }
    }

    pub fn allows_put(self) -> bool {
        !matches!(self, ServiceClass::PhoneBookAccess)
    }

    pub fn allows_get(self) -> bool {
        matches!(
            self,
            ServiceClass::FileTransfer | ServiceClass::PhoneBookAccess
        )
    }

    /// Moving between folders with SetPath. Phone-book access uses it to
    /// select a phone book.
    pub fn allows_set_path(self) -> bool {
        matches!(
            self,
            ServiceClass::FileTransfer | ServiceClass::PhoneBookAccess
        )
    }

    /// Operations that change the remote folder tree (mkdir, delete, actions)
    pub fn allows_folders(self) -> bool {
        matches!(self, ServiceClass::FileTransfer)
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ServiceMask: u8 {
        const FTP = 0b00000001;
        const PBAP = 0b00000010;
        const OPP = 0b00000100;
        const BIP = 0b00001000;
    }
}

impl ServiceMask {
    /// The most preferred service still in the mask
    pub fn first(self) -> Option<ServiceClass> {
        ServiceClass::PREFERENCE
            .into_iter()
            .find(|service| self.contains(service.mask()))
    }
}

/// Outcome of a discovery request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpResult {
    Found {
        service: ServiceClass,
        channel: Channel,
        /// Profile version advertised by the peer, e.g. 0x0102
        version: u16,
    },
    NotFound {
        service: ServiceClass,
    },
}

/// Handle of a locally registered service record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHandle(pub u32);

pub trait ServiceDiscovery: Send {
    /// Search the peer for `service`, using a scratch database of `db_size` bytes
    fn discover(&mut self, address: BdAddr, service: ServiceClass, db_size: usize) -> Result<()>;

    /// Advertise the client role locally
    fn register_record(&mut self, services: ServiceMask) -> Result<RecordHandle>;

    fn remove_record(&mut self, handle: RecordHandle);
}
