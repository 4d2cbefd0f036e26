use bytes::Bytes;

use crate::constants::{OBEX_HEADER_OVERHEAD, OBEX_REQUEST_OVERHEAD};

/// Header identifiers (IrOBEX 2.1)
///
/// The two high bits select the encoding:
/// - 00 null terminated unicode, 2 byte length
/// - 01 byte sequence, 2 byte length
/// - 10 single byte
/// - 11 four byte quantity
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderId {
    Name = 0x01,
    DestName = 0x15,
    Type = 0x42,
    Target = 0x46,
    Body = 0x48,
    EndOfBody = 0x49,
    Who = 0x4A,
    AppParameters = 0x4C,
    SessionParameters = 0x52,
    SessionSequenceNumber = 0x93,
    ActionId = 0x94,
    SingleResponseMode = 0x97,
    Length = 0xC3,
    ConnectionId = 0xCB,
    Permissions = 0xD6,
}

/// Action identifiers for the Action operation (IrOBEX 3.4.8)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionId {
    Copy = 0x00,
    Move = 0x01,
    SetPermissions = 0x02,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Name(String),
    DestName(String),
    Type(String),
    Target(Bytes),
    Body(Bytes),
    EndOfBody(Bytes),
    Who(Bytes),
    AppParameters(Bytes),
    SessionSequenceNumber(u8),
    ActionId(ActionId),
    Length(u32),
    ConnectionId(u32),
    Permissions(u32),
}

impl Header {
    pub fn id(&self) -> HeaderId {
        match self {
            Header::Name(_) => HeaderId::Name,
            Header::DestName(_) => HeaderId::DestName,
            Header::Type(_) => HeaderId::Type,
            Header::Target(_) => HeaderId::Target,
            Header::Body(_) => HeaderId::Body,
            Header::EndOfBody(_) => HeaderId::EndOfBody,
            Header::Who(_) => HeaderId::Who,
            Header::AppParameters(_) => HeaderId::AppParameters,
            Header::SessionSequenceNumber(_) => HeaderId::SessionSequenceNumber,
            Header::ActionId(_) => HeaderId::ActionId,
            Header::Length(_) => HeaderId::Length,
            Header::ConnectionId(_) => HeaderId::ConnectionId,
            Header::Permissions(_) => HeaderId::Permissions,
        }
    }

    /// Number of bytes the header takes on the wire
    pub fn encoded_len(&self) -> usize {
        match self {
            // UTF-16 with a null terminator. An empty name is sent without one.
            Header::Name(text) | Header::DestName(text) => {
                let units = text.encode_utf16().count();
                if units == 0 {
                    OBEX_HEADER_OVERHEAD
                } else {
                    OBEX_HEADER_OVERHEAD + (units + 1) * 2
                }
            }
            // Null terminated ASCII
            Header::Type(text) => OBEX_HEADER_OVERHEAD + text.len() + 1,
            Header::Target(data)
            | Header::Body(data)
            | Header::EndOfBody(data)
            | Header::Who(data)
            | Header::AppParameters(data) => OBEX_HEADER_OVERHEAD + data.len(),
            Header::SessionSequenceNumber(_) | Header::ActionId(_) => 2,
            Header::Length(_) | Header::ConnectionId(_) | Header::Permissions(_) => 5,
        }
    }
}

/// An OBEX request or response as a list of headers.
///
/// The byte encoding is owned by the transport, this type only keeps track of
/// how much room is left within the negotiated packet size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObexPacket {
    headers: Vec<Header>,
    capacity: usize,
}

impl ObexPacket {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            headers: Vec::with_capacity(4),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, header: Header) -> &mut Self {
        self.headers.push(header);
        self
    }

    pub fn with(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn encoded_len(&self) -> usize {
        OBEX_REQUEST_OVERHEAD + self.headers.iter().map(Header::encoded_len).sum::<usize>()
    }

    /// Bytes available for a body header's payload
    pub fn body_room(&self) -> usize {
        self.capacity
            .saturating_sub(self.encoded_len() + OBEX_HEADER_OVERHEAD)
    }

    pub fn name(&self) -> Option<&str> {
        self.headers.iter().find_map(|header| match header {
            Header::Name(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn length(&self) -> Option<u32> {
        self.headers.iter().find_map(|header| match header {
            Header::Length(length) => Some(*length),
            _ => None,
        })
    }

    pub fn app_parameters(&self) -> Option<&Bytes> {
        self.headers.iter().find_map(|header| match header {
            Header::AppParameters(data) => Some(data),
            _ => None,
        })
    }

    /// Remove the body from the packet.
    /// Returns the data and whether it was carried in an end-of-body header.
    pub fn take_body(&mut self) -> Option<(Bytes, bool)> {
        let index = self
            .headers
            .iter()
            .position(|header| matches!(header, Header::Body(_) | Header::EndOfBody(_)))?;
        match self.headers.remove(index) {
            Header::Body(data) => Some((data, false)),
            Header::EndOfBody(data) => Some((data, true)),
            _ => None,
        }
    }
}
