//! PBAP application parameters (PBAP 1.2 6.2.1)
//!
//! Each parameter is a single byte tag, a single byte length and the value,
//! multi-byte values in network order.

use bitflags::bitflags;
use bytes::{Buf, Bytes};
use tracing::warn;

use crate::{
    constants::{app_param_tag as tag, APP_PARAM_BLOCK_LEN},
    error::{Error, Result},
};

pub type AppParamBlock = heapless::Vec<u8, APP_PARAM_BLOCK_LEN>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Indexed = 0x00,
    Alphanumeric = 0x01,
    Phonetic = 0x02,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAttribute {
    Name = 0x00,
    Number = 0x01,
    Sound = 0x02,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VCardFormat {
    #[default]
    V21 = 0x00,
    V30 = 0x01,
}

bitflags! {
    /// vCard property selector (PBAP 1.2 5.1.4.1)
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct VCardFilter: u64 {
        const VERSION = 1 << 0;
        const FN = 1 << 1;
        const N = 1 << 2;
        const PHOTO = 1 << 3;
        const BDAY = 1 << 4;
        const ADR = 1 << 5;
        const LABEL = 1 << 6;
        const TEL = 1 << 7;
        const EMAIL = 1 << 8;
        const MAILER = 1 << 9;
        const TZ = 1 << 10;
        const GEO = 1 << 11;
        const TITLE = 1 << 12;
        const ROLE = 1 << 13;
        const LOGO = 1 << 14;
        const AGENT = 1 << 15;
        const ORG = 1 << 16;
        const NOTE = 1 << 17;
        const REV = 1 << 18;
        const SOUND = 1 << 19;
        const URL = 1 << 20;
        const UID = 1 << 21;
        const KEY = 1 << 22;
        const NICKNAME = 1 << 23;
        const CATEGORIES = 1 << 24;
        const PROID = 1 << 25;
        const CLASS = 1 << 26;
        const SORT_STRING = 1 << 27;
        const CALL_DATETIME = 1 << 28;
    }
}

/// vCard listing query, `None` fields are left to the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    pub order: Option<Order>,
    pub search: Option<(SearchAttribute, String)>,
    pub max_list_count: Option<u16>,
    pub list_start_offset: Option<u16>,
}

/// Phone book or vCard pull parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneBookQuery {
    pub filter: VCardFilter,
    pub format: VCardFormat,
    /// `Some(0)` only asks for the phone book size
    pub max_list_count: Option<u16>,
    pub list_start_offset: Option<u16>,
}

impl PhoneBookQuery {
    pub fn is_size_only(&self) -> bool {
        self.max_list_count == Some(crate::constants::PBAP_SIZE_ONLY_COUNT)
    }
}

#[derive(Default)]
pub struct AppParamEncoder {
    block: AppParamBlock,
}

impl AppParamEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, tag: u8, value: u8) -> Result<&mut Self> {
        self.put(tag, &[value])
    }

    pub fn put_u16(&mut self, tag: u8, value: u16) -> Result<&mut Self> {
        self.put(tag, &value.to_be_bytes())
    }

    pub fn put_u64(&mut self, tag: u8, value: u64) -> Result<&mut Self> {
        self.put(tag, &value.to_be_bytes())
    }

    pub fn put(&mut self, tag: u8, value: &[u8]) -> Result<&mut Self> {
        let len = u8::try_from(value.len()).map_err(|_| Error::AppParamOverflow(u8::MAX as _))?;
        self.block
            .push(tag)
            .and_then(|_| self.block.push(len))
            .map_err(|_| Error::AppParamOverflow(APP_PARAM_BLOCK_LEN))?;
        self.block
            .extend_from_slice(value)
            .map_err(|_| Error::AppParamOverflow(APP_PARAM_BLOCK_LEN))?;
        Ok(self)
    }

    /// The encoded block, `None` if no parameter was added
    pub fn finish(self) -> Option<Bytes> {
        if self.block.is_empty() {
            None
        } else {
            Some(Bytes::copy_from_slice(&self.block))
        }
    }
}

impl ListingQuery {
    pub fn encode(&self) -> Result<Option<Bytes>> {
        let mut encoder = AppParamEncoder::new();
        if let Some(order) = self.order {
            encoder.put_u8(tag::ORDER, order as u8)?;
        }
        if let Some((attribute, value)) = &self.search {
            encoder.put(tag::SEARCH_VALUE, value.as_bytes())?;
            encoder.put_u8(tag::SEARCH_ATTRIBUTE, *attribute as u8)?;
        }
        if let Some(count) = self.max_list_count {
            encoder.put_u16(tag::MAX_LIST_COUNT, count)?;
        }
        if let Some(offset) = self.list_start_offset {
            encoder.put_u16(tag::LIST_START_OFFSET, offset)?;
        }
        Ok(encoder.finish())
    }
}

impl PhoneBookQuery {
    pub fn encode(&self) -> Result<Option<Bytes>> {
        let mut encoder = AppParamEncoder::new();
        encoder.put_u64(tag::FILTER, self.filter.bits())?;
        encoder.put_u8(tag::FORMAT, self.format as u8)?;
        if let Some(count) = self.max_list_count {
            encoder.put_u16(tag::MAX_LIST_COUNT, count)?;
        }
        if let Some(offset) = self.list_start_offset {
            encoder.put_u16(tag::LIST_START_OFFSET, offset)?;
        }
        Ok(encoder.finish())
    }
}

/// Parameters a PBAP server returns with the first response packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhoneBookInfo {
    pub size: Option<u16>,
    pub new_missed_calls: Option<u8>,
}

impl PhoneBookInfo {
    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.new_missed_calls.is_none()
    }

    /// Decode the parameters the client cares about, skipping anything else.
    /// A truncated trailing parameter is dropped.
    pub fn decode(mut buf: &[u8]) -> Self {
        let mut info = Self::default();
        while buf.remaining() >= 2 {
            let id = buf.get_u8();
            let len = buf.get_u8() as usize;
            if buf.remaining() < len {
                warn!(tag = id, len, "truncated application parameter");
                break;
            }
            let mut value = &buf[..len];
            match (id, len) {
                (tag::PHONEBOOK_SIZE, 2) => info.size = Some(value.get_u16()),
                (tag::NEW_MISSED_CALLS, 1) => info.new_missed_calls = Some(value.get_u8()),
                _ => {}
            }
            buf.advance(len);
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_query_only_set_fields() {
        assert_eq!(ListingQuery::default().encode().unwrap(), None);

        let query = ListingQuery {
            order: Some(Order::Alphanumeric),
            search: Some((SearchAttribute::Number, "555".into())),
            max_list_count: None,
            list_start_offset: Some(10),
        };
        let block = query.encode().unwrap().unwrap();
        assert_eq!(
            &block[..],
            hex_literal::hex!("010101 0203353535 030101 0502000a")
        );
    }

    #[test]
    fn test_phone_book_size_query() {
        let query = PhoneBookQuery {
            filter: VCardFilter::VERSION | VCardFilter::FN | VCardFilter::TEL,
            format: VCardFormat::V30,
            max_list_count: Some(0),
            list_start_offset: None,
        };
        assert!(query.is_size_only());
        let block = query.encode().unwrap().unwrap();
        assert_eq!(
            &block[..],
            hex_literal::hex!("06080000000000000083 070101 04020000")
        );
    }

    #[test]
    fn test_decode_phone_book_info() {
        let info = PhoneBookInfo::decode(&hex_literal::hex!("0802012c 090103 0a0100"));
        assert_eq!(info.size, Some(300));
        assert_eq!(info.new_missed_calls, Some(3));

        let truncated = PhoneBookInfo::decode(&hex_literal::hex!("0802012c 0904"));
        assert_eq!(truncated.size, Some(300));
        assert_eq!(truncated.new_missed_calls, None);
        assert!(PhoneBookInfo::decode(&[]).is_empty());
    }

    #[test]
    fn test_search_value_overflow() {
        let query = ListingQuery {
            search: Some((SearchAttribute::Name, "x".repeat(300))),
            ..Default::default()
        };
        assert!(matches!(query.encode(), Err(Error::AppParamOverflow(_))));
    }
}
