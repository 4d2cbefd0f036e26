//! Constants used by the client.
//! Timeouts and buffer sizes here are defaults, see [`crate::config::ClientConfig`]
//! for the values used at runtime.

/// Folder Browsing service target (IrOBEX 9.3, FTP 1.3 5.2)
pub const FTP_TARGET_UUID: [u8; 16] = [
    0xF9, 0xEC, 0x7B, 0xC4, 0x95, 0x3C, 0x11, 0xD2, 0x98, 0x4E, 0x52, 0x54, 0x00, 0xDC, 0x9E, 0x09,
];

/// Phone Book Access service target (PBAP 1.2 6.4)
pub const PBAP_TARGET_UUID: [u8; 16] = [
    0x79, 0x61, 0x35, 0xF0, 0xF0, 0xC5, 0x11, 0xD8, 0x09, 0x66, 0x08, 0x00, 0x20, 0x0C, 0x9A, 0x66,
];

pub const TYPE_FOLDER_LISTING: &str = "x-obex/folder-listing";
pub const TYPE_VCARD_LISTING: &str = "x-bt/vcard-listing";
pub const TYPE_PHONEBOOK: &str = "x-bt/phonebook";
pub const TYPE_VCARD: &str = "x-bt/vcard";

/// PBAP application parameter tags (PBAP 1.2 6.2.1)
pub mod app_param_tag {
    pub const ORDER: u8 = 0x01;
    pub const SEARCH_VALUE: u8 = 0x02;
    pub const SEARCH_ATTRIBUTE: u8 = 0x03;
    pub const MAX_LIST_COUNT: u8 = 0x04;
    pub const LIST_START_OFFSET: u8 = 0x05;
    pub const FILTER: u8 = 0x06;
    pub const FORMAT: u8 = 0x07;
    pub const PHONEBOOK_SIZE: u8 = 0x08;
    pub const NEW_MISSED_CALLS: u8 = 0x09;
}

/// Capacity of an encoded application parameter block.
/// A tag and a length byte each, so a single value is at most 255 bytes.
pub const APP_PARAM_BLOCK_LEN: usize = 512;

/// Smallest packet an OBEX peer must accept (IrOBEX 3.3.1.4)
pub const OBEX_MIN_MTU: u16 = 255;
pub const OBEX_DEFAULT_MTU: u16 = 32 * 1024;
/// Opcode, packet length and connection id that every request carries
pub const OBEX_REQUEST_OVERHEAD: usize = 3 + 5;
/// Header id and 2 byte length of byte-sequence and unicode headers
pub const OBEX_HEADER_OVERHEAD: usize = 3;

pub const DEFAULT_ABORT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SUSPEND_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_SDP_DB_SIZE: usize = 4 * 1024;

/// `max_list_count` that asks a PBAP server for the phone book size only
pub const PBAP_SIZE_ONLY_COUNT: u16 = 0;
