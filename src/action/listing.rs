//! Folder and vCard listings

use std::mem;

use tracing::{debug, warn};

use crate::{
    client::Session,
    constants::{TYPE_FOLDER_LISTING, TYPE_VCARD_LISTING},
    discovery::ServiceClass,
    error::{status_of, Status},
    event::{ApiRequest, ClientEvent, Event},
    obex::{Header, ObexPacket, ResponseCode},
    session::{GetTarget, Operation, TransferProgress},
    tlv::{ListingQuery, PhoneBookInfo},
};

impl Session<'_> {
    pub(crate) fn list(&mut self, event: &mut Event) {
        let Event::Api(request) = event else {
            return;
        };
        let (path, query) = match request {
            ApiRequest::ListDir { path } => (mem::take(path), None),
            ApiRequest::ListPhoneBook { path, query } => (mem::take(path), Some(query.clone())),
            _ => return,
        };
        self.start_listing(path, query);
    }

    /// Request the listing of `path`, relative to the current folder.
    /// An empty path or "." lists the current folder itself.
    pub(crate) fn start_listing(&mut self, path: String, query: Option<ListingQuery>) {
        let operation = Operation::GetListing;
        if !self.admit(operation) {
            return;
        }
        let listing_type = match (self.cb.service_selector, &query) {
            (Some(ServiceClass::FileTransfer), None) => TYPE_FOLDER_LISTING,
            (Some(ServiceClass::PhoneBookAccess), _) => TYPE_VCARD_LISTING,
            _ => {
                self.refuse(operation, Status::NoPermission);
                return;
            }
        };

        debug!(%path, listing_type, ?query, "list");
        let mut packet = self.new_packet();
        packet.push(Header::Type(listing_type.into()));
        if !(path.is_empty() || path == ".") {
            packet.push(Header::Name(path));
        }
        if let Some(query) = query {
            match query.encode() {
                Ok(Some(params)) => {
                    packet.push(Header::AppParameters(params));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(%err, "could not encode the listing query");
                    self.refuse(operation, err.status());
                    return;
                }
            }
        }

        self.cb.active_operation = Some(operation);
        self.cb.transfer = TransferProgress::new(GetTarget::File, None);
        self.cb.pending_packet = Some(packet);
        self.send_get();
    }

    pub(crate) fn listing_rsp(&mut self, response: ResponseCode, packet: Option<ObexPacket>) {
        if !(response.is_continue() || response.is_success()) {
            self.complete(status_of(response));
            return;
        }
        let mut packet = packet.unwrap_or_default();
        let first = mem::replace(&mut self.cb.transfer.first_packet, false);
        if first && self.cb.service_selector == Some(ServiceClass::PhoneBookAccess) {
            self.report_phone_book(&packet);
        }
        let data = packet
            .take_body()
            .map(|(data, _)| data)
            .unwrap_or_default();

        if !response.is_continue() {
            debug!(len = data.len(), "listing complete");
            self.report(ClientEvent::Listing {
                data,
                final_packet: true,
                status: Status::Ok,
            });
            self.reset();
            return;
        }
        if !data.is_empty() {
            self.report(ClientEvent::Listing {
                data,
                final_packet: false,
                status: Status::Ok,
            });
        } else if !first {
            warn!("listing continue without data");
            self.complete(Status::NoContent);
            return;
        }
        self.send_get();
    }

    /// Surface the phone book counters of a first response, if it has any
    pub(crate) fn report_phone_book(&mut self, packet: &ObexPacket) {
        let Some(params) = packet.app_parameters() else {
            return;
        };
        let info = PhoneBookInfo::decode(params);
        if info.is_empty() {
            return;
        }
        self.report(ClientEvent::PhoneBook {
            size: info.size,
            missed_calls: info.new_missed_calls,
        });
    }
}
