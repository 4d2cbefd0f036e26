//! Chunked Get and Put of files, phone books and vCards.
//!
//! A transfer alternates between waiting on the peer and waiting on the local
//! file. Only one of the two is ever outstanding.

use std::mem;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::{
    callout::{CalloutStatus, FileDescriptor, OpenMode},
    client::{Request, Session},
    constants::{TYPE_PHONEBOOK, TYPE_VCARD},
    discovery::ServiceClass,
    error::{status_of, Status},
    event::{ApiRequest, ClientEvent, Event},
    obex::{Header, ObexPacket, ResponseCode},
    session::{AbortOrigin, Callout, GetTarget, Operation, TransferProgress},
    tlv::PhoneBookQuery,
};

/// Object name sent for a local file
fn basename(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

impl Session<'_> {
    pub(crate) fn put_file(&mut self, event: &mut Event) {
        let Event::Api(ApiRequest::PutFile { local_path }) = event else {
            return;
        };
        let local_path = mem::take(local_path);
        let operation = Operation::PutFile;
        if !self.admit(operation) {
            return;
        }
        if !matches!(self.cb.service_selector, Some(service) if service.allows_put()) {
            self.refuse(operation, Status::NoPermission);
            return;
        }
        let name = basename(&local_path);
        if name.is_empty() {
            self.refuse(operation, Status::NotFound);
            return;
        }
        debug!(name, %local_path, "put");
        let mut packet = self.new_packet();
        packet.push(Header::Name(name.to_owned()));

        self.cb.active_operation = Some(operation);
        self.cb.pending_packet = Some(packet);
        self.cb.transfer = TransferProgress::new(GetTarget::File, Some(local_path.clone()));
        self.open_local(&local_path, OpenMode::READ, 0);
    }

    pub(crate) fn get_file(&mut self, event: &mut Event) {
        let Event::Api(request) = event else {
            return;
        };
        let (remote, local_path, target) = match request {
            ApiRequest::GetFile { remote, local_path } => {
                (mem::take(remote), mem::take(local_path), GetTarget::File)
            }
            ApiRequest::GetPhoneBook {
                remote,
                local_path,
                query,
            } => (
                mem::take(remote),
                mem::take(local_path),
                GetTarget::PhoneBook(query.clone()),
            ),
            ApiRequest::GetVCard {
                remote,
                local_path,
                filter,
                format,
            } => (
                mem::take(remote),
                mem::take(local_path),
                GetTarget::VCard(PhoneBookQuery {
                    filter: *filter,
                    format: *format,
                    ..Default::default()
                }),
            ),
            _ => return,
        };

        let operation = Operation::GetFile;
        if !self.admit(operation) {
            return;
        }
        let allowed = match self.cb.service_selector {
            // Phone-book objects and their parameters only exist on a phone-book server
            Some(service) if target.query().is_some() => {
                service == ServiceClass::PhoneBookAccess
            }
            Some(service) => service.allows_get(),
            None => false,
        };
        if !allowed {
            self.refuse(operation, Status::NoPermission);
            return;
        }
        if remote.is_empty() {
            self.refuse(operation, Status::NotFound);
            return;
        }

        debug!(%remote, %local_path, ?target, "get");
        let mut packet = self.new_packet();
        packet.push(Header::Name(remote));
        let params = match &target {
            GetTarget::File => Ok(None),
            GetTarget::PhoneBook(query) => {
                packet.push(Header::Type(TYPE_PHONEBOOK.into()));
                query.encode()
            }
            GetTarget::VCard(query) => {
                packet.push(Header::Type(TYPE_VCARD.into()));
                query.encode()
            }
        };
        match params {
            Ok(Some(params)) => {
                packet.push(Header::AppParameters(params));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%err, "could not encode application parameters");
                self.refuse(operation, err.status());
                return;
            }
        }

        let size_only = target.query().is_some_and(PhoneBookQuery::is_size_only);
        self.cb.active_operation = Some(operation);
        self.cb.pending_packet = Some(packet);
        if size_only {
            // Nothing to store, the answer is in the application parameters
            self.cb.transfer = TransferProgress::new(target, None);
            self.send_get();
            return;
        }
        self.cb.transfer = TransferProgress::new(target, Some(local_path.clone()));
        self.open_local(
            &local_path,
            OpenMode::CREATE | OpenMode::WRITE | OpenMode::TRUNCATE,
            0,
        );
    }

    pub(crate) fn open_local(&mut self, path: &str, mode: OpenMode, offset: u64) {
        match self.io.callout.open(path, mode, offset, self.cb.app_id) {
            Ok(()) => {
                self.cb.callout_pending = Some(Callout::Open);
                // A file we write to is removed again if the transfer fails
                self.cb.transfer.created_file = mode.contains(OpenMode::WRITE);
            }
            Err(err) => {
                warn!(%err, path, "open failed");
                self.complete(err.status());
            }
        }
    }

    pub(crate) fn ci_open(&mut self, event: &mut Event) {
        let Event::CiOpen { status, fd, size } = *event else {
            return;
        };
        self.cb.callout_pending = None;
        if fd.is_some() {
            self.cb.file_descriptor = fd;
        }
        if self.cb.is_aborting() {
            self.abort_callout_done();
            return;
        }
        let Some(operation) = self.cb.active_operation else {
            warn!(?fd, "open completed with no transfer in progress");
            self.reset();
            return;
        };
        if !status.is_ok() || fd.is_none() {
            warn!(?status, "local file could not be opened");
            let status = match status {
                CalloutStatus::Ok | CalloutStatus::Eof => Status::TransportError,
                status => status.status(),
            };
            self.complete(status);
            return;
        }

        match operation {
            Operation::GetFile => {
                self.send_get();
            }
            Operation::PutFile if self.cb.transfer.request_sent => self.read_next(),
            Operation::PutFile => {
                self.cb.transfer.total = size;
                let mut packet = match self.cb.pending_packet.take() {
                    Some(packet) => packet,
                    None => self.new_packet(),
                };
                if let Some(length) = size.and_then(|size| u32::try_from(size).ok()) {
                    packet.push(Header::Length(length));
                }
                self.send(Request::Put {
                    final_packet: false,
                    packet,
                });
            }
            operation => warn!(?operation, "open completed for an operation without a file"),
        }
    }

    /// Read the next body segment, sized to what fits in one packet
    fn read_next(&mut self) {
        let Some(fd) = self.cb.file_descriptor else {
            self.complete(Status::TransportError);
            return;
        };
        let len = self.new_packet().body_room();
        match self.io.callout.read(fd, len, self.cb.app_id) {
            Ok(()) => self.cb.callout_pending = Some(Callout::Read),
            Err(err) => {
                warn!(%err, "read failed");
                self.start_abort(AbortOrigin::Internal);
            }
        }
    }

    pub(crate) fn ci_read(&mut self, event: &mut Event) {
        let Event::CiRead { status, data, .. } = event else {
            return;
        };
        let (status, data) = (*status, mem::take(data));
        self.cb.callout_pending = None;
        if self.cb.is_aborting() {
            self.abort_callout_done();
            return;
        }
        if self.cb.active_operation != Some(Operation::PutFile) {
            trace!("read completed with no put in progress");
            return;
        }
        if !status.is_ok() {
            warn!(?status, "local read failed");
            self.start_abort(AbortOrigin::Internal);
            return;
        }

        let final_packet = status == CalloutStatus::Eof;
        let len = data.len();
        let mut packet = self.new_packet();
        packet.push(if final_packet {
            Header::EndOfBody(data)
        } else {
            Header::Body(data)
        });
        self.cb.transfer.final_packet = final_packet;
        if self.send(Request::Put {
            final_packet,
            packet,
        }) {
            self.cb.transfer.offset += len as u64;
            let total = self.cb.transfer.total;
            self.report(ClientEvent::Progress { bytes: len, total });
        }
    }

    pub(crate) fn put_rsp(&mut self, event: &mut Event) {
        let Event::Obex(obex) = event else {
            return;
        };
        let response = obex.response;
        self.cb.request_pending = false;
        if self.cb.is_aborting() {
            self.abort_on_response(response);
            return;
        }
        match self.cb.active_operation {
            Some(Operation::PutFile) => self.put_file_rsp(response),
            Some(Operation::Delete) => self.complete(status_of(response)),
            operation => trace!(?operation, ?response, "put response dropped"),
        }
    }

    fn put_file_rsp(&mut self, response: ResponseCode) {
        if response.is_success() {
            self.complete(Status::Ok);
        } else if !response.is_continue() {
            self.complete(status_of(response));
        } else if self.cb.transfer.final_packet {
            warn!("continue after the final packet");
            self.complete(Status::TransportError);
        } else {
            self.cb.transfer.first_packet = false;
            self.read_next();
        }
    }

    pub(crate) fn get_rsp(&mut self, event: &mut Event) {
        let Event::Obex(obex) = event else {
            return;
        };
        let response = obex.response;
        let packet = obex.packet.take();
        self.cb.request_pending = false;
        if self.cb.is_aborting() {
            self.abort_on_response(response);
            return;
        }
        match self.cb.active_operation {
            Some(Operation::GetFile) => self.get_file_rsp(response, packet),
            Some(Operation::GetListing) => self.listing_rsp(response, packet),
            operation => trace!(?operation, ?response, "get response dropped"),
        }
    }

    fn get_file_rsp(&mut self, response: ResponseCode, packet: Option<ObexPacket>) {
        if !(response.is_continue() || response.is_success()) {
            self.complete(status_of(response));
            return;
        }
        let mut packet = packet.unwrap_or_default();
        let first = mem::replace(&mut self.cb.transfer.first_packet, false);
        if first {
            if let Some(length) = packet.length() {
                self.cb.transfer.total = Some(length.into());
            }
            if self.cb.transfer.target.query().is_some() {
                self.report_phone_book(&packet);
            }
        }
        let final_packet = !response.is_continue();
        self.cb.transfer.final_packet = final_packet;

        let body = packet
            .take_body()
            .map(|(data, _)| data)
            .filter(|data| !data.is_empty());
        match body {
            Some(data) => match self.cb.file_descriptor {
                Some(fd) => {
                    self.write_local(fd, data);
                    return;
                }
                None => trace!(len = data.len(), "no local file, body dropped"),
            },
            None if !final_packet && !first => {
                warn!("continue response without a body");
                self.complete(Status::TransportError);
                return;
            }
            None => {}
        }
        if final_packet {
            self.complete(Status::Ok);
        } else {
            self.send_get();
        }
    }

    fn write_local(&mut self, fd: FileDescriptor, data: Bytes) {
        let len = data.len();
        match self.io.callout.write(fd, data, self.cb.app_id) {
            Ok(()) => {
                self.cb.callout_pending = Some(Callout::Write);
                self.cb.transfer.in_flight = len;
            }
            Err(err) => {
                warn!(%err, "write failed");
                self.complete(err.status());
            }
        }
    }

    pub(crate) fn ci_write(&mut self, event: &mut Event) {
        let Event::CiWrite { status, .. } = *event else {
            return;
        };
        self.cb.callout_pending = None;
        if self.cb.is_aborting() {
            self.abort_callout_done();
            return;
        }
        if self.cb.active_operation != Some(Operation::GetFile) {
            trace!("write completed with no get in progress");
            return;
        }
        if !status.is_ok() {
            warn!(?status, "local write failed");
            self.complete(status.status());
            return;
        }
        let bytes = mem::take(&mut self.cb.transfer.in_flight);
        self.cb.transfer.offset += bytes as u64;
        let total = self.cb.transfer.total;
        self.report(ClientEvent::Progress { bytes, total });
        if self.cb.transfer.final_packet {
            self.complete(Status::Ok);
        } else {
            self.send_get();
        }
    }
}
