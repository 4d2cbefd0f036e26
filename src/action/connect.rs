//! Service discovery, connect negotiation and session teardown

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::{
    client::Session,
    constants::{FTP_TARGET_UUID, PBAP_TARGET_UUID},
    discovery::{SdpResult, ServiceClass},
    error::{status_of, Status},
    event::{ApiRequest, ClientEvent, Event},
    obex::{ConnectRequest, Header, ObexEvent, ObexEventKind, ReliableSession},
    session::{Callout, OpenParams, TimerPurpose},
};

impl Session<'_> {
    pub(crate) fn init_open(&mut self, event: &mut Event) {
        let Event::Api(ApiRequest::Open(request)) = event else {
            return;
        };
        self.cb.clear_session();
        self.cb.open = OpenParams {
            address: request.address,
            security: request.security,
            remaining: request.services,
            reliable: request.reliable,
            nonce: request.nonce.take(),
            resume: None,
        };
        debug!(
            address = %request.address,
            services = ?request.services,
            reliable = request.reliable,
            "open"
        );
        if request.reliable {
            // Look for a suspended session first
            match self.io.callout.resume(self.cb.app_id) {
                Ok(()) => {
                    self.cb.callout_pending = Some(Callout::Session);
                    return;
                }
                Err(err) => warn!(%err, "no saved session, opening a fresh one"),
            }
        }
        self.discover_next();
    }

    pub(crate) fn session_info(&mut self, event: &mut Event) {
        let Event::CiSession { info } = event else {
            return;
        };
        self.cb.callout_pending = None;
        if let Some(info) = info.take() {
            debug!(token = ?info.token, sequence = info.sequence, operation = ?info.operation, "saved session found");
            self.cb.open.resume = Some(info);
        }
        self.discover_next();
    }

    /// Discover the most preferred service not tried yet
    pub(crate) fn discover_next(&mut self) {
        let Some(service) = self.cb.open.remaining.first() else {
            warn!("none of the requested services found");
            self.dispatch(Event::CloseRequest {
                status: Status::ServiceUnavailable,
            });
            return;
        };
        self.cb.open.remaining.remove(service.mask());
        self.cb.service_selector = Some(service);
        debug!(?service, "discovering");
        match self
            .io
            .discovery
            .discover(self.cb.open.address, service, self.config.sdp_db_size)
        {
            Ok(()) => self.cb.discovery_pending = true,
            Err(err) => {
                warn!(%err, ?service, "discovery request failed");
                self.dispatch(Event::NextService);
            }
        }
    }

    pub(crate) fn sdp_fail(&mut self) {
        self.cb.discovery_pending = false;
        debug!(service = ?self.cb.service_selector, "service not found");
        self.dispatch(Event::NextService);
    }

    pub(crate) fn obex_connect(&mut self, event: &mut Event) {
        let Event::Sdp(SdpResult::Found {
            service,
            channel,
            version,
        }) = *event
        else {
            return;
        };
        self.cb.discovery_pending = false;
        self.cb.service_selector = Some(service);
        self.cb.version = version;

        let mut packet = self.new_packet();
        match service {
            ServiceClass::FileTransfer => {
                packet.push(Header::Target(Bytes::from_static(&FTP_TARGET_UUID)));
            }
            ServiceClass::PhoneBookAccess => {
                packet.push(Header::Target(Bytes::from_static(&PBAP_TARGET_UUID)));
            }
            ServiceClass::ObjectPush | ServiceClass::Imaging => {}
        }
        let reliable = self.cb.open.reliable.then(|| match &self.cb.open.resume {
            Some(info) => ReliableSession::Resume {
                token: info.token,
                sequence: info.sequence,
            },
            None => ReliableSession::Create {
                nonce: self.cb.open.nonce.clone().unwrap_or_default(),
            },
        });
        let request = ConnectRequest {
            address: self.cb.open.address,
            channel,
            security: self.cb.open.security,
            mtu: self.config.obex_mtu,
            reliable,
        };
        debug!(?service, ?channel, version, "connecting");
        match self.io.transport.connect(request, packet) {
            Ok(handle) => self.cb.handle = Some(handle),
            Err(err) => {
                warn!(%err, "connect failed");
                self.dispatch(Event::CloseRequest {
                    status: err.status(),
                });
            }
        }
    }

    pub(crate) fn connect_rsp(&mut self, event: &mut Event) {
        let Event::Obex(ObexEvent {
            kind: ObexEventKind::ConnectRsp { peer_mtu, session },
            response,
            ..
        }) = *event
        else {
            return;
        };
        if !response.is_success() {
            warn!(?response, "connect refused");
            if let Some(handle) = self.cb.handle {
                self.io.transport.force_close(handle);
            }
            self.cb.transport_closed = true;
            let status = match status_of(response) {
                Status::Ok => Status::TransportError,
                status => status,
            };
            self.dispatch(Event::CloseRequest { status });
            return;
        }

        self.cb.peer_mtu = peer_mtu;
        let mut resumed = None;
        if let Some(grant) = session {
            self.cb.session_token = Some(grant.token);
            self.cb.sequence = grant.sequence;
            if grant.resumed {
                resumed = self.cb.open.resume.take();
            }
        }
        self.cb.open.resume = None;
        self.cb.opened = true;

        let service = self.cb.service_selector;
        debug!(?service, peer_mtu, resumed = resumed.is_some(), "connected");
        self.report(ClientEvent::Open {
            status: Status::Ok,
            service,
            version: self.cb.version,
            resumed: resumed.is_some(),
        });
        match resumed {
            Some(info) => self.resume_operation(info),
            None => {
                if service == Some(ServiceClass::FileTransfer) && self.config.auto_list_root {
                    self.start_listing(String::new(), None);
                }
            }
        }
    }

    pub(crate) fn password(&mut self, event: &mut Event) {
        let Event::Obex(ObexEvent {
            kind:
                ObexEventKind::Password {
                    realm,
                    charset,
                    userid_required,
                },
            ..
        }) = event
        else {
            return;
        };
        let event = ClientEvent::Auth {
            realm: realm.take(),
            charset: *charset,
            userid_required: *userid_required,
        };
        self.report(event);
    }

    pub(crate) fn auth_response(&mut self, event: &mut Event) {
        let Event::Api(ApiRequest::AuthResponse { password, userid }) = event else {
            return;
        };
        let Some(handle) = self.cb.handle else {
            warn!("authentication response without a transport connection");
            return;
        };
        if let Err(err) = self
            .io
            .transport
            .auth_response(handle, &password[..], userid.as_deref())
        {
            warn!(%err, "authentication response failed");
            self.dispatch(Event::CloseRequest {
                status: err.status(),
            });
        }
    }

    pub(crate) fn start_close(&mut self, event: &mut Event) {
        let status = match *event {
            Event::CloseRequest { status } => status,
            _ => Status::Ok,
        };
        self.close_with(status);
    }

    /// Fail the active operation and take the transport down
    pub(crate) fn close_with(&mut self, status: Status) {
        debug!(?status, "closing");
        self.cb.close_status.get_or_insert(status);
        let operation_status = if status.is_ok() {
            Status::Aborted
        } else {
            status
        };
        self.complete(operation_status);
        self.reset();
        self.close_transport();
    }

    pub(crate) fn close_transport(&mut self) {
        match self.cb.handle {
            Some(handle) if !self.cb.transport_closed => {
                match self.io.transport.disconnect(handle) {
                    Ok(()) => self.cb.response_timer.start(
                        TimerPurpose::Stop,
                        self.config.stop_timeout(),
                        &self.io.bus,
                    ),
                    Err(err) => {
                        warn!(%err, "disconnect failed, dropping the link");
                        self.io.transport.force_close(handle);
                        self.transport_closed();
                    }
                }
            }
            _ if self.cb.discovery_pending => debug!("waiting for discovery to finish"),
            _ => self.transport_closed(),
        }
    }

    pub(crate) fn force_close(&mut self, event: &mut Event) {
        let Event::ResponseTimeout {
            purpose,
            generation,
        } = *event
        else {
            return;
        };
        if !self.cb.response_timer.expire(purpose, generation) {
            trace!(?purpose, generation, "stale timer expiry");
            return;
        }
        warn!(?purpose, "no answer from the peer, dropping the link");
        if let Some(handle) = self.cb.handle {
            self.io.transport.force_close(handle);
        }
        self.transport_closed();
    }

    pub(crate) fn transport_closed(&mut self) {
        self.cb.transport_closed = true;
        self.cb.discovery_pending = false;
        self.cb.response_timer.stop();
        if self.cb.active_operation.is_some() {
            self.complete(Status::TransportError);
        }
        self.cb.close_status.get_or_insert(Status::TransportError);
        match self.cb.callout_pending {
            None => self.dispatch(Event::CloseComplete),
            Some(callout) => debug!(?callout, "transport closed, waiting for call-out"),
        }
    }

    pub(crate) fn close_complete(&mut self) {
        self.reset();
        let status = self.cb.close_status.take().unwrap_or(Status::Ok);
        let event = if self.cb.opened {
            ClientEvent::Close {
                status,
                suspended: self.cb.suspended,
            }
        } else {
            ClientEvent::Open {
                status: if status.is_ok() {
                    Status::Aborted
                } else {
                    status
                },
                service: None,
                version: 0,
                resumed: false,
            }
        };
        debug!(?status, suspended = self.cb.suspended, "session closed");
        self.cb.clear_session();
        self.report(event);
        if self.cb.disabling {
            self.disable();
        }
    }
}
