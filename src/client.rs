//! The client: control block lifecycle, the dispatcher and the application API.
//!
//! [`FtcClient`] owns the control block and the collaborators and is the only
//! consumer of the event bus. Applications talk to it through a
//! [`ClientHandle`], which only ever posts events.

use std::convert::identity;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, trace, warn};

use crate::{
    bus::EventSender,
    callout::FsCallout,
    config::ClientConfig,
    discovery::{BdAddr, ServiceDiscovery, ServiceMask},
    error::{Result, Status},
    event::{ApiRequest, ChDir, ClientEvent, Event, OpenRequest, Permissions},
    obex::{ObexPacket, ObexTransport, SecurityMask, SetPathFlags},
    session::{Callback, ControlBlock},
    state::{self, Action, State},
    tlv::{ListingQuery, PhoneBookQuery, VCardFilter, VCardFormat},
};

/// Collaborators the actions call out to
pub(crate) struct Io {
    pub transport: Box<dyn ObexTransport>,
    pub discovery: Box<dyn ServiceDiscovery>,
    pub callout: Box<dyn FsCallout>,
    pub bus: EventSender,
}

pub struct FtcClient {
    config: ClientConfig,
    io: Io,
    cb: Option<ControlBlock>,
    receiver: UnboundedReceiver<Event>,
}

impl FtcClient {
    /// Create a disabled client.
    ///
    /// `bus` and `receiver` come from [`crate::bus::channel`]; collaborators
    /// post their completions through clones of `bus`.
    pub fn new<T, D, F>(
        config: ClientConfig,
        bus: EventSender,
        receiver: UnboundedReceiver<Event>,
        transport: T,
        discovery: D,
        callout: F,
    ) -> Self
    where
        T: ObexTransport + 'static,
        D: ServiceDiscovery + 'static,
        F: FsCallout + 'static,
    {
        Self {
            config,
            io: Io {
                transport: Box::new(transport),
                discovery: Box::new(discovery),
                callout: Box::new(callout),
                bus,
            },
            cb: None,
            receiver,
        }
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            bus: self.io.bus.clone(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.cb.is_some()
    }

    pub fn state(&self) -> Option<State> {
        self.cb.as_ref().map(|cb| cb.state)
    }

    pub fn control_block(&self) -> Option<&ControlBlock> {
        self.cb.as_ref()
    }

    /// Allocate the control block. Calling it again while enabled does nothing.
    pub fn enable(&mut self, callback: Callback, app_id: u8) {
        if self.cb.is_some() {
            debug!(app_id, "client already enabled");
            return;
        }
        let mut cb = ControlBlock::new(callback, app_id);
        if self.config.advertise_service {
            match self
                .io
                .discovery
                .register_record(ServiceMask::FTP | ServiceMask::PBAP)
            {
                Ok(record) => cb.record = Some(record),
                Err(err) => {
                    warn!(%err, "could not register service record");
                    cb.report(ClientEvent::Enable {
                        status: err.status(),
                    });
                    return;
                }
            }
        }
        debug!(app_id, "client enabled");
        cb.report(ClientEvent::Enable { status: Status::Ok });
        self.cb = Some(cb);
    }

    /// Run one event through the state machine.
    /// Events raised by the actions themselves are handled before this returns.
    pub fn dispatch(&mut self, event: Event) {
        let Some(cb) = self.cb.as_mut() else {
            trace!(kind = ?event.kind(), "client not enabled, event dropped");
            return;
        };
        let mut session = Session {
            cb,
            io: &mut self.io,
            config: &self.config,
        };
        session.dispatch(event);
        let released = session.cb.released;
        if released {
            debug!("control block released");
            self.cb = None;
        }
    }

    /// Dispatch everything already on the bus, returning how many events ran
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.receiver.try_recv() {
            self.dispatch(event);
            count += 1;
        }
        count
    }

    /// Consume events until the client gets disabled
    pub async fn run(&mut self) {
        while let Some(event) = self.receiver.recv().await {
            self.dispatch(event);
            if self.cb.is_none() {
                break;
            }
        }
    }
}

/// The control block seen by one dispatch, together with the collaborators
pub(crate) struct Session<'a> {
    pub cb: &'a mut ControlBlock,
    pub io: &'a mut Io,
    pub config: &'a ClientConfig,
}

/// Requests that carry an operation's packet
pub(crate) enum Request {
    Put {
        final_packet: bool,
        packet: ObexPacket,
    },
    Get {
        packet: ObexPacket,
    },
    SetPath {
        flags: SetPathFlags,
        packet: ObexPacket,
    },
    Action {
        packet: ObexPacket,
    },
}

impl Session<'_> {
    pub fn dispatch(&mut self, mut event: Event) {
        if self.cb.released {
            trace!(kind = ?event.kind(), "control block released, event dropped");
            return;
        }
        if let Event::Obex(obex) = &event {
            if self.cb.handle != Some(obex.handle) {
                warn!(handle = ?obex.handle, current = ?self.cb.handle, "event for another transport handle");
                return;
            }
        }
        if self.cb.state == State::Closing && event.is_callout() {
            self.callout_released(event);
            return;
        }

        let kind = event.kind();
        let from = self.cb.state;
        let transition = state::transition(from, kind);
        if transition.is_ignored() && transition.next == from {
            trace!(state = ?from, ?kind, "event ignored");
            return;
        }
        self.cb.state = transition.next;
        debug!(?from, to = ?transition.next, event = ?kind, "transition");

        for action in transition.actions.into_iter().map_while(identity) {
            self.execute(action, &mut event);
        }
    }

    fn execute(&mut self, action: Action, event: &mut Event) {
        trace!(?action, "execute");
        match action {
            Action::Disable => self.disable(),
            Action::MarkDisabling => self.cb.disabling = true,
            Action::InitOpen => self.init_open(event),
            Action::SessionInfo => self.session_info(event),
            Action::DiscoverNext => self.discover_next(),
            Action::SdpFail => self.sdp_fail(),
            Action::ObexConnect => self.obex_connect(event),
            Action::ConnectRsp => self.connect_rsp(event),
            Action::Password => self.password(event),
            Action::AuthResponse => self.auth_response(event),
            Action::StartClose => self.start_close(event),
            Action::ForceClose => self.force_close(event),
            Action::TransportClosed => self.transport_closed(),
            Action::CloseComplete => self.close_complete(),
            Action::PutFile => self.put_file(event),
            Action::GetFile | Action::GetPhoneBook | Action::GetVCard => self.get_file(event),
            Action::PutRsp => self.put_rsp(event),
            Action::GetRsp => self.get_rsp(event),
            Action::CiOpen => self.ci_open(event),
            Action::CiRead => self.ci_read(event),
            Action::CiWrite => self.ci_write(event),
            Action::ListDir | Action::ListPhoneBook => self.list(event),
            Action::ChDir => self.change_dir(event),
            Action::MakeDir => self.make_dir(event),
            Action::Remove => self.remove(event),
            Action::ObjectAction => self.object_action(event),
            Action::SetPathRsp | Action::ActionRsp => self.single_shot_rsp(event),
            Action::Abort => self.abort(),
            Action::AbortRsp => self.abort_rsp(event),
            Action::Suspend => self.suspend(),
            Action::Suspended => self.suspended(event),
            Action::LinkLost => self.link_lost(event),
            Action::CalloutSettled => self.callout_settled(event),
            Action::ResponseSettled => self.response_settled(),
            Action::TimerExpired => self.timer_expired(event),
        }
    }

    pub fn report(&mut self, event: ClientEvent) {
        debug!(?event, "report");
        self.cb.report(event)
    }

    pub fn new_packet(&self) -> ObexPacket {
        ObexPacket::with_capacity(self.config.packet_size(self.cb.peer_mtu))
    }

    /// Hand a request to the transport. The packet moves into the transport.
    /// On failure the active operation completes with the error.
    pub fn send(&mut self, request: Request) -> bool {
        let Some(handle) = self.cb.handle else {
            self.complete(Status::TransportError);
            return false;
        };
        if self.cb.request_pending {
            error!("request issued while another one is pending");
            return false;
        }
        let transport = self.io.transport.as_mut();
        let result = match request {
            Request::Put {
                final_packet,
                packet,
            } => transport.put(handle, final_packet, packet),
            Request::Get { packet } => transport.get(handle, true, packet),
            Request::SetPath { flags, packet } => transport.set_path(handle, flags, packet),
            Request::Action { packet } => transport.action(handle, packet),
        };
        match result {
            Ok(()) => {
                self.cb.request_pending = true;
                self.cb.transfer.request_sent = true;
                self.cb.sequence = self.cb.sequence.wrapping_add(1);
                debug!(sequence = self.cb.sequence, "request issued");
                true
            }
            Err(err) => {
                warn!(%err, "request failed");
                self.complete(err.status());
                false
            }
        }
    }

    /// Issue the prepared packet as a Get, or an empty continuation Get
    pub fn send_get(&mut self) -> bool {
        let packet = match self.cb.pending_packet.take() {
            Some(packet) => packet,
            None => self.new_packet(),
        };
        self.send(Request::Get { packet })
    }

    /// End the active operation: release everything it owns, then tell the
    /// application
    pub fn complete(&mut self, status: Status) {
        let Some(operation) = self.cb.active_operation else {
            return;
        };
        if status.is_ok() {
            self.cb.transfer.created_file = false;
        }
        debug!(?operation, ?status, "operation complete");
        self.reset();
        self.report(operation.completion(status));
    }

    /// Release the operation state.
    ///
    /// The local file is closed, and removed if it was being received. The
    /// session scoped fields and the timer purpose are left alone.
    pub fn reset(&mut self) {
        self.cb.response_timer.stop();
        if let Some(fd) = self.cb.file_descriptor.take() {
            if let Err(err) = self.io.callout.close(fd, self.cb.app_id) {
                warn!(%err, ?fd, "close failed");
            }
            self.remove_partial_file();
        }
        self.cb.pending_packet = None;
        self.cb.active_operation = None;
        self.cb.request_pending = false;
        self.cb.abort = None;
        // A call-out still in flight needs the transfer to clean up after it
        if self.cb.callout_pending.is_none() {
            self.cb.transfer = Default::default();
        }
    }

    fn remove_partial_file(&mut self) {
        if !self.cb.transfer.created_file {
            return;
        }
        self.cb.transfer.created_file = false;
        if let Some(path) = self.cb.transfer.local_path.as_deref() {
            debug!(path, "removing partial file");
            if let Err(err) = self.io.callout.unlink(path, self.cb.app_id) {
                warn!(%err, path, "unlink failed");
            }
        }
    }

    /// A call-out completed after the session started closing
    fn callout_released(&mut self, event: Event) {
        trace!(kind = ?event.kind(), "call-out settled while closing");
        self.cb.callout_pending = None;
        if let Event::CiOpen { fd: Some(fd), .. } = event {
            if let Err(err) = self.io.callout.close(fd, self.cb.app_id) {
                warn!(%err, ?fd, "close failed");
            }
            self.remove_partial_file();
        }
        self.cb.transfer = Default::default();
        if self.cb.transport_closed {
            self.dispatch(Event::CloseComplete);
        }
    }

    pub(crate) fn disable(&mut self) {
        if let Some(record) = self.cb.record.take() {
            self.io.discovery.remove_record(record);
        }
        self.cb.released = true;
        self.report(ClientEvent::Disable);
    }
}

/// Application side of the client. Every call posts a request to the
/// dispatcher and returns once it is queued.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    bus: EventSender,
}

impl ClientHandle {
    fn request(&self, request: ApiRequest) -> Result<()> {
        self.bus.post(Event::Api(request))
    }

    pub fn disable(&self) -> Result<()> {
        self.request(ApiRequest::Disable)
    }

    pub fn open(
        &self,
        address: BdAddr,
        security: SecurityMask,
        services: ServiceMask,
        reliable: bool,
        nonce: Option<Bytes>,
    ) -> Result<()> {
        self.request(ApiRequest::Open(OpenRequest {
            address,
            security,
            services,
            reliable,
            nonce,
        }))
    }

    pub fn close(&self) -> Result<()> {
        self.request(ApiRequest::Close)
    }

    pub fn put_file(&self, local_path: impl Into<String>) -> Result<()> {
        self.request(ApiRequest::PutFile {
            local_path: local_path.into(),
        })
    }

    pub fn get_file(&self, remote: impl Into<String>, local_path: impl Into<String>) -> Result<()> {
        self.request(ApiRequest::GetFile {
            remote: remote.into(),
            local_path: local_path.into(),
        })
    }

    pub fn get_phone_book(
        &self,
        remote: impl Into<String>,
        local_path: impl Into<String>,
        query: PhoneBookQuery,
    ) -> Result<()> {
        self.request(ApiRequest::GetPhoneBook {
            remote: remote.into(),
            local_path: local_path.into(),
            query,
        })
    }

    pub fn get_vcard(
        &self,
        remote: impl Into<String>,
        local_path: impl Into<String>,
        filter: VCardFilter,
        format: VCardFormat,
    ) -> Result<()> {
        self.request(ApiRequest::GetVCard {
            remote: remote.into(),
            local_path: local_path.into(),
            filter,
            format,
        })
    }

    pub fn list_dir(&self, path: impl Into<String>) -> Result<()> {
        self.request(ApiRequest::ListDir { path: path.into() })
    }

    pub fn list_phone_book(&self, path: impl Into<String>, query: ListingQuery) -> Result<()> {
        self.request(ApiRequest::ListPhoneBook {
            path: path.into(),
            query,
        })
    }

    pub fn change_dir(&self, target: ChDir) -> Result<()> {
        self.request(ApiRequest::ChDir(target))
    }

    pub fn make_dir(&self, name: impl Into<String>) -> Result<()> {
        self.request(ApiRequest::MakeDir { name: name.into() })
    }

    pub fn remove(&self, name: impl Into<String>) -> Result<()> {
        self.request(ApiRequest::Remove { name: name.into() })
    }

    pub fn copy(&self, source: impl Into<String>, destination: impl Into<String>) -> Result<()> {
        self.request(ApiRequest::Copy {
            source: source.into(),
            destination: destination.into(),
        })
    }

    pub fn move_object(
        &self,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Result<()> {
        self.request(ApiRequest::Move {
            source: source.into(),
            destination: destination.into(),
        })
    }

    pub fn set_permission(&self, name: impl Into<String>, permissions: Permissions) -> Result<()> {
        self.request(ApiRequest::SetPermission {
            name: name.into(),
            permissions,
        })
    }

    pub fn abort(&self) -> Result<()> {
        self.request(ApiRequest::Abort)
    }

    pub fn suspend(&self) -> Result<()> {
        self.request(ApiRequest::Suspend)
    }

    pub fn auth_response(&self, password: Bytes, userid: Option<Bytes>) -> Result<()> {
        self.request(ApiRequest::AuthResponse { password, userid })
    }
}
