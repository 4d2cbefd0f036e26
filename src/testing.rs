//! Recording collaborators and a harness for driving the client in tests

use std::{
    collections::HashMap,
    mem,
    sync::{Arc, Mutex},
};

use bytes::Bytes;

use crate::{
    bus::{self, EventSender},
    callout::{CalloutStatus, FileDescriptor, FsCallout, OpenMode, SessionInfo},
    client::FtcClient,
    config::ClientConfig,
    discovery::{BdAddr, RecordHandle, SdpResult, ServiceClass, ServiceDiscovery, ServiceMask},
    error::Result,
    event::{ApiRequest, ClientEvent, Event, OpenRequest},
    obex::{
        Channel, ConnectRequest, Header, ObexEvent, ObexEventKind, ObexHandle, ObexPacket,
        ObexTransport, ResponseCode, SecurityMask, SessionGrant, SessionOp, SessionToken,
        SetPathFlags,
    },
    session::Callback,
    state::State,
};

pub(crate) type Shared<T> = Arc<Mutex<T>>;

pub(crate) const HANDLE: ObexHandle = ObexHandle(1);
pub(crate) const PEER: BdAddr = BdAddr([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13]);
pub(crate) const TOKEN: SessionToken = SessionToken([0x5A; 16]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportCall {
    Connect(ConnectRequest, ObexPacket),
    Disconnect,
    ForceClose,
    Put {
        final_packet: bool,
        packet: ObexPacket,
    },
    Get(ObexPacket),
    SetPath(SetPathFlags, ObexPacket),
    Action(ObexPacket),
    Abort,
    Session(SessionOp),
    AuthResponse {
        password: Vec<u8>,
        userid: Option<Vec<u8>>,
    },
}

#[derive(Default)]
pub(crate) struct MockTransport {
    calls: Shared<Vec<TransportCall>>,
}

impl MockTransport {
    fn record(&mut self, call: TransportCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl ObexTransport for MockTransport {
    fn connect(&mut self, request: ConnectRequest, packet: ObexPacket) -> Result<ObexHandle> {
        self.record(TransportCall::Connect(request, packet))?;
        Ok(HANDLE)
    }

    fn disconnect(&mut self, _handle: ObexHandle) -> Result<()> {
        self.record(TransportCall::Disconnect)
    }

    fn force_close(&mut self, _handle: ObexHandle) {
        let _ = self.record(TransportCall::ForceClose);
    }

    fn put(&mut self, _handle: ObexHandle, final_packet: bool, packet: ObexPacket) -> Result<()> {
        self.record(TransportCall::Put {
            final_packet,
            packet,
        })
    }

    fn get(&mut self, _handle: ObexHandle, _final_packet: bool, packet: ObexPacket) -> Result<()> {
        self.record(TransportCall::Get(packet))
    }

    fn set_path(
        &mut self,
        _handle: ObexHandle,
        flags: SetPathFlags,
        packet: ObexPacket,
    ) -> Result<()> {
        self.record(TransportCall::SetPath(flags, packet))
    }

    fn action(&mut self, _handle: ObexHandle, packet: ObexPacket) -> Result<()> {
        self.record(TransportCall::Action(packet))
    }

    fn abort(&mut self, _handle: ObexHandle, _packet: Option<ObexPacket>) -> Result<()> {
        self.record(TransportCall::Abort)
    }

    fn session(&mut self, _handle: ObexHandle, op: SessionOp) -> Result<()> {
        self.record(TransportCall::Session(op))
    }

    fn auth_response(
        &mut self,
        _handle: ObexHandle,
        password: &[u8],
        userid: Option<&[u8]>,
    ) -> Result<()> {
        self.record(TransportCall::AuthResponse {
            password: password.to_vec(),
            userid: userid.map(<[u8]>::to_vec),
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct DiscoveryLog {
    pub requests: Vec<ServiceClass>,
    pub records: Vec<RecordHandle>,
}

#[derive(Default)]
pub(crate) struct MockDiscovery {
    log: Shared<DiscoveryLog>,
}

impl ServiceDiscovery for MockDiscovery {
    fn discover(&mut self, _address: BdAddr, service: ServiceClass, _db_size: usize) -> Result<()> {
        self.log.lock().unwrap().requests.push(service);
        Ok(())
    }

    fn register_record(&mut self, _services: ServiceMask) -> Result<RecordHandle> {
        let record = RecordHandle(7);
        self.log.lock().unwrap().records.push(record);
        Ok(record)
    }

    fn remove_record(&mut self, handle: RecordHandle) {
        self.log.lock().unwrap().records.retain(|record| *record != handle);
    }
}

/// In-memory file system. Completions are posted on the bus, so they run
/// once the test settles the client.
#[derive(Debug, Default)]
pub(crate) struct FsState {
    pub files: HashMap<String, Vec<u8>>,
    /// Open files and their position
    open: HashMap<u32, (String, usize)>,
    next_fd: u32,
    pub saved: Option<SessionInfo>,
    pub fail_reads: bool,
}

impl FsState {
    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

pub(crate) struct MockFs {
    state: Shared<FsState>,
    bus: EventSender,
}

impl FsCallout for MockFs {
    fn open(&mut self, path: &str, mode: OpenMode, offset: u64, _app_id: u8) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let exists = state.files.contains_key(path);
        let event = if !exists && !mode.contains(OpenMode::CREATE) {
            Event::CiOpen {
                status: CalloutStatus::NotFound,
                fd: None,
                size: None,
            }
        } else {
            if !exists || mode.contains(OpenMode::TRUNCATE) {
                state.files.insert(path.to_owned(), Vec::new());
            }
            let size = state.files.get(path).map_or(0, Vec::len);
            let position = if mode.contains(OpenMode::APPEND) {
                size
            } else {
                offset as usize
            };
            state.next_fd += 1;
            let fd = state.next_fd;
            state.open.insert(fd, (path.to_owned(), position));
            Event::CiOpen {
                status: CalloutStatus::Ok,
                fd: Some(FileDescriptor(fd)),
                size: Some(size as u64),
            }
        };
        self.bus.post(event)
    }

    fn read(&mut self, fd: FileDescriptor, len: usize, _app_id: u8) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let segment = match state.open.get_mut(&fd.0) {
            Some((path, position)) if !state.fail_reads => {
                state.files.get(path.as_str()).map(|data| {
                    let end = (*position + len).min(data.len());
                    let chunk = Bytes::copy_from_slice(&data[*position..end]);
                    *position = end;
                    (chunk, end == data.len())
                })
            }
            _ => None,
        };
        let event = match segment {
            Some((chunk, eof)) => Event::CiRead {
                status: if eof {
                    CalloutStatus::Eof
                } else {
                    CalloutStatus::Ok
                },
                fd,
                data: chunk,
            },
            None => Event::CiRead {
                status: CalloutStatus::Fail,
                fd,
                data: Bytes::new(),
            },
        };
        self.bus.post(event)
    }

    fn write(&mut self, fd: FileDescriptor, data: Bytes, _app_id: u8) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let status = match state.open.get_mut(&fd.0) {
            Some((path, position)) => {
                let file = state.files.entry(path.clone()).or_default();
                file.truncate(*position);
                file.extend_from_slice(&data);
                *position += data.len();
                CalloutStatus::Ok
            }
            None => CalloutStatus::Fail,
        };
        self.bus.post(Event::CiWrite { status, fd })
    }

    fn close(&mut self, fd: FileDescriptor, _app_id: u8) -> Result<()> {
        self.state.lock().unwrap().open.remove(&fd.0);
        Ok(())
    }

    fn unlink(&mut self, path: &str, _app_id: u8) -> Result<()> {
        self.state.lock().unwrap().files.remove(path);
        Ok(())
    }

    fn suspend(&mut self, info: SessionInfo, _app_id: u8) -> Result<()> {
        self.state.lock().unwrap().saved = Some(info);
        Ok(())
    }

    fn resume(&mut self, _app_id: u8) -> Result<()> {
        let info = self.state.lock().unwrap().saved.clone();
        self.bus.post(Event::CiSession { info })
    }
}

pub(crate) fn recorder() -> (Callback, Shared<Vec<ClientEvent>>) {
    let events = Shared::<Vec<ClientEvent>>::default();
    let sink = Arc::clone(&events);
    let callback: Callback = Box::new(move |event| sink.lock().unwrap().push(event));
    (callback, events)
}

/// A response packet carrying `data` as body
pub(crate) fn body(data: &[u8], end: bool) -> ObexPacket {
    let data = Bytes::copy_from_slice(data);
    ObexPacket::with_capacity(0).with(if end {
        Header::EndOfBody(data)
    } else {
        Header::Body(data)
    })
}

pub(crate) struct Harness {
    pub client: FtcClient,
    pub calls: Shared<Vec<TransportCall>>,
    pub discovery: Shared<DiscoveryLog>,
    pub fs: Shared<FsState>,
    pub events: Shared<Vec<ClientEvent>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// An enabled client, with the enable event already consumed
    pub fn with_config(config: ClientConfig) -> Self {
        let (bus, receiver) = bus::channel();
        let transport = MockTransport::default();
        let calls = Arc::clone(&transport.calls);
        let discovery = MockDiscovery::default();
        let discovery_log = Arc::clone(&discovery.log);
        let fs = Shared::<FsState>::default();
        let callout = MockFs {
            state: Arc::clone(&fs),
            bus: bus.clone(),
        };
        let mut client = FtcClient::new(config, bus, receiver, transport, discovery, callout);
        let (callback, events) = recorder();
        client.enable(callback, 1);
        let harness = Self {
            client,
            calls,
            discovery: discovery_log,
            fs,
            events,
        };
        harness.take_events();
        harness
    }

    pub fn state(&self) -> Option<State> {
        self.client.state()
    }

    pub fn dispatch(&mut self, event: Event) {
        self.client.dispatch(event);
    }

    pub fn api(&mut self, request: ApiRequest) {
        self.dispatch(Event::Api(request));
    }

    pub fn obex(&mut self, kind: ObexEventKind, response: ResponseCode, packet: Option<ObexPacket>) {
        self.dispatch(Event::Obex(ObexEvent {
            handle: HANDLE,
            kind,
            response,
            packet,
        }));
    }

    /// Run the queued completions, then check that an active operation is
    /// still waiting on something
    pub fn settle(&mut self) {
        self.client.process_pending();
        if let Some(cb) = self.client.control_block() {
            if cb.state == State::Connected {
                assert!(
                    !cb.is_stalled(),
                    "{:?} has nothing outstanding",
                    cb.active_operation
                );
            }
        }
    }

    pub fn take_events(&self) -> Vec<ClientEvent> {
        mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn take_calls(&self) -> Vec<TransportCall> {
        mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.fs
            .lock()
            .unwrap()
            .files
            .insert(path.to_owned(), data.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.lock().unwrap().files.get(path).cloned()
    }

    pub fn open_request(services: ServiceMask, reliable: bool) -> ApiRequest {
        ApiRequest::Open(OpenRequest {
            address: PEER,
            security: SecurityMask::AUTHENTICATE | SecurityMask::ENCRYPT,
            services,
            reliable,
            nonce: reliable.then(|| Bytes::from_static(b"nonce")),
        })
    }

    /// Open a session to `service`, leaving no events or calls behind
    pub fn connect(&mut self, service: ServiceClass, peer_mtu: u16) {
        self.api(Self::open_request(service.mask(), false));
        self.settle();
        self.dispatch(Event::Sdp(SdpResult::Found {
            service,
            channel: Channel::Rfcomm(5),
            version: 0x0102,
        }));
        self.obex(
            ObexEventKind::ConnectRsp {
                peer_mtu,
                session: None,
            },
            ResponseCode::Ok,
            None,
        );
        self.settle();
        assert_eq!(self.state(), Some(State::Connected));
        self.take_events();
        self.take_calls();
    }

    /// Open a reliable File Transfer session. The peer resumes if the file
    /// system has a saved session.
    pub fn connect_reliable(&mut self) {
        self.api(Self::open_request(ServiceMask::FTP, true));
        self.settle();
        let saved_sequence = self
            .fs
            .lock()
            .unwrap()
            .saved
            .as_ref()
            .map(|info| info.sequence);
        self.dispatch(Event::Sdp(SdpResult::Found {
            service: ServiceClass::FileTransfer,
            channel: Channel::L2cap(0x1005),
            version: 0x0103,
        }));
        self.obex(
            ObexEventKind::ConnectRsp {
                peer_mtu: 4096,
                session: Some(SessionGrant {
                    token: TOKEN,
                    sequence: saved_sequence.unwrap_or(0),
                    resumed: saved_sequence.is_some(),
                }),
            },
            ResponseCode::Ok,
            None,
        );
        assert_eq!(self.state(), Some(State::Connected));
    }
}
