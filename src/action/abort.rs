//! Cooperative abort, reliable session suspend and resume.
//!
//! An abort completes once the abort exchange with the peer is over and no
//! call-out is left in flight. Only then is the operation's terminal event
//! reported, once.

use std::mem;

use tracing::{debug, error, trace, warn};

use crate::{
    callout::{OpenMode, SessionInfo},
    client::Session,
    error::{status_of, Status},
    event::Event,
    obex::{ObexEvent, ObexEventKind, ResponseCode, SessionOp, SuspendPoint},
    session::{AbortOrigin, AbortState, AbortStep, Operation, TimerPurpose, TransferProgress},
};

impl Session<'_> {
    pub(crate) fn abort(&mut self) {
        self.start_abort(AbortOrigin::Application);
    }

    pub(crate) fn start_abort(&mut self, origin: AbortOrigin) {
        let Some(operation) = self.cb.active_operation else {
            trace!("abort with no operation in progress");
            return;
        };
        if self.cb.is_aborting() {
            trace!("abort already in progress");
            return;
        }
        debug!(?operation, ?origin, "abort");
        let mut abort = AbortState::new(origin);
        if self.cb.callout_pending.is_none() {
            abort.progress.merge(AbortStep::CalloutDone);
        }
        let nothing_sent = !self.cb.transfer.request_sent && !self.cb.request_pending;
        if nothing_sent {
            abort.progress.merge(AbortStep::RequestSent);
            abort.progress.merge(AbortStep::ResponseReceived);
            self.cb.pending_packet = None;
        }
        // Some peers reject an abort that arrives before their first response
        let first_unanswered = self.cb.request_pending
            && (self.cb.transfer.first_packet || !operation.is_resumable());
        self.cb.abort = Some(abort);
        if !nothing_sent && !first_unanswered {
            self.send_abort();
        }
        self.check_abort_complete();
    }

    fn abort_step(&mut self, step: AbortStep) {
        if let Some(abort) = self.cb.abort.as_mut() {
            abort.progress.merge(step);
        }
    }

    fn send_abort(&mut self) {
        let Some(handle) = self.cb.handle else {
            self.abort_step(AbortStep::RequestSent);
            self.abort_step(AbortStep::ResponseReceived);
            return;
        };
        match self.io.transport.abort(handle, None) {
            Ok(()) => {
                debug!("abort request sent");
                self.cb.request_pending = true;
                self.abort_step(AbortStep::RequestSent);
                self.cb.response_timer.start(
                    TimerPurpose::Abort,
                    self.config.abort_timeout(),
                    &self.io.bus,
                );
            }
            Err(err) => {
                warn!(%err, "abort request failed");
                self.abort_step(AbortStep::RequestSent);
                self.abort_step(AbortStep::ResponseReceived);
            }
        }
    }

    /// A response to the request that was outstanding when the abort started
    pub(crate) fn abort_on_response(&mut self, response: ResponseCode) {
        let Some(abort) = self.cb.abort else {
            return;
        };
        if !abort.progress.request_sent {
            if response.is_continue() {
                self.send_abort();
            } else {
                debug!(?response, "exchange ended before the abort went out");
                self.abort_step(AbortStep::RequestSent);
                self.abort_step(AbortStep::ResponseReceived);
            }
        } else if !abort.progress.response_received {
            trace!(?response, "response overtaken by the abort");
            self.cb.request_pending = true;
        }
        self.check_abort_complete();
    }

    pub(crate) fn abort_rsp(&mut self, event: &mut Event) {
        let Event::Obex(obex) = event else {
            return;
        };
        let response = obex.response;
        self.cb.request_pending = false;
        self.cb.response_timer.stop();
        if !self.cb.is_aborting() {
            warn!(?response, "abort response without an abort");
            return;
        }
        debug!(?response, "abort acknowledged");
        self.abort_step(AbortStep::ResponseReceived);
        self.check_abort_complete();
    }

    pub(crate) fn abort_callout_done(&mut self) {
        self.abort_step(AbortStep::CalloutDone);
        self.check_abort_complete();
    }

    fn check_abort_complete(&mut self) {
        let Some(abort) = self.cb.abort.as_mut() else {
            return;
        };
        if abort.finished || !abort.progress.is_complete() {
            return;
        }
        abort.finished = true;
        let origin = abort.origin;
        // Tell the application who cancelled
        let response = match origin {
            AbortOrigin::Application => ResponseCode::Gone,
            AbortOrigin::Internal => ResponseCode::InternalServerError,
        };
        debug!(?origin, "abort complete");
        self.complete(status_of(response));
    }

    pub(crate) fn suspend(&mut self) {
        let (true, Some(handle), Some(_)) =
            (self.cb.open.reliable, self.cb.handle, self.cb.session_token)
        else {
            warn!("suspend needs a reliable session");
            self.dispatch(Event::SuspendRejected);
            return;
        };
        debug!(operation = ?self.cb.active_operation, "suspending");
        match self.io.transport.session(handle, SessionOp::Suspend) {
            Ok(()) => self.cb.response_timer.start(
                TimerPurpose::Suspend,
                self.config.suspend_timeout(),
                &self.io.bus,
            ),
            Err(err) => {
                warn!(%err, "suspend request failed");
                self.dispatch(Event::CloseRequest {
                    status: err.status(),
                });
            }
        }
    }

    /// The peer acknowledged the suspend, or the link dropped while suspending
    pub(crate) fn suspended(&mut self, event: &mut Event) {
        let Event::Obex(ObexEvent { kind, response, .. }) = event else {
            return;
        };
        let (response, point, link_lost) = match *kind {
            ObexEventKind::SessionRsp { .. } => (*response, None, false),
            ObexEventKind::Close { suspended } => (ResponseCode::Ok, suspended, true),
            _ => return,
        };
        self.cb.response_timer.stop();
        self.cb.request_pending = false;
        if !response.is_success() {
            warn!(?response, "peer refused the suspend");
            self.close_with(status_of(response));
            return;
        }
        self.save_session(point, Status::Aborted);
        self.cb.suspended = true;
        self.cb.close_status.get_or_insert(Status::Ok);
        if !link_lost {
            self.close_transport();
        }
    }

    /// The transport dropped while connected
    pub(crate) fn link_lost(&mut self, event: &mut Event) {
        let Event::Obex(ObexEvent {
            kind: ObexEventKind::Close { suspended },
            ..
        }) = *event
        else {
            return;
        };
        error!(operation = ?self.cb.active_operation, "transport connection lost");
        self.cb.request_pending = false;
        if self.cb.open.reliable && self.cb.session_token.is_some() {
            // A reliable session survives as an implicit suspend
            self.save_session(suspended, Status::TransportError);
            self.cb.suspended = true;
        } else {
            self.complete(Status::TransportError);
        }
        self.cb.close_status.get_or_insert(Status::TransportError);
    }

    /// Hand the session state to the file system layer and drop the
    /// operation. Multi-packet operations resume later, a single-shot one is
    /// completed with `single_shot_status` and left to the application to retry.
    fn save_session(&mut self, point: Option<SuspendPoint>, single_shot_status: Status) {
        let Some(token) = self.cb.session_token else {
            self.complete(single_shot_status);
            return;
        };
        let mut sequence = point.map_or(self.cb.sequence, |point| point.sequence);
        let mut operation = self.cb.active_operation;
        if let Some(single_shot) = operation.filter(|operation| !operation.is_resumable()) {
            debug!(operation = ?single_shot, "operation can't be resumed");
            sequence = sequence.wrapping_sub(1);
            operation = None;
            self.complete(single_shot_status);
        }
        let transfer = &self.cb.transfer;
        let offset = point.map_or(transfer.offset, |point| point.offset.min(transfer.offset));
        let info = SessionInfo {
            token,
            sequence,
            operation,
            local_path: operation.and(transfer.local_path.clone()),
            offset,
            total: transfer.total,
        };
        debug!(?info, "saving session");
        if let Err(err) = self.io.callout.suspend(info, self.cb.app_id) {
            warn!(%err, "could not save the session");
        }
        // The partial file stays for the resume
        self.cb.transfer.created_file = false;
        self.reset();
    }

    /// Continue a transfer that was in progress when the session got suspended
    pub(crate) fn resume_operation(&mut self, info: SessionInfo) {
        let Some(operation) = info.operation.filter(|operation| operation.is_resumable()) else {
            return;
        };
        debug!(?operation, offset = info.offset, "resuming");
        self.cb.active_operation = Some(operation);
        self.cb.transfer = TransferProgress {
            offset: info.offset,
            total: info.total,
            request_sent: true,
            local_path: info.local_path.clone(),
            ..Default::default()
        };
        match (operation, info.local_path) {
            (Operation::GetListing, _) => {
                self.send_get();
            }
            (Operation::GetFile, Some(path)) => {
                self.open_local(&path, OpenMode::WRITE | OpenMode::APPEND, info.offset)
            }
            (Operation::PutFile, Some(path)) => {
                self.open_local(&path, OpenMode::READ, info.offset)
            }
            (operation, _) => {
                warn!(?operation, "saved transfer has no local file");
                self.complete(Status::NotFound);
            }
        }
    }

    /// A call-out finished while a suspend is in progress
    pub(crate) fn callout_settled(&mut self, event: &mut Event) {
        self.cb.callout_pending = None;
        match *event {
            Event::CiOpen { fd: Some(fd), .. } => self.cb.file_descriptor = Some(fd),
            Event::CiWrite { status, .. } if status.is_ok() => {
                self.cb.transfer.offset += mem::take(&mut self.cb.transfer.in_flight) as u64;
            }
            _ => {}
        }
        if self.cb.is_aborting() {
            self.abort_step(AbortStep::CalloutDone);
        }
    }

    /// A response to an operation request arrived while suspending. The peer
    /// repeats it on resume.
    pub(crate) fn response_settled(&mut self) {
        trace!("response dropped while suspending");
        self.cb.request_pending = false;
    }

    pub(crate) fn timer_expired(&mut self, event: &mut Event) {
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
        warn!(?purpose, "response timer expired");
        self.complete(Status::Timeout);
        if let Some(handle) = self.cb.handle {
            self.io.transport.force_close(handle);
        }
        self.cb.transport_closed = true;
        self.dispatch(Event::CloseRequest {
            status: Status::Timeout,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::ClientConfig,
        discovery::ServiceClass,
        event::{ApiRequest, ClientEvent},
        obex::ReliableSession,
        state::State,
        testing::{body, Harness, TransportCall, TOKEN},
    };

    fn get_request() -> ApiRequest {
        ApiRequest::GetFile {
            remote: "big.bin".into(),
            local_path: "/tmp/big.bin".into(),
        }
    }

    /// Start a get and leave the write of its first segment in flight
    fn get_with_write_in_flight(harness: &mut Harness) {
        harness.api(get_request());
        harness.settle();
        let first = body(&[7; 1024], false).with(crate::obex::Header::Length(2048));
        harness.obex(ObexEventKind::GetRsp, ResponseCode::Continue, Some(first));
        harness.take_calls();
    }

    #[tokio::test]
    async fn test_abort_waits_for_the_write_in_flight() {
        let mut harness = Harness::new();
        harness.connect(ServiceClass::FileTransfer, 4096);
        get_with_write_in_flight(&mut harness);

        harness.api(ApiRequest::Abort);
        assert_eq!(harness.take_calls(), [TransportCall::Abort]);
        // A second abort is folded into the first
        harness.api(ApiRequest::Abort);
        assert!(harness.take_calls().is_empty());

        harness.settle();
        assert!(harness.take_events().is_empty());

        harness.obex(ObexEventKind::AbortRsp, ResponseCode::Ok, None);
        assert_eq!(
            harness.take_events(),
            [ClientEvent::GetFile {
                status: Status::Aborted
            }]
        );
        assert_eq!(harness.file("/tmp/big.bin"), None);
        let cb = harness.client.control_block().unwrap();
        assert!(cb.abort.is_none());
        assert!(cb.active_operation.is_none());
    }

    #[tokio::test]
    async fn test_abort_waits_for_the_first_response() {
        let mut harness = Harness::new();
        harness.connect(ServiceClass::FileTransfer, 4096);
        harness.api(get_request());
        harness.settle();
        harness.take_calls();

        // The peer has not answered yet, the abort goes out with its response
        harness.api(ApiRequest::Abort);
        assert!(harness.take_calls().is_empty());
        harness.obex(
            ObexEventKind::GetRsp,
            ResponseCode::Continue,
            Some(body(b"data", false)),
        );
        assert_eq!(harness.take_calls(), [TransportCall::Abort]);
        harness.obex(ObexEventKind::AbortRsp, ResponseCode::Ok, None);
        assert_eq!(
            harness.take_events(),
            [ClientEvent::GetFile {
                status: Status::Aborted
            }]
        );
    }

    #[tokio::test]
    async fn test_abort_overtakes_a_pending_put() {
        let mut harness = Harness::new();
        harness.connect(ServiceClass::FileTransfer, 255);
        harness.add_file("/docs/big.bin", &[3; 2000]);
        harness.api(ApiRequest::PutFile {
            local_path: "/docs/big.bin".into(),
        });
        harness.settle();
        harness.obex(ObexEventKind::PutRsp, ResponseCode::Continue, None);
        harness.settle();
        assert_eq!(harness.take_calls().len(), 2);
        harness.take_events();

        // A body put is outstanding
        harness.api(ApiRequest::Abort);
        assert_eq!(harness.take_calls(), [TransportCall::Abort]);

        harness.obex(ObexEventKind::PutRsp, ResponseCode::Continue, None);
        harness.settle();
        assert!(harness.take_calls().is_empty());
        assert!(harness.take_events().is_empty());
        assert!(harness.client.control_block().unwrap().request_pending);

        harness.obex(ObexEventKind::AbortRsp, ResponseCode::Ok, None);
        assert_eq!(
            harness.take_events(),
            [ClientEvent::PutFile {
                status: Status::Aborted
            }]
        );
        let cb = harness.client.control_block().unwrap();
        assert!(!cb.request_pending);
        assert!(cb.active_operation.is_none());
        assert_eq!(harness.fs.lock().unwrap().open_count(), 0);
    }

    #[tokio::test]
    async fn test_abort_overtakes_a_pending_get() {
        let mut harness = Harness::new();
        harness.connect(ServiceClass::FileTransfer, 4096);
        get_with_write_in_flight(&mut harness);
        harness.settle();
        let calls = harness.take_calls();
        assert!(matches!(&calls[..], [TransportCall::Get(_)]), "{calls:?}");
        harness.take_events();

        harness.api(ApiRequest::Abort);
        assert_eq!(harness.take_calls(), [TransportCall::Abort]);
        harness.obex(ObexEventKind::AbortRsp, ResponseCode::Ok, None);
        assert_eq!(
            harness.take_events(),
            [ClientEvent::GetFile {
                status: Status::Aborted
            }]
        );
        assert_eq!(harness.file("/tmp/big.bin"), None);

        // The answer to the overtaken get comes too late to matter
        harness.obex(
            ObexEventKind::GetRsp,
            ResponseCode::Continue,
            Some(body(&[7; 1024], false)),
        );
        harness.settle();
        assert!(harness.take_calls().is_empty());
        assert!(harness.take_events().is_empty());
        assert_eq!(harness.state(), Some(State::Connected));
    }

    #[tokio::test]
    async fn test_abort_before_anything_was_sent() {
        let mut harness = Harness::new();
        harness.connect(ServiceClass::FileTransfer, 4096);
        harness.api(get_request());
        // The open is still in flight
        harness.api(ApiRequest::Abort);
        assert!(harness.take_events().is_empty());
        harness.settle();

        assert!(harness.take_calls().is_empty());
        assert_eq!(
            harness.take_events(),
            [ClientEvent::GetFile {
                status: Status::Aborted
            }]
        );
        assert_eq!(harness.file("/tmp/big.bin"), None);
        assert_eq!(harness.fs.lock().unwrap().open_count(), 0);
    }

    #[tokio::test]
    async fn test_abort_without_operation() {
        let mut harness = Harness::new();
        harness.connect(ServiceClass::FileTransfer, 4096);
        harness.api(ApiRequest::Abort);
        assert!(harness.take_calls().is_empty());
        assert!(harness.take_events().is_empty());
        assert_eq!(harness.state(), Some(State::Connected));
    }

    #[tokio::test]
    async fn test_abort_timeout_closes_the_session() {
        let mut harness = Harness::with_config(ClientConfig {
            abort_timeout_ms: 20,
            ..Default::default()
        });
        harness.connect(ServiceClass::FileTransfer, 4096);
        get_with_write_in_flight(&mut harness);
        harness.api(ApiRequest::Abort);
        harness.settle();

        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.settle();
        assert_eq!(
            harness.take_events(),
            [
                ClientEvent::GetFile {
                    status: Status::Timeout
                },
                ClientEvent::Close {
                    status: Status::Timeout,
                    suspended: false
                },
            ]
        );
        assert!(harness.take_calls().contains(&TransportCall::ForceClose));
        assert_eq!(harness.state(), Some(State::Idle));
    }

    #[tokio::test]
    async fn test_suspend_needs_a_reliable_session() {
        let mut harness = Harness::new();
        harness.connect(ServiceClass::FileTransfer, 4096);
        harness.api(ApiRequest::Suspend);
        assert_eq!(harness.state(), Some(State::Connected));
        assert!(harness.take_calls().is_empty());
        assert!(harness.take_events().is_empty());
    }

    #[tokio::test]
    async fn test_suspend_and_resume_a_get() {
        let mut harness = Harness::new();
        harness.connect_reliable();
        harness.settle();
        assert_eq!(
            harness.take_events(),
            [ClientEvent::Open {
                status: Status::Ok,
                service: Some(ServiceClass::FileTransfer),
                version: 0x0103,
                resumed: false
            }]
        );

        // First half of the file
        harness.api(get_request());
        harness.settle();
        let first = body(&[1; 1024], false).with(crate::obex::Header::Length(2048));
        harness.obex(ObexEventKind::GetRsp, ResponseCode::Continue, Some(first));
        harness.settle();
        harness.take_calls();

        harness.api(ApiRequest::Suspend);
        assert_eq!(harness.state(), Some(State::Suspending));
        assert_eq!(
            harness.take_calls(),
            [TransportCall::Session(SessionOp::Suspend)]
        );
        harness.obex(
            ObexEventKind::SessionRsp {
                op: SessionOp::Suspend,
            },
            ResponseCode::Ok,
            None,
        );
        assert_eq!(harness.take_calls(), [TransportCall::Disconnect]);
        harness.obex(ObexEventKind::Close { suspended: None }, ResponseCode::Ok, None);
        assert_eq!(harness.state(), Some(State::Idle));
        assert_eq!(
            harness.take_events(),
            [
                ClientEvent::Progress {
                    bytes: 1024,
                    total: Some(2048)
                },
                ClientEvent::Close {
                    status: Status::Ok,
                    suspended: true
                },
            ]
        );
        let saved = harness.fs.lock().unwrap().saved.clone().unwrap();
        assert_eq!(saved.operation, Some(Operation::GetFile));
        assert_eq!(saved.offset, 1024);
        assert_eq!(saved.sequence, 2);
        // The partial file stays for the resume
        assert_eq!(harness.file("/tmp/big.bin").map(|file| file.len()), Some(1024));

        harness.connect_reliable();
        let calls = harness.take_calls();
        let Some(TransportCall::Connect(request, _)) = calls.first() else {
            panic!("expected a connect, got {calls:?}");
        };
        assert_eq!(
            request.reliable,
            Some(ReliableSession::Resume {
                token: TOKEN,
                sequence: 2
            })
        );
        harness.settle();
        let calls = harness.take_calls();
        let [TransportCall::Get(packet)] = &calls[..] else {
            panic!("expected the get to continue, got {calls:?}");
        };
        assert!(packet.is_empty());

        harness.obex(
            ObexEventKind::GetRsp,
            ResponseCode::Ok,
            Some(body(&[2; 1024], true)),
        );
        harness.settle();
        assert_eq!(
            harness.take_events(),
            [
                ClientEvent::Open {
                    status: Status::Ok,
                    service: Some(ServiceClass::FileTransfer),
                    version: 0x0103,
                    resumed: true
                },
                ClientEvent::Progress {
                    bytes: 1024,
                    total: Some(2048)
                },
                ClientEvent::GetFile { status: Status::Ok },
            ]
        );
        let file = harness.file("/tmp/big.bin").unwrap();
        assert_eq!(file.len(), 2048);
        assert_eq!((file[0], file[2047]), (1, 2));
    }

    #[tokio::test]
    async fn test_suspend_and_resume_a_put() {
        let mut harness = Harness::new();
        harness.connect_reliable();
        harness.settle();
        harness.take_events();
        harness.take_calls();

        let room = crate::obex::ObexPacket::with_capacity(4096).body_room();
        let data: Vec<u8> = (0..2 * room + 100).map(|i| i as u8).collect();
        let total = Some(data.len() as u64);
        harness.add_file("/docs/big.bin", &data);
        harness.api(ApiRequest::PutFile {
            local_path: "/docs/big.bin".into(),
        });
        harness.settle();
        harness.obex(ObexEventKind::PutRsp, ResponseCode::Continue, None);
        harness.settle();
        assert_eq!(harness.take_calls().len(), 2);

        // Suspend with the first body segment unanswered
        harness.api(ApiRequest::Suspend);
        harness.obex(
            ObexEventKind::SessionRsp {
                op: SessionOp::Suspend,
            },
            ResponseCode::Ok,
            None,
        );
        harness.obex(ObexEventKind::Close { suspended: None }, ResponseCode::Ok, None);
        assert_eq!(harness.state(), Some(State::Idle));
        assert_eq!(
            harness.take_events(),
            [
                ClientEvent::Progress { bytes: room, total },
                ClientEvent::Close {
                    status: Status::Ok,
                    suspended: true
                },
            ]
        );
        let saved = harness.fs.lock().unwrap().saved.clone().unwrap();
        assert_eq!(saved.operation, Some(Operation::PutFile));
        assert_eq!(saved.local_path.as_deref(), Some("/docs/big.bin"));
        assert_eq!(saved.offset, room as u64);
        assert_eq!(saved.sequence, 2);
        assert_eq!(harness.fs.lock().unwrap().open_count(), 0);
        harness.take_calls();

        // The file is reopened at the saved offset and the put carries on
        harness.connect_reliable();
        harness.settle();
        let mut sent = Vec::new();
        loop {
            let calls = harness.take_calls();
            let Some(TransportCall::Put {
                final_packet,
                mut packet,
            }) = calls.into_iter().last()
            else {
                panic!("expected the put to continue");
            };
            let (segment, _) = packet.take_body().unwrap();
            sent.extend_from_slice(&segment);
            if final_packet {
                break;
            }
            harness.obex(ObexEventKind::PutRsp, ResponseCode::Continue, None);
            harness.settle();
        }
        assert_eq!(sent, data[room..]);
        harness.obex(ObexEventKind::PutRsp, ResponseCode::Ok, None);
        assert_eq!(
            harness.take_events(),
            [
                ClientEvent::Open {
                    status: Status::Ok,
                    service: Some(ServiceClass::FileTransfer),
                    version: 0x0103,
                    resumed: true
                },
                ClientEvent::Progress { bytes: room, total },
                ClientEvent::Progress { bytes: 100, total },
                ClientEvent::PutFile { status: Status::Ok },
            ]
        );
        assert_eq!(harness.fs.lock().unwrap().open_count(), 0);
    }

    #[tokio::test]
    async fn test_unanswered_suspend_closes_the_session() {
        let mut harness = Harness::with_config(ClientConfig {
            suspend_timeout_ms: 20,
            ..Default::default()
        });
        harness.connect_reliable();
        harness.settle();
        harness.api(get_request());
        harness.settle();
        harness.take_events();
        harness.take_calls();

        harness.api(ApiRequest::Suspend);
        assert_eq!(harness.state(), Some(State::Suspending));
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.settle();

        assert_eq!(
            harness.take_events(),
            [
                ClientEvent::GetFile {
                    status: Status::Timeout
                },
                ClientEvent::Close {
                    status: Status::Timeout,
                    suspended: false
                },
            ]
        );
        assert!(harness.take_calls().contains(&TransportCall::ForceClose));
        assert_eq!(harness.state(), Some(State::Idle));
        // Nothing to resume from
        assert!(harness.fs.lock().unwrap().saved.is_none());
        assert_eq!(harness.file("/tmp/big.bin"), None);
    }

    #[tokio::test]
    async fn test_link_loss_suspends_a_reliable_session() {
        let mut harness = Harness::new();
        harness.connect_reliable();
        harness.settle();
        harness.api(ApiRequest::MakeDir {
            name: "new".into(),
        });
        harness.take_events();

        harness.obex(ObexEventKind::Close { suspended: None }, ResponseCode::Ok, None);
        assert_eq!(
            harness.take_events(),
            [
                ClientEvent::MkDir {
                    status: Status::TransportError
                },
                ClientEvent::Close {
                    status: Status::TransportError,
                    suspended: true
                },
            ]
        );
        let saved = harness.fs.lock().unwrap().saved.clone().unwrap();
        // The make dir is not replayed on resume
        assert_eq!(saved.operation, None);
        assert_eq!(saved.sequence, 0);
    }

    #[tokio::test]
    async fn test_link_loss_fails_the_transfer() {
        let mut harness = Harness::new();
        harness.connect(ServiceClass::FileTransfer, 4096);
        harness.api(get_request());
        harness.settle();

        harness.obex(ObexEventKind::Close { suspended: None }, ResponseCode::Ok, None);
        assert_eq!(
            harness.take_events(),
            [
                ClientEvent::GetFile {
                    status: Status::TransportError
                },
                ClientEvent::Close {
                    status: Status::TransportError,
                    suspended: false
                },
            ]
        );
        assert_eq!(harness.file("/tmp/big.bin"), None);
        assert_eq!(harness.state(), Some(State::Idle));
    }
}
