//! Action handlers.
//!
//! Each handler runs inside a dispatch with exclusive access to the control
//! block and issues at most one transport request and one call-out.

use tracing::debug;

use crate::{
    client::{Request, Session},
    error::Status,
    session::{Operation, TransferProgress},
};

mod abort;
mod connect;
mod folder;
mod listing;
mod transfer;

impl Session<'_> {
    /// Refuse a new operation while another one owns the channel
    fn admit(&mut self, operation: Operation) -> bool {
        if let Some(active) = self.cb.active_operation {
            debug!(?active, requested = ?operation, "busy");
            self.refuse(operation, Status::Busy);
            return false;
        }
        true
    }

    /// Report a failure detected before anything was sent. The state is left as is.
    fn refuse(&mut self, operation: Operation, status: Status) {
        debug!(?operation, ?status, "request refused");
        self.report(operation.completion(status));
    }

    /// Start a single-shot operation
    fn begin(&mut self, operation: Operation, request: Request) {
        self.cb.active_operation = Some(operation);
        self.cb.transfer = TransferProgress::default();
        self.send(request);
    }
}
