//! Single-shot folder and object operations: SetPath, delete and Action

use std::mem;

use tracing::{debug, trace};

use crate::{
    client::{Request, Session},
    discovery::ServiceClass,
    error::{status_of, Status},
    event::{ApiRequest, ChDir, Event},
    obex::{ActionId, Header, SetPathFlags},
    session::Operation,
};

impl Session<'_> {
    /// Admit an operation if the connected service supports it
    fn admit_folder(&mut self, operation: Operation, allowed: fn(ServiceClass) -> bool) -> bool {
        if !self.admit(operation) {
            return false;
        }
        if !matches!(self.cb.service_selector, Some(service) if allowed(service)) {
            self.refuse(operation, Status::NoPermission);
            return false;
        }
        true
    }

    pub(crate) fn change_dir(&mut self, event: &mut Event) {
        let Event::Api(ApiRequest::ChDir(target)) = event else {
            return;
        };
        let target = mem::replace(target, ChDir::Root);
        let operation = Operation::ChangeDir;
        if !self.admit_folder(operation, ServiceClass::allows_set_path) {
            return;
        }
        let mut packet = self.new_packet();
        let flags = match target {
            ChDir::Root => {
                // An empty name selects the root folder
                packet.push(Header::Name(String::new()));
                SetPathFlags::NO_CREATE
            }
            ChDir::Parent => SetPathFlags::BACKUP | SetPathFlags::NO_CREATE,
            ChDir::Child(name) if name.is_empty() => {
                self.refuse(operation, Status::NotFound);
                return;
            }
            ChDir::Child(name) => {
                packet.push(Header::Name(name));
                SetPathFlags::NO_CREATE
            }
        };
        debug!(?flags, name = ?packet.name(), "change folder");
        self.begin(operation, Request::SetPath { flags, packet });
    }

    pub(crate) fn make_dir(&mut self, event: &mut Event) {
        let Event::Api(ApiRequest::MakeDir { name }) = event else {
            return;
        };
        let name = mem::take(name);
        let operation = Operation::MakeDir;
        if !self.admit_folder(operation, ServiceClass::allows_folders) {
            return;
        }
        if name.is_empty() {
            self.refuse(operation, Status::NotFound);
            return;
        }
        debug!(%name, "make folder");
        let mut packet = self.new_packet();
        packet.push(Header::Name(name));
        self.begin(
            operation,
            Request::SetPath {
                flags: SetPathFlags::empty(),
                packet,
            },
        );
    }

    /// Delete is a Put with a name and no body
    pub(crate) fn remove(&mut self, event: &mut Event) {
        let Event::Api(ApiRequest::Remove { name }) = event else {
            return;
        };
        let name = mem::take(name);
        let operation = Operation::Delete;
        if !self.admit_folder(operation, ServiceClass::allows_folders) {
            return;
        }
        if name.is_empty() {
            self.refuse(operation, Status::NotFound);
            return;
        }
        debug!(%name, "delete");
        let mut packet = self.new_packet();
        packet.push(Header::Name(name));
        self.begin(
            operation,
            Request::Put {
                final_packet: true,
                packet,
            },
        );
    }

    pub(crate) fn object_action(&mut self, event: &mut Event) {
        let Event::Api(request) = event else {
            return;
        };
        let (operation, action, name, destination, permissions) = match request {
            ApiRequest::Copy {
                source,
                destination,
            } => (
                Operation::Copy,
                ActionId::Copy,
                mem::take(source),
                Some(mem::take(destination)),
                None,
            ),
            ApiRequest::Move {
                source,
                destination,
            } => (
                Operation::Move,
                ActionId::Move,
                mem::take(source),
                Some(mem::take(destination)),
                None,
            ),
            ApiRequest::SetPermission { name, permissions } => (
                Operation::SetPermission,
                ActionId::SetPermissions,
                mem::take(name),
                None,
                Some(*permissions),
            ),
            _ => return,
        };
        if !self.admit_folder(operation, ServiceClass::allows_folders) {
            return;
        }
        if name.is_empty() || destination.as_deref().is_some_and(str::is_empty) {
            self.refuse(operation, Status::NotFound);
            return;
        }

        debug!(?action, %name, ?destination, "action");
        let mut packet = self.new_packet();
        packet.push(Header::ActionId(action)).push(Header::Name(name));
        if let Some(destination) = destination {
            packet.push(Header::DestName(destination));
        }
        if let Some(permissions) = permissions {
            packet.push(Header::Permissions(permissions.to_header_value()));
        }
        self.begin(operation, Request::Action { packet });
    }

    /// Response to a SetPath or an Action
    pub(crate) fn single_shot_rsp(&mut self, event: &mut Event) {
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
            Some(
                Operation::MakeDir
                | Operation::ChangeDir
                | Operation::Copy
                | Operation::Move
                | Operation::SetPermission,
            ) => self.complete(status_of(response)),
            operation => trace!(?operation, ?response, "response dropped"),
        }
    }
}
