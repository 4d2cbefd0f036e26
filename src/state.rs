//! Client state machine.
//!
//! Every `(state, event)` pair maps to at most two actions and a next state.
//! Pairs not listed are ignored and leave the state unchanged. The dispatcher
//! moves to the next state before running the actions.

use crate::event::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    #[default]
    Idle,
    AwaitingConnect,
    Connected,
    Suspending,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    // Lifecycle
    Disable,
    MarkDisabling,
    // Connection
    InitOpen,
    SessionInfo,
    DiscoverNext,
    SdpFail,
    ObexConnect,
    ConnectRsp,
    Password,
    AuthResponse,
    StartClose,
    ForceClose,
    TransportClosed,
    CloseComplete,
    // Transfers
    PutFile,
    GetFile,
    GetPhoneBook,
    GetVCard,
    PutRsp,
    GetRsp,
    CiOpen,
    CiRead,
    CiWrite,
    // Listing
    ListDir,
    ListPhoneBook,
    // Folder and object operations
    ChDir,
    MakeDir,
    Remove,
    ObjectAction,
    SetPathRsp,
    ActionRsp,
    // Abort, suspend and resume
    Abort,
    AbortRsp,
    Suspend,
    Suspended,
    LinkLost,
    CalloutSettled,
    ResponseSettled,
    TimerExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: State,
    pub actions: [Option<Action>; 2],
}

impl Transition {
    const fn ignore(state: State) -> Self {
        Self {
            next: state,
            actions: [None, None],
        }
    }

    const fn one(action: Action, next: State) -> Self {
        Self {
            next,
            actions: [Some(action), None],
        }
    }

    const fn two(first: Action, second: Action, next: State) -> Self {
        Self {
            next,
            actions: [Some(first), Some(second)],
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.actions[0].is_none()
    }
}

pub fn transition(state: State, event: EventKind) -> Transition {
    use Action as A;
    use EventKind as E;
    use State as S;
    use Transition as T;

    match (state, event) {
        (S::Idle, E::ApiOpen) => T::one(A::InitOpen, S::AwaitingConnect),
        (S::Idle, E::ApiDisable) => T::one(A::Disable, S::Idle),
        (S::Idle, _) => T::ignore(S::Idle),

        (S::AwaitingConnect, E::ApiDisable) => {
            T::two(A::MarkDisabling, A::StartClose, S::Closing)
        }
        (S::AwaitingConnect, E::ApiClose | E::CloseRequest) => T::one(A::StartClose, S::Closing),
        (S::AwaitingConnect, E::CiSession) => T::one(A::SessionInfo, S::AwaitingConnect),
        (S::AwaitingConnect, E::SdpOk) => T::one(A::ObexConnect, S::AwaitingConnect),
        (S::AwaitingConnect, E::SdpFail) => T::one(A::SdpFail, S::AwaitingConnect),
        (S::AwaitingConnect, E::NextService) => T::one(A::DiscoverNext, S::AwaitingConnect),
        (S::AwaitingConnect, E::ObxConnectRsp) => T::one(A::ConnectRsp, S::Connected),
        (S::AwaitingConnect, E::ObxPassword) => T::one(A::Password, S::AwaitingConnect),
        (S::AwaitingConnect, E::ApiAuthResponse) => T::one(A::AuthResponse, S::AwaitingConnect),
        (S::AwaitingConnect, E::ObxClose) => T::one(A::TransportClosed, S::Closing),
        (S::AwaitingConnect, _) => T::ignore(S::AwaitingConnect),

        (S::Connected, E::ApiDisable) => T::two(A::MarkDisabling, A::StartClose, S::Closing),
        (S::Connected, E::ApiClose | E::CloseRequest) => T::one(A::StartClose, S::Closing),
        (S::Connected, E::ApiPutFile) => T::one(A::PutFile, S::Connected),
        (S::Connected, E::ApiGetFile) => T::one(A::GetFile, S::Connected),
        (S::Connected, E::ApiGetPhoneBook) => T::one(A::GetPhoneBook, S::Connected),
        (S::Connected, E::ApiGetVCard) => T::one(A::GetVCard, S::Connected),
        (S::Connected, E::ApiListDir) => T::one(A::ListDir, S::Connected),
        (S::Connected, E::ApiListPhoneBook) => T::one(A::ListPhoneBook, S::Connected),
        (S::Connected, E::ApiChDir) => T::one(A::ChDir, S::Connected),
        (S::Connected, E::ApiMakeDir) => T::one(A::MakeDir, S::Connected),
        (S::Connected, E::ApiRemove) => T::one(A::Remove, S::Connected),
        (S::Connected, E::ApiAction) => T::one(A::ObjectAction, S::Connected),
        (S::Connected, E::ApiAbort) => T::one(A::Abort, S::Connected),
        (S::Connected, E::ApiSuspend) => T::one(A::Suspend, S::Suspending),
        (S::Connected, E::ApiAuthResponse) => T::one(A::AuthResponse, S::Connected),
        (S::Connected, E::ObxPutRsp) => T::one(A::PutRsp, S::Connected),
        (S::Connected, E::ObxGetRsp) => T::one(A::GetRsp, S::Connected),
        (S::Connected, E::ObxSetPathRsp) => T::one(A::SetPathRsp, S::Connected),
        (S::Connected, E::ObxActionRsp) => T::one(A::ActionRsp, S::Connected),
        (S::Connected, E::ObxAbortRsp) => T::one(A::AbortRsp, S::Connected),
        (S::Connected, E::ObxPassword) => T::one(A::Password, S::Connected),
        (S::Connected, E::ObxClose) => T::two(A::LinkLost, A::TransportClosed, S::Closing),
        (S::Connected, E::CiOpen) => T::one(A::CiOpen, S::Connected),
        (S::Connected, E::CiRead) => T::one(A::CiRead, S::Connected),
        (S::Connected, E::CiWrite) => T::one(A::CiWrite, S::Connected),
        (S::Connected, E::ResponseTimeout) => T::one(A::TimerExpired, S::Connected),
        (S::Connected, _) => T::ignore(S::Connected),

        (S::Suspending, E::ApiDisable) => T::one(A::MarkDisabling, S::Suspending),
        (S::Suspending, E::SuspendRejected) => T::ignore(S::Connected),
        (S::Suspending, E::ObxSessionRsp) => T::one(A::Suspended, S::Closing),
        (S::Suspending, E::ObxClose) => T::two(A::Suspended, A::TransportClosed, S::Closing),
        (
            S::Suspending,
            E::ObxPutRsp | E::ObxGetRsp | E::ObxSetPathRsp | E::ObxActionRsp | E::ObxAbortRsp,
        ) => T::one(A::ResponseSettled, S::Suspending),
        (S::Suspending, E::CiOpen | E::CiRead | E::CiWrite) => {
            T::one(A::CalloutSettled, S::Suspending)
        }
        (S::Suspending, E::ResponseTimeout) => T::one(A::TimerExpired, S::Suspending),
        (S::Suspending, E::CloseRequest) => T::one(A::StartClose, S::Closing),
        (S::Suspending, _) => T::ignore(S::Suspending),

        (S::Closing, E::ApiDisable) => T::one(A::MarkDisabling, S::Closing),
        (S::Closing, E::ObxClose | E::SdpOk | E::SdpFail) => {
            T::one(A::TransportClosed, S::Closing)
        }
        (S::Closing, E::ResponseTimeout) => T::one(A::ForceClose, S::Closing),
        (S::Closing, E::CloseComplete) => T::one(A::CloseComplete, S::Idle),
        (S::Closing, _) => T::ignore(S::Closing),
    }
}
