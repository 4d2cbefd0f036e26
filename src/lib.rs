//! OBEX File Transfer client.
//!
//! Connects to a peer's File Transfer, Object Push or Phone Book Access
//! service, browses and transfers objects and reports the outcome of every
//! request through an application callback.
//!
//! The OBEX engine, service discovery and local file access are collaborators
//! behind the [`obex::ObexTransport`], [`discovery::ServiceDiscovery`] and
//! [`callout::FsCallout`] traits. Their completions come back as events on the
//! bus created by [`bus::channel`], and [`client::FtcClient`] runs each of
//! them through the state machine in [`state`].
//!
//! The client spawns its response timer on the Tokio runtime, so it has to be
//! driven from within one.

#[macro_use]
extern crate num_derive;

mod action;
pub mod bus;
pub mod callout;
pub mod client;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod event;
pub mod obex;
pub mod session;
pub mod state;
pub mod tlv;

#[cfg(test)]
mod testing;

pub use client::{ClientHandle, FtcClient};
pub use config::ClientConfig;
pub use error::{Error, Result, Status};
pub use event::ClientEvent;
