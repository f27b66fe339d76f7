//! Autosave for script editing sessions.
//!
//! A [`SaveCoordinator`] owns one editing session for one
//! [`PartitionKey`](draftcast_history::PartitionKey). It decides when an edit
//! is pushed to the remote project record, keeps a [`SaveStatus`] the display
//! layer can always render, records every durable save in the
//! [`RevisionStore`](draftcast_history::RevisionStore), and stops to ask the
//! user whenever the remote turns out to hold content this session never saw.
//!
//! The remote service itself is abstracted behind [`RemoteSave`].

mod coordinator;
pub mod error;
pub mod remote;
mod schedule;
mod settings;
mod status;

pub use crate::coordinator::{Conflict, RemoteSnapshot, SaveCoordinator, SaveCoordinatorBuilder, SessionView};
pub use crate::remote::{RemoteAck, RemoteContent, RemoteHandle, RemoteSave, SaveRequest};
pub use crate::schedule::DelayedTask;
pub use crate::settings::{AutosaveSettings, DivergenceCheck};
pub use crate::status::{Action, SaveStatus};
