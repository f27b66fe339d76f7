use derive_more::Display;

/// Where an editing session stands, as far as durability goes.
///
/// Exactly one of these is current at any time; the display layer never has
/// to guess.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveStatus {
    /// Nothing to save: the buffer matches the remote record.
    #[display("idle")]
    Idle,
    /// Edited, waiting for the quiescence interval.
    #[display("dirty")]
    Dirty,
    /// A remote save is in flight.
    #[display("saving")]
    Saving,
    /// The last edit is durably saved remotely.
    #[display("saved")]
    Saved,
    /// The last save attempt failed; it may be retried automatically.
    #[display("error")]
    Error,
    /// The remote holds content this session never saw. Needs a decision.
    #[display("conflict")]
    Conflict,
    /// A local revision newer than the remote record is available.
    #[display("draft")]
    Draft,
}

/// The user-facing recovery actions.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    #[display("force save")]
    ForceSave,
    #[display("discard")]
    Discard,
    #[display("apply draft")]
    ApplyDraft,
}
