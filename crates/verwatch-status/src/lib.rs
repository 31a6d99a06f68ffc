//! verwatch status ledger
//!
//! Per-service state shared by the tracking loop and the action
//! orchestrator:
//! - Approved/latest/deployed versions with their timestamps
//! - Tri-state fails table for Commands and WebHooks
//! - Announce, Persist and ManualSave delivery queues

#![warn(unreachable_pub)]

pub mod delivery;
pub mod error;
pub mod fails;
pub mod message;
pub mod status;

pub use delivery::{DeliveryChannels, DeliveryReceivers};
pub use error::StatusError;
pub use fails::{ActionKey, FailState, Fails};
pub use message::{
    ActionSummary, AnnounceMessage, AnnouncePayload, MessageType, Page, PersistField,
    PersistMessage, SaveSignal, StatusSummary, SubType,
};
pub use status::{GateMode, GateOutcome, Status, StatusSnapshot, SKIP_PREFIX};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
