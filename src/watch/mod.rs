//! Change Poller
//!
//! Detects remote-side mutations (for example from a build tool running in
//! the sandbox) and reports them as created/modified/deleted events.

pub mod events;
pub mod poller;
pub mod source;

pub use events::{ChangeEvent, ChangeKind, Fingerprint, FingerprintMap};
pub use poller::RemotePoller;
pub use source::{ChangeCallback, ChangeSource, Subscribers, Subscription};
