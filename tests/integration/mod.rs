//! Cross-module scenarios: push ordering, merge identity, polling, prompts,
//! and the sandbox lifecycle against both remote backends.

mod local_backend;
mod merge_identity;
mod poller_feed;
mod prompt_sync;
mod push_ordering;
mod sandbox_lifecycle;
