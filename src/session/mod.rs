//! Session Multiplexer
//!
//! Terminal sessions over remote PTYs, with a prompt heuristic that
//! schedules a reconciliation pull once a command looks finished.

pub mod debounce;
pub mod multiplexer;
pub mod prompt;
pub mod surface;

pub use debounce::{DebounceAction, Debouncer};
pub use multiplexer::{SessionInfo, SessionMultiplexer, SessionState};
pub use prompt::{PromptDetector, BUILTIN_PROMPT_PATTERNS};
pub use surface::{DisplaySurface, RecordingSurface};
