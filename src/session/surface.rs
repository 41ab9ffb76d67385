//! Display surfaces sessions render into.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a session's output goes; one per session.
///
/// Must be disposed before the owning session's remote PTY is killed.
pub trait DisplaySurface: Send + Sync {
    fn write(&self, bytes: &[u8]);

    /// Current (cols, rows)
    fn geometry(&self) -> (u16, u16);

    fn dispose(&self);
}

/// Surface that keeps everything written to it
#[derive(Debug)]
pub struct RecordingSurface {
    output: Mutex<Vec<u8>>,
    geometry: Mutex<(u16, u16)>,
    disposed: AtomicBool,
}

impl RecordingSurface {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            output: Mutex::new(Vec::new()),
            geometry: Mutex::new((cols, rows)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output.lock()).into_owned()
    }

    pub fn set_geometry(&self, cols: u16, rows: u16) {
        *self.geometry.lock() = (cols, rows);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl DisplaySurface for RecordingSurface {
    fn write(&self, bytes: &[u8]) {
        if !self.is_disposed() {
            self.output.lock().extend_from_slice(bytes);
        }
    }

    fn geometry(&self) -> (u16, u16) {
        *self.geometry.lock()
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}
