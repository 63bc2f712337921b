//! User-facing cart notifications.
//!
//! Every aborted cart operation emits exactly one [`Notice`]. Notices are
//! fire-and-forget: there is no acknowledgement and no retry.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

/// Kind of problem reported to the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// Requested quantity exceeds available stock.
    OutOfStock,
    /// Adding a product failed for any other reason.
    AddFailed,
    /// Removing a product failed.
    RemoveFailed,
    /// Changing a line's amount failed for any other reason.
    UpdateFailed,
}

impl Notice {
    /// Fixed message shown to the shopper (pt-BR).
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::OutOfStock => "Quantidade solicitada fora de estoque",
            Self::AddFailed => "Erro na adição do produto",
            Self::RemoveFailed => "Erro na remoção do produto",
            Self::UpdateFailed => "Erro na alteração de quantidade do produto",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Sink for error-severity notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Logs each notice through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        tracing::warn!(kind = ?notice, message = notice.message(), "Cart notice");
    }
}

/// Keeps notices in memory until drained.
///
/// Used by tests to assert which notices an operation emitted. HTTP
/// responses take their notice from `CartOutcome::notice` instead.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices emitted so far, oldest first.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Take all notices, leaving the recorder empty.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
