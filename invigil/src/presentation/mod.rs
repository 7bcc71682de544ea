//! Presentation layer
//!
//! Terminal-facing view of the cancellation core: the live process panel,
//! the notice log standing in for toast notifications, and the async
//! confirmation gate for destructive bulk actions.

pub mod confirm;
pub mod notice;
pub mod panel;

pub use confirm::{ConfirmDecision, ConfirmGate};
pub use notice::{Notice, NoticeLevel, NoticeLog};
pub use panel::ProcessPanel;
