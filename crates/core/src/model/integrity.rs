use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A platform signal that may indicate exam-rule circumvention: leaving
/// full-screen, switching tabs, a blocked shortcut, or clicking outside the
/// exam root.
///
/// Advisory only — none of these carry server-verifiable enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrityEvent {
    WindowBlur,
    VisibilityHidden,
    FullscreenExited,
    BlockedShortcut(String),
    PointerOutsideExam,
}

impl fmt::Display for IntegrityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowBlur => write!(f, "window lost focus"),
            Self::VisibilityHidden => write!(f, "tab became hidden"),
            Self::FullscreenExited => write!(f, "full-screen was exited"),
            Self::BlockedShortcut(keys) => write!(f, "blocked shortcut: {keys}"),
            Self::PointerOutsideExam => write!(f, "click outside the exam area"),
        }
    }
}

/// A raised, not-yet-acknowledged warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityWarning {
    pub event: IntegrityEvent,
    pub raised_at: DateTime<Utc>,
}

/// Tracks integrity warnings for one session.
///
/// A warning stays pending until the user explicitly acknowledges it; it is
/// never auto-resolved and never terminates the session. Violations are
/// tallied per kind for reporting.
#[derive(Debug, Default, Clone)]
pub struct IntegrityMonitor {
    pending: Option<IntegrityWarning>,
    tally: HashMap<IntegrityEvent, u32>,
}

impl IntegrityMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a platform event and raises a warning. If a warning is
    /// already pending, the new event is tallied but the original warning
    /// stays the one to acknowledge.
    pub fn observe(&mut self, event: IntegrityEvent, now: DateTime<Utc>) -> &IntegrityWarning {
        *self.tally.entry(event.clone()).or_insert(0) += 1;
        self.pending.get_or_insert_with(|| IntegrityWarning {
            event,
            raised_at: now,
        })
    }

    /// Clears the pending warning after the user re-acknowledged.
    pub fn acknowledge(&mut self) {
        self.pending = None;
    }

    #[must_use]
    pub fn pending(&self) -> Option<&IntegrityWarning> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Times a given kind of event was observed during the session.
    #[must_use]
    pub fn count(&self, event: &IntegrityEvent) -> u32 {
        self.tally.get(event).copied().unwrap_or(0)
    }

    /// Total violations observed, across kinds.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.tally.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn observe_raises_a_pending_warning() {
        let mut monitor = IntegrityMonitor::new();
        assert!(!monitor.has_pending());

        let warning = monitor.observe(IntegrityEvent::WindowBlur, fixed_now());
        assert_eq!(warning.event, IntegrityEvent::WindowBlur);
        assert!(monitor.has_pending());
    }

    #[test]
    fn only_acknowledge_clears_the_warning() {
        let mut monitor = IntegrityMonitor::new();
        monitor.observe(IntegrityEvent::FullscreenExited, fixed_now());
        // A second event does not replace or clear the first.
        monitor.observe(IntegrityEvent::VisibilityHidden, fixed_now());
        assert_eq!(
            monitor.pending().unwrap().event,
            IntegrityEvent::FullscreenExited
        );

        monitor.acknowledge();
        assert!(!monitor.has_pending());
        assert_eq!(monitor.total(), 2);
    }

    #[test]
    fn tally_counts_per_kind() {
        let mut monitor = IntegrityMonitor::new();
        for _ in 0..3 {
            monitor.observe(IntegrityEvent::WindowBlur, fixed_now());
            monitor.acknowledge();
        }
        monitor.observe(
            IntegrityEvent::BlockedShortcut("ctrl+t".into()),
            fixed_now(),
        );
        assert_eq!(monitor.count(&IntegrityEvent::WindowBlur), 3);
        assert_eq!(monitor.total(), 4);
    }
}
