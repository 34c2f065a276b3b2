//! Quiet-window policy for suggestion triggers

use std::time::Instant;

use crate::config::{DebounceConfig, DebounceMode};

/// Decision for one trigger attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission<P> {
    Issue(P),
    Discard,
    /// Held back; issued by [`Debouncer::take_due`] when the window has passed
    Defer,
}

/// Applies the quiet window against the last *issued* trigger, so steady
/// typing still produces one request per window.
#[derive(Debug)]
pub struct Debouncer<P> {
    config: DebounceConfig,
    last_issued: Option<Instant>,
    deferred: Option<P>,
}

impl<P> Debouncer<P> {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            last_issued: None,
            deferred: None,
        }
    }

    /// Decide what to do with a trigger carrying `params` at `now`
    pub fn admit(&mut self, params: P, now: Instant) -> Admission<P> {
        let within_window = self
            .last_issued
            .map(|last| now.saturating_duration_since(last) < self.config.quiet_window)
            .unwrap_or(false);

        match (self.config.mode, within_window) {
            (DebounceMode::Off, _) | (_, false) => {
                self.last_issued = Some(now);
                self.deferred = None;
                Admission::Issue(params)
            }
            (DebounceMode::Discard, true) => Admission::Discard,
            (DebounceMode::Trailing, true) => {
                self.deferred = Some(params);
                Admission::Defer
            }
        }
    }

    /// When the deferred trigger becomes due
    pub fn deadline(&self) -> Option<Instant> {
        match (&self.deferred, self.last_issued) {
            (Some(_), Some(last)) => Some(last + self.config.quiet_window),
            _ => None,
        }
    }

    /// Hand out the deferred trigger if its window has passed
    pub fn take_due(&mut self, now: Instant) -> Option<P> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.last_issued = Some(now);
        self.deferred.take()
    }

    /// Forget any deferred trigger
    pub fn reset(&mut self) {
        self.deferred = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(mode: DebounceMode) -> DebounceConfig {
        DebounceConfig {
            quiet_window: Duration::from_millis(200),
            mode,
        }
    }

    #[test]
    fn test_discard_drops_triggers_inside_window() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(config(DebounceMode::Discard));

        assert_eq!(debouncer.admit("k", t0), Admission::Issue("k"));
        assert_eq!(debouncer.admit("ki", t0 + Duration::from_millis(50)), Admission::Discard);
        assert_eq!(debouncer.admit("kir", t0 + Duration::from_millis(199)), Admission::Discard);
        assert_eq!(debouncer.admit("kirk", t0 + Duration::from_millis(200)), Admission::Issue("kirk"));
        assert!(debouncer.deadline().is_none());
    }

    #[test]
    fn test_trailing_issues_latest_after_window() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(config(DebounceMode::Trailing));

        debouncer.admit("k", t0);
        assert_eq!(debouncer.admit("ki", t0 + Duration::from_millis(20)), Admission::Defer);
        assert_eq!(debouncer.admit("kir", t0 + Duration::from_millis(40)), Admission::Defer);
        assert_eq!(debouncer.deadline(), Some(t0 + Duration::from_millis(200)));

        assert_eq!(debouncer.take_due(t0 + Duration::from_millis(100)), None);
        assert_eq!(debouncer.take_due(t0 + Duration::from_millis(200)), Some("kir"));
        assert_eq!(debouncer.take_due(t0 + Duration::from_millis(900)), None);
    }

    #[test]
    fn test_off_always_issues() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(config(DebounceMode::Off));
        assert_eq!(debouncer.admit(1, t0), Admission::Issue(1));
        assert_eq!(debouncer.admit(2, t0), Admission::Issue(2));
    }
}
