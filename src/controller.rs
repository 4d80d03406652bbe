//! Trigger/lifecycle controller.
//!
//! Owns the busy/idle state of the download trigger and runs capture,
//! packaging and delivery in sequence. It is the only place failures are
//! handled: one alert for the user, one error record for diagnostics, and
//! the trigger always returns to idle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use crate::capture::{capture, CaptureOptions, Viewport};
use crate::delivery::{DeliveryReceipt, DeliverySink};
use crate::error::ExportError;
use crate::packaging::Packager;
use crate::region::SourceRegion;

pub const IDLE_LABEL: &str = "Download Resume (PDF)";
pub const BUSY_LABEL: &str = "Generating PDF...";
pub const FAILURE_ALERT: &str = "Failed to generate PDF. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    InProgress,
}

/// The download button: enabled with the idle label, or disabled with the
/// busy label while an export runs.
#[derive(Debug)]
pub struct TriggerControl {
    state: Cell<ExportState>,
    label: RefCell<String>,
}

impl Default for TriggerControl {
    fn default() -> Self {
        Self {
            state: Cell::new(ExportState::Idle),
            label: RefCell::new(IDLE_LABEL.to_string()),
        }
    }
}

impl TriggerControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ExportState {
        self.state.get()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.get() == ExportState::Idle
    }

    pub fn label(&self) -> String {
        self.label.borrow().clone()
    }

    fn set(&self, state: ExportState, label: &str) {
        self.state.set(state);
        *self.label.borrow_mut() = label.to_string();
    }
}

/// Holds the trigger busy for its lifetime.
struct BusyGuard<'a> {
    control: &'a TriggerControl,
}

impl<'a> BusyGuard<'a> {
    /// `None` when an export is already running.
    fn acquire(control: &'a TriggerControl) -> Option<Self> {
        if control.state() == ExportState::InProgress {
            return None;
        }
        control.set(ExportState::InProgress, BUSY_LABEL);
        Some(Self { control })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.control.set(ExportState::Idle, IDLE_LABEL);
    }
}

/// Shows a message to the user.
pub trait Notifier {
    fn alert(&self, message: &str);
}

/// Prints alerts to stderr.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}

#[derive(Debug)]
pub enum TriggerOutcome {
    /// No region handle; nothing happened.
    NoRegion,
    /// An export was already running; this trigger was ignored.
    AlreadyRunning,
    Delivered(DeliveryReceipt),
    Failed(ExportError),
}

pub struct ExportController {
    trigger: Rc<TriggerControl>,
    region: Option<Arc<dyn SourceRegion>>,
    viewport: Viewport,
    capture_options: CaptureOptions,
    packager: Packager,
    sink: Box<dyn DeliverySink>,
    notifier: Rc<dyn Notifier>,
}

impl ExportController {
    pub fn new(
        trigger: Rc<TriggerControl>,
        region: Option<Arc<dyn SourceRegion>>,
        packager: Packager,
        sink: Box<dyn DeliverySink>,
        notifier: Rc<dyn Notifier>,
    ) -> Self {
        Self {
            trigger,
            region,
            viewport: Viewport::default(),
            capture_options: CaptureOptions::default(),
            packager,
            sink,
            notifier,
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_capture_options(mut self, options: CaptureOptions) -> Self {
        self.capture_options = options;
        self
    }

    /// Handle one activation of the download trigger.
    pub async fn trigger(&self) -> TriggerOutcome {
        let Some(region) = self.region.as_deref() else {
            return TriggerOutcome::NoRegion;
        };
        let Some(_busy) = BusyGuard::acquire(&self.trigger) else {
            log::debug!("export already in progress; trigger ignored");
            return TriggerOutcome::AlreadyRunning;
        };

        match self.run(region).await {
            Ok(receipt) => TriggerOutcome::Delivered(receipt),
            Err(e) => {
                log::error!("PDF export failed in {} stage: {e}", e.stage());
                self.notifier.alert(FAILURE_ALERT);
                TriggerOutcome::Failed(e)
            }
        }
    }

    async fn run(&self, region: &dyn SourceRegion) -> Result<DeliveryReceipt, ExportError> {
        let snapshot = capture(Some(region), self.viewport, &self.capture_options).await?;
        let document = self.packager.package(snapshot)?;
        Ok(self.sink.deliver(&document).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_idle_on_drop() {
        let control = TriggerControl::new();
        {
            let _guard = BusyGuard::acquire(&control).unwrap();
            assert_eq!(control.state(), ExportState::InProgress);
            assert!(!control.is_enabled());
            assert_eq!(control.label(), BUSY_LABEL);
            assert!(BusyGuard::acquire(&control).is_none());
        }
        assert_eq!(control.state(), ExportState::Idle);
        assert!(control.is_enabled());
        assert_eq!(control.label(), IDLE_LABEL);
    }

    #[test]
    fn guard_restores_idle_on_unwind() {
        let control = TriggerControl::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = BusyGuard::acquire(&control).unwrap();
            panic!("stage blew up");
        }));
        assert!(result.is_err());
        assert!(control.is_enabled());
    }
}
