//! Recording fakes for host tests.
//!
//! Used by the unit tests and by `tests/integration.rs`; not part of the
//! device build's public surface.

use core::cell::RefCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Duration;

use crate::config::EngineConfig;
use crate::error::{DisplayError, Error};
use crate::power::OsControl;
use crate::telemetry::{SystemSnapshot, TelemetrySource};
use crate::ui::display::{DisplayDriver, Frame};
use crate::ui::render::{FrameRenderer, PageRenderer, RenderContext};
use crate::ui::Screen;

/// Engine config with short timings for tests.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        idle_timeout_ticks: 5,
        render_period: Duration::from_millis(10),
        render_retry_backoff: Duration::from_millis(1),
        confirm_delay: Duration::from_millis(20),
        telemetry_timeout: core::time::Duration::from_millis(100),
        ..EngineConfig::default()
    }
}

/// One call made on a [`RecordingDisplay`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayCall {
    Init,
    SetNormal,
    Clear,
    Draw,
}

/// Display driver that records calls and can be told to fail or stall draws.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub calls: Vec<DisplayCall>,
    pub fail_draws: bool,
    /// Each draw blocks this long, like a slow I²C flush.
    pub draw_delay: Option<std::time::Duration>,
    pub last_frame: Option<Frame>,
}

impl RecordingDisplay {
    pub fn draws(&self) -> usize {
        self.count(DisplayCall::Draw)
    }

    pub fn clears(&self) -> usize {
        self.count(DisplayCall::Clear)
    }

    pub fn last_call(&self) -> Option<DisplayCall> {
        self.calls.last().copied()
    }

    fn count(&self, call: DisplayCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl DisplayDriver for RecordingDisplay {
    fn init(&mut self) -> Result<(), DisplayError> {
        self.calls.push(DisplayCall::Init);
        Ok(())
    }

    fn set_normal_display(&mut self) -> Result<(), DisplayError> {
        self.calls.push(DisplayCall::SetNormal);
        Ok(())
    }

    fn clear_display(&mut self) -> Result<(), DisplayError> {
        self.calls.push(DisplayCall::Clear);
        Ok(())
    }

    fn draw_image(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        if let Some(delay) = self.draw_delay {
            std::thread::sleep(delay);
        }
        if self.fail_draws {
            return Err(DisplayError::Flush);
        }
        self.calls.push(DisplayCall::Draw);
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}

/// Real page layouts, plus a log of every (screen, selection) rendered.
pub struct RecordingRenderer {
    rendered: Mutex<CriticalSectionRawMutex, RefCell<Vec<(Screen, usize)>>>,
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self {
            rendered: Mutex::new(RefCell::new(Vec::new())),
        }
    }
}

impl RecordingRenderer {
    pub fn rendered(&self) -> Vec<(Screen, usize)> {
        self.rendered.lock(|r| r.borrow().clone())
    }

    pub fn last(&self) -> Option<(Screen, usize)> {
        self.rendered.lock(|r| r.borrow().last().copied())
    }

    /// How many times `screen` was rendered.
    pub fn count(&self, screen: Screen) -> usize {
        self.rendered
            .lock(|r| r.borrow().iter().filter(|(s, _)| *s == screen).count())
    }
}

impl FrameRenderer for RecordingRenderer {
    fn render(&self, ctx: &RenderContext) -> Result<Frame, Error> {
        self.rendered
            .lock(|r| r.borrow_mut().push((ctx.screen, ctx.selection)));
        PageRenderer.render(ctx)
    }
}

/// Renderer that always fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingRenderer;

impl FrameRenderer for FailingRenderer {
    fn render(&self, _ctx: &RenderContext) -> Result<Frame, Error> {
        Err(Error::Render("renderer offline".into()))
    }
}

/// Telemetry that never changes.
#[derive(Clone, Debug, Default)]
pub struct FixedTelemetry(pub SystemSnapshot);

impl TelemetrySource for FixedTelemetry {
    fn latest(&self) -> SystemSnapshot {
        self.0.clone()
    }
}

/// OS control that counts calls instead of acting.
#[derive(Debug, Default)]
pub struct RecordingOsControl {
    reboots: AtomicUsize,
    poweroffs: AtomicUsize,
    resets: AtomicUsize,
    fail: bool,
}

impl RecordingOsControl {
    /// Every call returns an error, as if the command were refused.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reboots(&self) -> usize {
        self.reboots.load(Ordering::SeqCst)
    }

    pub fn poweroffs(&self) -> usize {
        self.poweroffs.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn record(&self, counter: &AtomicUsize, what: &str) -> Result<(), Error> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::OsControl(format!("{} refused", what)))
        } else {
            Ok(())
        }
    }
}

impl OsControl for RecordingOsControl {
    fn reboot(&self) -> Result<(), Error> {
        self.record(&self.reboots, "reboot")
    }

    fn poweroff(&self) -> Result<(), Error> {
        self.record(&self.poweroffs, "poweroff")
    }

    fn reset_network(&self) -> Result<(), Error> {
        self.record(&self.resets, "reset network")
    }
}
