//! Navigation engine - render scheduler and input dispatcher.
//!
//! Both producers share one [`SharedNavigation`]:
//!
//! 1. **Render scheduler** - once per `render_period`, ticks the idle
//!    timer and, unless sleeping or already drawing, renders the current
//!    screen and pushes it to the display.
//! 2. **Input dispatcher** - for each button event, wakes the screen (the
//!    waking press does nothing else) or applies the transition table,
//!    then forces one immediate render.
//!
//! Collaborator errors are logged and swallowed; neither loop ever exits.
//!
//! Navigation state sits in a short critical section. The panel has its
//! own mutex and no display command runs inside the navigation lock, so a
//! slow I²C flush never holds up the button or telemetry threads.
//! Lock order is display → navigation.

use std::sync::{Mutex, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Ticker, Timer};
use log::{debug, error, info, warn};

use crate::config::{EngineConfig, BUTTON_CHANNEL_DEPTH};
use crate::error::Error;
use crate::power::OsControl;
use crate::power_logic::TickOutcome;
use crate::telemetry::TelemetrySource;
use crate::ui::display::DisplayDriver;
use crate::ui::input_logic::{transition, Transition};
use crate::ui::nav_state::{NavSnapshot, NavigationState, RenderGuard, SharedNavigation};
use crate::ui::render::{FrameRenderer, RenderContext};
use crate::ui::{ButtonEvent, Page, TerminalAction};

/// What one scheduled cycle decided under the lock.
enum CyclePlan {
    Draw(NavSnapshot),
    /// Idle timer just ran out.
    Blank,
    Skip,
    /// A terminal action owns the screen.
    Hold,
}

/// What one button press decided under the lock.
enum EventPlan {
    /// Screen was asleep; the press only woke it.
    Woke,
    /// Reboot/poweroff in progress; press ignored.
    Busy,
    Moved,
    ResetNetwork,
    Terminal(TerminalAction),
}

/// Outcome of a render attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A frame reached the display.
    Drawn,
    /// Nothing drawn: asleep, in flight, holding, or just fell asleep.
    Suppressed,
    /// Renderer or display failed; already logged.
    Failed,
}

/// The navigation engine and its collaborators.
pub struct Engine<D, R, T, O> {
    config: EngineConfig,
    nav: SharedNavigation,
    display: Mutex<D>,
    renderer: R,
    telemetry: T,
    os: O,
}

impl<D, R, T, O> Engine<D, R, T, O>
where
    D: DisplayDriver,
    R: FrameRenderer,
    T: TelemetrySource,
    O: OsControl,
{
    /// Build an engine around an already initialised display.
    pub fn new(config: EngineConfig, display: D, renderer: R, telemetry: T, os: O) -> Self {
        let nav = SharedNavigation::new(NavigationState::new(&config));
        Self {
            config,
            nav,
            display: Mutex::new(display),
            renderer,
            telemetry,
            os,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn navigation(&self) -> &SharedNavigation {
        &self.nav
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn os(&self) -> &O {
        &self.os
    }

    /// Run `f` with the display driver.
    pub fn with_display<X>(&self, f: impl FnOnce(&mut D) -> X) -> X {
        let mut display = self.display.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut display)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Render scheduler
    // ═══════════════════════════════════════════════════════════════════════

    /// Render forever at the configured cadence.
    pub async fn run_scheduler(&self) -> ! {
        info!(
            "Render scheduler running (period {} ms, sleep after {} ticks)",
            self.config.render_period.as_millis(),
            self.config.idle_timeout_ticks
        );
        let mut ticker = Ticker::every(self.config.render_period);
        loop {
            if self.render_cycle() == RenderOutcome::Failed {
                Timer::after(self.config.render_retry_backoff).await;
            }
            ticker.next().await;
        }
    }

    /// One scheduled cycle: tick the idle timer, then draw if allowed.
    pub fn render_cycle(&self) -> RenderOutcome {
        let plan = self.nav.lock(|state| {
            if state.pending.is_some() {
                return CyclePlan::Hold;
            }
            let snap = state.snapshot();
            if state.idle.tick() == TickOutcome::FellAsleep {
                return CyclePlan::Blank;
            }
            if snap.render_in_flight || snap.sleeping || !RenderGuard::claim(state) {
                return CyclePlan::Skip;
            }
            CyclePlan::Draw(snap)
        });

        match plan {
            CyclePlan::Draw(snap) => {
                let _guard = RenderGuard::armed(&self.nav);
                self.draw(&snap)
            }
            CyclePlan::Blank => {
                self.blank();
                RenderOutcome::Suppressed
            }
            CyclePlan::Skip => RenderOutcome::Suppressed,
            CyclePlan::Hold => {
                debug!("Render: holding terminal screen");
                RenderOutcome::Suppressed
            }
        }
    }

    /// Render right away, outside the cadence. Dropped, not queued, if a
    /// render is in flight or the screen is asleep. Never ticks the idle timer.
    pub fn render_now(&self) -> RenderOutcome {
        let snap = self.nav.lock(|state| {
            if state.idle.is_sleeping() || !RenderGuard::claim(state) {
                None
            } else {
                Some(state.snapshot())
            }
        });

        match snap {
            Some(snap) => {
                let _guard = RenderGuard::armed(&self.nav);
                self.draw(&snap)
            }
            None => {
                debug!("Render: immediate render suppressed");
                RenderOutcome::Suppressed
            }
        }
    }

    fn is_sleeping(&self) -> bool {
        self.nav.lock(|state| state.idle.is_sleeping())
    }

    /// Blank the panel after the idle timer ran out.
    fn blank(&self) {
        info!("Screen sleeping");
        let result = self.with_display(|d| {
            // A press may have woken the screen since the tick.
            if self.is_sleeping() {
                d.clear_display()
            } else {
                Ok(())
            }
        });
        if let Err(e) = result {
            error!("Blanking display failed: {}", e);
        }
    }

    fn draw(&self, snap: &NavSnapshot) -> RenderOutcome {
        let ctx = RenderContext {
            screen: snap.screen(),
            selection: snap.selection,
            telemetry: self.telemetry.latest(),
            now: chrono::Local::now().naive_local(),
        };
        let result = self.renderer.render(&ctx).and_then(|frame| {
            self.with_display(|d| {
                // Never paint over a panel that blanked mid-render.
                if self.is_sleeping() {
                    return Ok(false);
                }
                d.draw_image(&frame).map(|()| true)
            })
            .map_err(Error::from)
        });

        match result {
            Ok(true) => RenderOutcome::Drawn,
            Ok(false) => RenderOutcome::Suppressed,
            Err(e) => {
                error!("Render of {:?} failed: {}", ctx.screen, e);
                RenderOutcome::Failed
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Input dispatcher
    // ═══════════════════════════════════════════════════════════════════════

    /// Handle button events from `rx` forever.
    pub async fn run_dispatcher(
        &self,
        rx: Receiver<'_, CriticalSectionRawMutex, ButtonEvent, BUTTON_CHANNEL_DEPTH>,
    ) -> ! {
        info!("Input dispatcher running");
        loop {
            let event = rx.receive().await;
            self.handle_event(event).await;
        }
    }

    /// Apply one button press.
    pub async fn handle_event(&self, event: ButtonEvent) {
        info!("Button: {:?}", event);

        let plan = self.nav.lock(|state| {
            if state.pending.is_some() {
                return EventPlan::Busy;
            }
            if state.idle.wake() {
                return EventPlan::Woke;
            }

            let from = state.page();
            match transition(from, event, state.selection(), &self.config) {
                Transition::Goto(page) => {
                    debug!("Page {} -> {}", from, page);
                    state.enter(page);
                    EventPlan::Moved
                }
                Transition::Select(index) => {
                    state.select(index, self.config.option_count(from));
                    debug!("Page {} selection {}", from, state.selection());
                    EventPlan::Moved
                }
                Transition::ResetNetwork => {
                    state.enter(Page::HOME);
                    EventPlan::ResetNetwork
                }
                Transition::Terminal(action) => {
                    state.pending = Some(action);
                    EventPlan::Terminal(action)
                }
            }
        });

        match plan {
            EventPlan::Busy => {
                warn!("Button {:?} ignored: shutdown in progress", event);
            }
            EventPlan::Woke => {
                info!("Screen woken up, ignoring button action");
                if let Err(e) = self.with_display(|d| d.set_normal_display()) {
                    error!("Waking display failed: {}", e);
                }
                self.render_now();
            }
            EventPlan::Moved => {
                self.render_now();
            }
            EventPlan::ResetNetwork => {
                info!("Resetting network");
                if let Err(e) = self.os.reset_network() {
                    error!("Network reset failed: {}", e);
                }
                self.render_now();
            }
            EventPlan::Terminal(action) => self.run_terminal(action).await,
        }
    }

    /// Show the please-wait screen, pause, then hand off to OS control.
    async fn run_terminal(&self, action: TerminalAction) {
        info!(
            "{} (page {}), handing off in {} ms",
            action.title(),
            action.page_id(),
            self.config.confirm_delay.as_millis()
        );
        self.render_now();
        Timer::after(self.config.confirm_delay).await;

        let result = match action {
            TerminalAction::Reboot => self.os.reboot(),
            TerminalAction::PowerOff => self.os.poweroff(),
        };

        match result {
            // The OS takes it from here; keep holding the please-wait screen.
            Ok(()) => info!("{} requested", action.title()),
            Err(e) => {
                error!("{} failed: {}", action.title(), e);
                self.nav.lock(|state| {
                    state.pending = None;
                    state.enter(Page::HOME);
                });
                self.render_now();
            }
        }
    }
}
