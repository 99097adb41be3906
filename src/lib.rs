//! Button-driven OLED menu for NanoHat-style embedded Linux boards.
//!
//! This library holds everything that can be tested on the host: the
//! page state machine, the idle timer, the render scheduler and input
//! dispatcher, frame rendering and telemetry parsing.
//!
//! Usage: `cargo test`
//!
//! Note: The device binary lives in main.rs behind the `hardware` feature,
//! which adds the Linux I²C HAL, the SSD1306 driver and the executor.

pub mod config;
pub mod engine;
pub mod error;
pub mod power;
pub mod power_logic;
pub mod telemetry;
pub mod ui;

#[doc(hidden)]
pub mod testing;

pub use engine::{Engine, RenderOutcome};
pub use error::{DisplayError, Error};
pub use ui::{ButtonEvent, Page, Screen, TerminalAction};

// ═══════════════════════════════════════════════════════════════════════════
// Concurrency Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        test_config, FixedTelemetry, RecordingDisplay, RecordingOsControl, RecordingRenderer,
    };
    use embassy_futures::block_on;

    type TestEngine = Engine<RecordingDisplay, RecordingRenderer, FixedTelemetry, RecordingOsControl>;

    fn engine() -> TestEngine {
        let config = config::EngineConfig {
            idle_timeout_ticks: 10_000,
            ..test_config()
        };
        Engine::new(
            config,
            RecordingDisplay::default(),
            RecordingRenderer::default(),
            FixedTelemetry::default(),
            RecordingOsControl::default(),
        )
    }

    #[test]
    fn concurrent_renders_and_presses_keep_state_consistent() {
        let engine = engine();
        let events = [ButtonEvent::Back, ButtonEvent::Navigate, ButtonEvent::Navigate];

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    engine.render_cycle();
                }
            });
            for _ in 0..2 {
                scope.spawn(|| {
                    for i in 0..150 {
                        block_on(engine.handle_event(events[i % events.len()]));
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..500 {
                    let snap = engine.navigation().snapshot();
                    let limit = engine.config().option_count(snap.page).max(1);
                    assert!(snap.selection < limit, "{:?}", snap);
                }
            });
        });

        let snap = engine.navigation().snapshot();
        assert!(!snap.render_in_flight);
        assert!(!snap.sleeping);
        assert_eq!(snap.pending, None);
        // Every selection the renderer saw was valid for its page.
        for (screen, selection) in engine.renderer().rendered() {
            if let Screen::Page(page) = screen {
                assert!(selection < engine.config().option_count(page).max(1));
            }
        }
    }
}
