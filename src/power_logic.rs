//! Idle timer - screen sleep countdown.
//!
//! Counts render ticks since the last button press. Pure bookkeeping:
//! the engine issues the actual blank / display-on commands based on
//! what [`IdleTimer::tick`] and [`IdleTimer::wake`] report.

/// Result of one idle tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still awake; this many ticks remain.
    Awake(u32),
    /// This tick reached zero. The caller must blank the display.
    FellAsleep,
    /// Already sleeping; nothing changed.
    Asleep,
}

/// Inactivity countdown and sleeping flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdleTimer {
    timeout_ticks: u32,
    countdown: u32,
    sleeping: bool,
}

impl IdleTimer {
    /// Start awake with a full countdown. A zero timeout is treated as 1.
    pub const fn new(timeout_ticks: u32) -> Self {
        let timeout_ticks = if timeout_ticks == 0 { 1 } else { timeout_ticks };
        Self {
            timeout_ticks,
            countdown: timeout_ticks,
            sleeping: false,
        }
    }

    /// Periodic tick - call once per render cycle.
    pub fn tick(&mut self) -> TickOutcome {
        if self.sleeping {
            return TickOutcome::Asleep;
        }

        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.sleeping = true;
            TickOutcome::FellAsleep
        } else {
            TickOutcome::Awake(self.countdown)
        }
    }

    /// Record activity (button press). Returns `true` if the screen was asleep.
    pub fn wake(&mut self) -> bool {
        let was_sleeping = self.sleeping;
        self.sleeping = false;
        self.countdown = self.timeout_ticks;
        was_sleeping
    }

    pub const fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Ticks remaining before sleep (0 while sleeping).
    pub const fn countdown(&self) -> u32 {
        self.countdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeps_after_exactly_timeout_ticks() {
        let mut timer = IdleTimer::new(120);
        for remaining in (1..120).rev() {
            assert_eq!(timer.tick(), TickOutcome::Awake(remaining));
            assert!(!timer.is_sleeping());
        }
        assert_eq!(timer.tick(), TickOutcome::FellAsleep);
        assert!(timer.is_sleeping());
        assert_eq!(timer.countdown(), 0);
    }

    #[test]
    fn ticks_while_sleeping_are_noops() {
        let mut timer = IdleTimer::new(2);
        timer.tick();
        assert_eq!(timer.tick(), TickOutcome::FellAsleep);
        for _ in 0..5 {
            assert_eq!(timer.tick(), TickOutcome::Asleep);
            assert_eq!(timer.countdown(), 0);
        }
    }

    #[test]
    fn wake_before_timeout_resets_countdown() {
        let mut timer = IdleTimer::new(10);
        for _ in 0..9 {
            timer.tick();
        }
        assert_eq!(timer.countdown(), 1);
        assert!(!timer.wake());
        assert_eq!(timer.countdown(), 10);
        assert!(!timer.is_sleeping());
    }

    #[test]
    fn wake_while_sleeping_reports_it() {
        let mut timer = IdleTimer::new(1);
        assert_eq!(timer.tick(), TickOutcome::FellAsleep);
        assert!(timer.wake());
        assert!(!timer.is_sleeping());
        assert_eq!(timer.countdown(), 1);
        // Second wake in a row: already awake.
        assert!(!timer.wake());
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let mut timer = IdleTimer::new(0);
        assert_eq!(timer.countdown(), 1);
        assert_eq!(timer.tick(), TickOutcome::FellAsleep);
    }
}
