//! Shared navigation state.
//!
//! One [`NavigationState`] per process, behind a single blocking mutex.
//! Every multi-field read or write goes through [`SharedNavigation::lock`],
//! so the render scheduler never sees a half-applied transition.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::EngineConfig;
use crate::power_logic::IdleTimer;
use crate::ui::{Page, Screen, TerminalAction};

/// Mutable navigation record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationState {
    page: Page,
    selection: usize,
    /// Sleep countdown and sleeping flag.
    pub idle: IdleTimer,
    /// Set while a frame is being built or pushed.
    pub render_in_flight: bool,
    /// Set once reboot/poweroff has been confirmed; input is ignored from then on.
    pub pending: Option<TerminalAction>,
}

impl NavigationState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            page: config.initial_page,
            selection: 0,
            idle: IdleTimer::new(config.idle_timeout_ticks),
            render_in_flight: false,
            pending: None,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn selection(&self) -> usize {
        self.selection
    }

    /// Switch page. The selection always restarts at the first entry.
    pub fn enter(&mut self, page: Page) {
        self.page = page;
        self.selection = 0;
    }

    /// Move the cursor within the current page, wrapping into `0..option_count`.
    pub fn select(&mut self, index: usize, option_count: usize) {
        self.selection = if option_count == 0 {
            0
        } else {
            index % option_count
        };
    }

    pub fn snapshot(&self) -> NavSnapshot {
        NavSnapshot {
            page: self.page,
            selection: self.selection,
            render_in_flight: self.render_in_flight,
            sleeping: self.idle.is_sleeping(),
            countdown: self.idle.countdown(),
            pending: self.pending,
        }
    }
}

/// Consistent copy of the navigation state, taken under the lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavSnapshot {
    pub page: Page,
    pub selection: usize,
    pub render_in_flight: bool,
    pub sleeping: bool,
    pub countdown: u32,
    pub pending: Option<TerminalAction>,
}

impl NavSnapshot {
    /// What should be on screen for this state.
    pub fn screen(&self) -> Screen {
        match self.pending {
            Some(action) => Screen::Terminal(action),
            None => Screen::Page(self.page),
        }
    }
}

/// Process-wide navigation state guarded by one lock.
pub struct SharedNavigation {
    inner: Mutex<CriticalSectionRawMutex, RefCell<NavigationState>>,
}

impl SharedNavigation {
    pub fn new(state: NavigationState) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(state)),
        }
    }

    /// Run `f` with exclusive access to the state.
    ///
    /// Must not be re-entered from inside `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut NavigationState) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn snapshot(&self) -> NavSnapshot {
        self.lock(|state| state.snapshot())
    }
}

/// Clears `render_in_flight` when dropped, on every exit path of a render.
pub struct RenderGuard<'a> {
    nav: &'a SharedNavigation,
}

impl<'a> RenderGuard<'a> {
    /// Claim the render slot if it is free. Call with the lock held.
    pub fn claim(state: &mut NavigationState) -> bool {
        if state.render_in_flight {
            return false;
        }
        state.render_in_flight = true;
        true
    }

    /// Take ownership of a slot already claimed with [`RenderGuard::claim`].
    pub fn armed(nav: &'a SharedNavigation) -> Self {
        Self { nav }
    }
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.nav.lock(|state| state.render_in_flight = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> SharedNavigation {
        SharedNavigation::new(NavigationState::new(&EngineConfig::default()))
    }

    #[test]
    fn starts_on_initial_page() {
        let nav = shared();
        let snap = nav.snapshot();
        assert_eq!(snap.page, Page::SystemInfo);
        assert_eq!(snap.selection, 0);
        assert_eq!(snap.countdown, 120);
        assert!(!snap.sleeping);
        assert!(!snap.render_in_flight);
        assert_eq!(snap.screen(), Screen::Page(Page::SystemInfo));
    }

    #[test]
    fn entering_a_page_resets_selection() {
        let nav = shared();
        nav.lock(|state| {
            state.enter(Page::PowerMenu);
            state.select(2, 3);
            assert_eq!(state.selection(), 2);
            state.enter(Page::RebootConfirm);
        });
        assert_eq!(nav.snapshot().selection, 0);
    }

    #[test]
    fn select_stays_in_range() {
        let nav = shared();
        nav.lock(|state| {
            state.enter(Page::RebootConfirm);
            state.select(5, 2);
            assert_eq!(state.selection(), 1);
            state.select(3, 0);
            assert_eq!(state.selection(), 0);
        });
    }

    #[test]
    fn pending_action_overrides_screen() {
        let nav = shared();
        nav.lock(|state| state.pending = Some(TerminalAction::PowerOff));
        assert_eq!(nav.snapshot().screen(), Screen::Terminal(TerminalAction::PowerOff));
    }

    #[test]
    fn guard_clears_flag_on_drop() {
        let nav = shared();
        assert!(nav.lock(RenderGuard::claim));
        assert!(!nav.lock(RenderGuard::claim));
        {
            let _guard = RenderGuard::armed(&nav);
            assert!(nav.snapshot().render_in_flight);
        }
        assert!(!nav.snapshot().render_in_flight);
    }

    #[test]
    fn guard_clears_flag_on_unwind() {
        let nav = shared();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            nav.lock(RenderGuard::claim);
            let _guard = RenderGuard::armed(&nav);
            panic!("renderer blew up");
        }));
        assert!(result.is_err());
        assert!(!nav.snapshot().render_in_flight);
    }
}
