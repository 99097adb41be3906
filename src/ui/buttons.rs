//! Button input via POSIX signals.
//!
//! The board's button daemon raises one signal per press:
//!   - K1 → SIGUSR1 → Navigate
//!   - K2 → SIGUSR2 → Confirm
//!   - K3 → SIGALRM → Back
//!
//! The three signals are blocked process-wide and collected synchronously
//! by a dedicated thread with `sigwait`, which forwards a `ButtonEvent`
//! to the engine's channel. Nothing runs in async-signal context.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender, TrySendError};
use log::{info, warn};

use crate::config::BUTTON_CHANNEL_DEPTH;
use crate::error::Error;
use crate::ui::ButtonEvent;

/// Channel between the signal thread and the input dispatcher.
pub type ButtonChannel = Channel<CriticalSectionRawMutex, ButtonEvent, BUTTON_CHANNEL_DEPTH>;

/// Sending half of [`ButtonChannel`].
pub type ButtonSender<'a> = Sender<'a, CriticalSectionRawMutex, ButtonEvent, BUTTON_CHANNEL_DEPTH>;

/// Process-wide button event channel.
pub static BUTTON_EVENTS: ButtonChannel = Channel::new();

/// Signal → button mapping.
pub const BUTTON_SIGNALS: [(libc::c_int, ButtonEvent); 3] = [
    (libc::SIGUSR1, ButtonEvent::Navigate),
    (libc::SIGUSR2, ButtonEvent::Confirm),
    (libc::SIGALRM, ButtonEvent::Back),
];

/// Translate a signal number into its button, if it is one of ours.
pub fn event_for_signal(signum: libc::c_int) -> Option<ButtonEvent> {
    BUTTON_SIGNALS
        .iter()
        .find(|(sig, _)| *sig == signum)
        .map(|(_, event)| *event)
}

/// Forward one event without waiting. Returns `false` if it was dropped.
pub fn forward(tx: &ButtonSender<'_>, event: ButtonEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!("Button: {:?} dropped, dispatcher busy", event);
            false
        }
    }
}

/// The button signals, blocked on the calling thread.
pub struct ButtonSignals {
    set: libc::sigset_t,
}

impl ButtonSignals {
    /// Block the button signals on the calling thread.
    ///
    /// Call from `main` before any other thread is spawned so every thread
    /// inherits the mask; otherwise the default action (terminate) can fire.
    pub fn block() -> Result<Self, Error> {
        // SAFETY: sigset_t is plain data, initialised by sigemptyset below.
        let mut set: libc::sigset_t = unsafe { core::mem::zeroed() };
        // SAFETY: `set` is a valid sigset_t for the duration of these calls.
        unsafe {
            libc::sigemptyset(&mut set);
            for (sig, _) in BUTTON_SIGNALS {
                libc::sigaddset(&mut set, sig);
            }
        }
        // SAFETY: valid set pointer; old mask not requested.
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, core::ptr::null_mut()) };
        if rc != 0 {
            return Err(Error::Signal(rc));
        }
        Ok(Self { set })
    }

    /// Wait for the next button signal.
    pub fn wait(&self) -> Result<ButtonEvent, Error> {
        loop {
            let mut signum: libc::c_int = 0;
            // SAFETY: `self.set` holds only blocked signals; `signum` is a valid out-pointer.
            let rc = unsafe { libc::sigwait(&self.set, &mut signum) };
            if rc != 0 {
                return Err(Error::Signal(rc));
            }
            if let Some(event) = event_for_signal(signum) {
                return Ok(event);
            }
        }
    }

    /// Forward button signals to `tx` forever. Meant for a dedicated thread.
    pub fn run(self, tx: ButtonSender<'static>) -> Result<(), Error> {
        info!("Buttons: listening for SIGUSR1/SIGUSR2/SIGALRM");
        loop {
            let event = self.wait()?;
            forward(&tx, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_map_to_buttons() {
        assert_eq!(event_for_signal(libc::SIGUSR1), Some(ButtonEvent::Navigate));
        assert_eq!(event_for_signal(libc::SIGUSR2), Some(ButtonEvent::Confirm));
        assert_eq!(event_for_signal(libc::SIGALRM), Some(ButtonEvent::Back));
        assert_eq!(event_for_signal(libc::SIGTERM), None);
    }

    #[test]
    fn full_channel_drops_instead_of_queueing() {
        let channel: ButtonChannel = Channel::new();
        let tx = channel.sender();
        for _ in 0..BUTTON_CHANNEL_DEPTH {
            assert!(forward(&tx, ButtonEvent::Navigate));
        }
        assert!(!forward(&tx, ButtonEvent::Back));
        assert_eq!(channel.try_receive(), Ok(ButtonEvent::Navigate));
    }

    #[test]
    fn sigwait_receives_raised_button() {
        // Blocking on a spawned thread keeps the test harness's own threads untouched.
        let handle = std::thread::spawn(|| {
            let signals = ButtonSignals::block().unwrap();
            // SAFETY: directed at this thread, where the signal is blocked.
            unsafe {
                libc::pthread_kill(libc::pthread_self(), libc::SIGUSR2);
            }
            signals.wait().unwrap()
        });
        assert_eq!(handle.join().unwrap(), ButtonEvent::Confirm);
    }
}
