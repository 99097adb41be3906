//! User interface subsystem - OLED display + physical buttons.
//!
//! The navigation engine maintains a page state machine that reacts to
//! button presses, rendering the current page on the SSD1306 OLED.
//!
//! ## Components
//!
//! - **Display**: SSD1306 128×64 OLED via I²C
//! - **Buttons**: 3 tactile switches (K1, K2, K3) delivered as signals

pub mod buttons;
pub mod display;
pub mod input_logic;
pub mod nav_state;
pub mod render;

use core::fmt;

/// Navigable pages (views) the UI can be in.
///
/// Discriminants are the page identifiers used in logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Page {
    /// Date, time, model name and firmware version.
    DateVersion = 0,
    /// IP/MAC address, CPU/memory/disk usage and temperature.
    SystemInfo = 1,
    /// Reboot / Shutdown / Reset Network list.
    PowerMenu = 2,
    /// "Reboot?" Yes/No dialog.
    RebootConfirm = 3,
    /// "Shutdown?" Yes/No dialog.
    ShutdownConfirm = 5,
    /// "Reset Network?" Yes/No dialog.
    ResetNetworkConfirm = 9,
}

impl Page {
    /// Where "No", unknown combinations and power-menu Back lead.
    pub const HOME: Page = Page::DateVersion;

    pub const fn id(self) -> u8 {
        self as u8
    }

}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self, self.id())
    }
}

/// Irreversible actions that take over the screen until the OS acts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalAction {
    Reboot,
    PowerOff,
}

impl TerminalAction {
    /// Page identifier of the "please wait" screen, for logs.
    pub const fn page_id(self) -> u8 {
        match self {
            TerminalAction::Reboot => 7,
            TerminalAction::PowerOff => 8,
        }
    }

    /// Heading of the "please wait" screen.
    pub const fn title(self) -> &'static str {
        match self {
            TerminalAction::Reboot => "Rebooting",
            TerminalAction::PowerOff => "Shutting down",
        }
    }
}

/// What the renderer draws: a navigable page or a pending terminal action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Page(Page),
    Terminal(TerminalAction),
}

/// Abstract button events (K1/K2/K3 after signal translation).
///
///   - Navigate: toggle info pages / move selection
///   - Confirm:  context-dependent accept
///   - Back:     open or leave the power menu
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonEvent {
    Navigate,
    Confirm,
    Back,
}
