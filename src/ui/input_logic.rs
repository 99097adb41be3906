//! Page transition table.
//!
//! Pure mapping of (page, button, selection) to the next navigation step.
//! The engine applies the result under the navigation lock.

use crate::config::EngineConfig;
use crate::ui::{ButtonEvent, Page, TerminalAction};

/// Outcome of one button press on a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Enter `Page` with the selection reset to 0.
    Goto(Page),
    /// Stay on the page, move the cursor to this index.
    Select(usize),
    /// Show the terminal page, then hand off to OS control.
    Terminal(TerminalAction),
    /// Ask OS control to reset networking, then go home.
    ResetNetwork,
}

/// Move selection cursor one item down, wrapping to the first item.
pub fn select_next(selected: usize, item_count: usize) -> usize {
    if item_count == 0 {
        0
    } else {
        (selected + 1) % item_count
    }
}

/// Look up the transition for `event` pressed on `page` with `selection` highlighted.
pub fn transition(
    page: Page,
    event: ButtonEvent,
    selection: usize,
    config: &EngineConfig,
) -> Transition {
    match event {
        ButtonEvent::Navigate => match page {
            Page::DateVersion => Transition::Goto(Page::SystemInfo),
            Page::SystemInfo => Transition::Goto(Page::DateVersion),
            _ => Transition::Select(select_next(selection, config.option_count(page))),
        },
        ButtonEvent::Confirm => confirm(page, selection),
        ButtonEvent::Back => match page {
            Page::PowerMenu => Transition::Goto(Page::HOME),
            _ => Transition::Goto(Page::PowerMenu),
        },
    }
}

fn confirm(page: Page, selection: usize) -> Transition {
    match (page, selection) {
        (Page::PowerMenu, 0) => Transition::Goto(Page::RebootConfirm),
        (Page::PowerMenu, 1) => Transition::Goto(Page::ShutdownConfirm),
        (Page::PowerMenu, 2) => Transition::Goto(Page::ResetNetworkConfirm),
        (Page::RebootConfirm, 0) => Transition::Terminal(TerminalAction::Reboot),
        (Page::ShutdownConfirm, 0) => Transition::Terminal(TerminalAction::PowerOff),
        (Page::ResetNetworkConfirm, 0) => Transition::ResetNetwork,
        // "No" on any dialog, info pages, and out-of-range selections.
        _ => Transition::Goto(Page::HOME),
    }
}
