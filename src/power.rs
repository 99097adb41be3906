//! OS control - reboot, poweroff and network reset.
//!
//! These are fire-and-forget hand-offs to the init system. A successful
//! `reboot`/`poweroff` is expected to end the process shortly after;
//! returning `Ok` only means the request was accepted.

use std::process::Command;

use log::{error, info};

use crate::error::Error;

/// Privileged system actions reachable from the power menu.
pub trait OsControl {
    fn reboot(&self) -> Result<(), Error>;
    fn poweroff(&self) -> Result<(), Error>;
    fn reset_network(&self) -> Result<(), Error>;
}

/// [`OsControl`] backed by `systemctl`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Systemctl;

/// Service restarted by [`Systemctl::reset_network`].
const NETWORK_SERVICE: &str = "networking.service";

impl Systemctl {
    fn run(args: &[&str]) -> Result<(), Error> {
        info!("Power: systemctl {}", args.join(" "));
        let status = Command::new("systemctl").args(args).status()?;
        if status.success() {
            Ok(())
        } else {
            error!("Power: systemctl {} exited with {}", args.join(" "), status);
            Err(Error::OsControl(format!(
                "systemctl {} exited with {}",
                args.join(" "),
                status
            )))
        }
    }
}

impl OsControl for Systemctl {
    fn reboot(&self) -> Result<(), Error> {
        Self::run(&["reboot"])
    }

    fn poweroff(&self) -> Result<(), Error> {
        Self::run(&["poweroff"])
    }

    fn reset_network(&self) -> Result<(), Error> {
        Self::run(&["restart", NETWORK_SERVICE])
    }
}
