//! Application-wide constants and runtime configuration.
//!
//! All timing parameters, file locations and display geometry live here
//! so they can be tuned in one place. [`EngineConfig`] carries the subset
//! the navigation engine needs and is passed in at construction.

use embassy_time::Duration;
use log::warn;

use crate::error::Error;
use crate::ui::Page;

// Navigation engine

/// Render ticks of inactivity before the screen blanks (1 tick = 1 render period).
pub const IDLE_TIMEOUT_TICKS: u32 = 120;

/// Render scheduler cadence (ms).
pub const RENDER_PERIOD_MS: u64 = 1000;

/// Pause after a failed render cycle before waiting for the next tick (ms).
pub const RENDER_RETRY_BACKOFF_MS: u64 = 500;

/// How long the "please wait" page stays up before reboot/poweroff (ms).
pub const CONFIRM_DELAY_MS: u64 = 3000;

/// Entries in the power menu (Reboot, Shutdown, Reset Network).
pub const POWER_MENU_OPTIONS: usize = 3;

/// Entries in every Yes/No dialog.
pub const DIALOG_OPTIONS: usize = 2;

/// Depth of the button event channel. Presses beyond this are dropped.
pub const BUTTON_CHANNEL_DEPTH: usize = 4;

// Display
//
// NanoHat OLED: SSD1306 128×64 on the board's primary I²C bus.
//
//   K1 → SIGUSR1 (Navigate)
//   K2 → SIGUSR2 (Confirm)
//   K3 → SIGALRM (Back)

/// Panel width in pixels.
pub const DISPLAY_WIDTH: u32 = 128;

/// Panel height in pixels.
pub const DISPLAY_HEIGHT: u32 = 64;

/// I²C bus device node the panel is attached to.
pub const I2C_BUS_PATH: &str = "/dev/i2c-0";

/// 7-bit I²C address of the SSD1306.
pub const OLED_I2C_ADDRESS: u8 = 0x3C;

/// 1-bit BMP shown at startup, if present.
pub const SPLASH_IMAGE_PATH: &str = "/usr/share/nanohat-menu/logo.bmp";

/// How long the splash image stays up (ms).
pub const SPLASH_DURATION_MS: u64 = 2000;

// Telemetry

/// Per-metric probe timeout (ms). A probe that overruns reads as unavailable.
pub const TELEMETRY_TIMEOUT_MS: u64 = 2000;

/// Consecutive failed samples of one metric before a warning is logged.
pub const TELEMETRY_FAILURE_WARN_STREAK: u32 = 30;

/// Text shown in place of any metric that could not be read.
pub const UNAVAILABLE: &str = "N/A";

/// Interfaces tried, in order, for the IP and MAC address.
pub const PRIMARY_INTERFACE: &str = "eth0";
pub const FALLBACK_INTERFACE: &str = "wlan0";

/// Address used to discover the outbound interface when `eth0` has no IPv4.
pub const ROUTE_PROBE_ADDR: &str = "10.255.255.255:1";

/// Thermal zone reporting SoC temperature (millidegrees C).
pub const THERMAL_ZONE_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Kernel CPU accounting file.
pub const PROC_STAT_PATH: &str = "/proc/stat";

/// Kernel memory accounting file.
pub const PROC_MEMINFO_PATH: &str = "/proc/meminfo";

/// Filesystem whose usage is reported as "D:".
pub const DISK_MOUNT_POINT: &str = "/";

// Device info files

/// Directory holding the `model`, `update` and `schema` text files.
pub const DEVICE_INFO_DIR: &str = "/mnt/dietpi_userdata/innovo";

pub const DEFAULT_MODEL: &str = "MC-DJ Player";
pub const DEFAULT_VERSION: &str = "0";
pub const DEFAULT_SCHEMA: &str = "100";

// Environment overrides

/// Overrides [`IDLE_TIMEOUT_TICKS`].
pub const ENV_IDLE_TICKS: &str = "NANOHAT_IDLE_TICKS";

/// Overrides [`I2C_BUS_PATH`].
pub const ENV_I2C_BUS: &str = "NANOHAT_I2C_BUS";

/// Runtime configuration of the navigation engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Render ticks before the screen sleeps.
    pub idle_timeout_ticks: u32,
    /// Scheduler cadence.
    pub render_period: Duration,
    /// Backoff after a failed render cycle.
    pub render_retry_backoff: Duration,
    /// Delay between showing the terminal page and calling OS control.
    pub confirm_delay: Duration,
    /// Option count of the power menu.
    pub power_menu_options: usize,
    /// Option count of the Yes/No dialogs.
    pub dialog_options: usize,
    /// Page shown at startup.
    pub initial_page: Page,
    /// Per-metric telemetry timeout.
    pub telemetry_timeout: core::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ticks: IDLE_TIMEOUT_TICKS,
            render_period: Duration::from_millis(RENDER_PERIOD_MS),
            render_retry_backoff: Duration::from_millis(RENDER_RETRY_BACKOFF_MS),
            confirm_delay: Duration::from_millis(CONFIRM_DELAY_MS),
            power_menu_options: POWER_MENU_OPTIONS,
            dialog_options: DIALOG_OPTIONS,
            initial_page: Page::SystemInfo,
            telemetry_timeout: core::time::Duration::from_millis(TELEMETRY_TIMEOUT_MS),
        }
    }
}

impl EngineConfig {
    /// Defaults, with overrides taken from the process environment.
    ///
    /// Unparseable or zero values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(ENV_IDLE_TICKS) {
            match parse_idle_ticks(&raw) {
                Ok(ticks) => config.idle_timeout_ticks = ticks,
                Err(e) => warn!("Ignoring override, {}", e),
            }
        }
        config
    }

    /// Number of selectable entries on `page` (0 for pages without a list).
    pub fn option_count(&self, page: Page) -> usize {
        match page {
            Page::PowerMenu => self.power_menu_options,
            Page::RebootConfirm | Page::ShutdownConfirm | Page::ResetNetworkConfirm => {
                self.dialog_options
            }
            Page::DateVersion | Page::SystemInfo => 0,
        }
    }
}

/// I²C bus path, honouring [`ENV_I2C_BUS`].
pub fn i2c_bus_path() -> String {
    std::env::var(ENV_I2C_BUS)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| I2C_BUS_PATH.to_string())
}

fn parse_idle_ticks(raw: &str) -> Result<u32, Error> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|ticks| *ticks > 0)
        .ok_or_else(|| {
            Error::Config(format!("{}={:?} is not a positive integer", ENV_IDLE_TICKS, raw))
        })
}
