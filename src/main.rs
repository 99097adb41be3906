//! nanohat-menu - OLED menu daemon for NanoHat boards.
//!
//! Thread layout:
//!   - main: embassy executor running the render scheduler and the
//!     input dispatcher
//!   - "buttons": `sigwait` loop turning SIGUSR1/SIGUSR2/SIGALRM into events
//!   - "telemetry": sampler refreshing the system snapshot

use std::process::exit;
use std::time::Duration;

use embassy_executor::{Executor, Spawner};
use linux_embedded_hal::I2cdev;
use log::{error, info, warn};
use static_cell::StaticCell;

use nanohat_menu::config::{self, EngineConfig};
use nanohat_menu::engine::Engine;
use nanohat_menu::error::{DisplayError, Error};
use nanohat_menu::power::Systemctl;
use nanohat_menu::telemetry::{Sampler, SystemSnapshot, TelemetryCache};
use nanohat_menu::ui::buttons::{ButtonSignals, BUTTON_EVENTS};
use nanohat_menu::ui::display::{DisplayDriver, Ssd1306Panel};
use nanohat_menu::ui::render::{splash_frame, PageRenderer};

type DeviceEngine = Engine<Ssd1306Panel<I2cdev>, PageRenderer, &'static TelemetryCache, Systemctl>;

static TELEMETRY: StaticCell<TelemetryCache> = StaticCell::new();
static ENGINE: StaticCell<DeviceEngine> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("nanohat-menu v{}", env!("CARGO_PKG_VERSION"));

    // Must precede every thread spawn so all threads inherit the mask.
    let signals = match ButtonSignals::block() {
        Ok(signals) => signals,
        Err(e) => {
            error!("Blocking button signals failed: {}", e);
            exit(1);
        }
    };

    let config = EngineConfig::from_env();
    let mut panel = match open_panel() {
        Ok(panel) => panel,
        Err(e) => {
            error!("Display init failed: {}", e);
            exit(1);
        }
    };
    show_splash(&mut panel);

    let telemetry: &'static TelemetryCache = TELEMETRY.init(TelemetryCache::new(SystemSnapshot::default()));
    let sampler = match Sampler::new(config.telemetry_timeout) {
        Ok(sampler) => sampler,
        Err(e) => {
            error!("Starting telemetry probes failed: {}", e);
            exit(1);
        }
    };
    let period = Duration::from_millis(config::RENDER_PERIOD_MS);
    if let Err(e) = std::thread::Builder::new()
        .name("telemetry".into())
        .spawn(move || sampler.run(telemetry, period))
    {
        error!("Spawning telemetry thread failed: {}", e);
        exit(1);
    }

    if let Err(e) = std::thread::Builder::new()
        .name("buttons".into())
        .spawn(move || {
            if let Err(e) = signals.run(BUTTON_EVENTS.sender()) {
                error!("Button listener stopped: {}", e);
            }
        })
    {
        error!("Spawning button thread failed: {}", e);
        exit(1);
    }

    let engine: &'static DeviceEngine =
        ENGINE.init(Engine::new(config, panel, PageRenderer, telemetry, Systemctl));

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| start_tasks(spawner, engine));
}

fn open_panel() -> Result<Ssd1306Panel<I2cdev>, Error> {
    let bus = config::i2c_bus_path();
    info!("Opening OLED on {} at 0x{:02X}", bus, config::OLED_I2C_ADDRESS);
    let i2c = I2cdev::new(&bus).map_err(|e| DisplayError::Bus(format!("{}: {}", bus, e)))?;
    let mut panel = Ssd1306Panel::new(i2c, config::OLED_I2C_ADDRESS);
    panel.init()?;
    panel.set_normal_display()?;
    Ok(panel)
}

fn show_splash(panel: &mut Ssd1306Panel<I2cdev>) {
    let frame = std::fs::read(config::SPLASH_IMAGE_PATH)
        .map_err(Error::from)
        .and_then(|bmp| splash_frame(&bmp));
    match frame {
        Ok(frame) => match panel.draw_image(&frame) {
            Ok(()) => std::thread::sleep(Duration::from_millis(config::SPLASH_DURATION_MS)),
            Err(e) => warn!("Splash draw failed: {}", e),
        },
        Err(e) => warn!("No splash ({}): {}", config::SPLASH_IMAGE_PATH, e),
    }
}

fn start_tasks(spawner: Spawner, engine: &'static DeviceEngine) {
    if let Err(e) = spawner.spawn(render_task(engine)) {
        error!("Spawning render task failed: {:?}", e);
        exit(1);
    }
    if let Err(e) = spawner.spawn(input_task(engine)) {
        error!("Spawning input task failed: {:?}", e);
        exit(1);
    }
}

#[embassy_executor::task]
async fn render_task(engine: &'static DeviceEngine) {
    engine.run_scheduler().await
}

#[embassy_executor::task]
async fn input_task(engine: &'static DeviceEngine) {
    engine.run_dispatcher(BUTTON_EVENTS.receiver()).await
}
