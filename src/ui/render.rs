//! Frame renderer - rasterizes one screen into a [`Frame`].
//!
//! Pure function of its [`RenderContext`]: no I/O, no clock reads.

use core::fmt::Write;

use chrono::{NaiveDateTime, Timelike};
use embedded_graphics::image::Image;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_6X12, FONT_7X13_BOLD, FONT_7X14};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use heapless::String;
use tinybmp::Bmp;

use crate::config::{DISPLAY_WIDTH, UNAVAILABLE};
use crate::error::Error;
use crate::telemetry::SystemSnapshot;
use crate::ui::display::Frame;
use crate::ui::{Page, Screen, TerminalAction};

/// Entries of the power menu, in selection order.
pub const POWER_MENU_ITEMS: [&str; 3] = ["Reboot", "Shutdown", "Reset Network"];

/// Entries of every Yes/No dialog, in selection order.
pub const DIALOG_ITEMS: [&str; 2] = ["Yes", "No"];

/// Top of the first list row; rows are `ROW_PITCH` apart.
pub const LIST_TOP: i32 = 20;
pub const ROW_PITCH: i32 = 14;
const ROW_HEIGHT: u32 = 13;

/// Everything needed to draw one frame.
#[derive(Clone, Debug)]
pub struct RenderContext {
    pub screen: Screen,
    pub selection: usize,
    pub telemetry: SystemSnapshot,
    /// Local wall-clock time for the Date page and warning flashes.
    pub now: NaiveDateTime,
}

/// Builds frames from UI state.
pub trait FrameRenderer {
    fn render(&self, ctx: &RenderContext) -> Result<Frame, Error>;
}

/// The device's page layouts.
#[derive(Clone, Copy, Debug, Default)]
pub struct PageRenderer;

impl FrameRenderer for PageRenderer {
    fn render(&self, ctx: &RenderContext) -> Result<Frame, Error> {
        let mut frame = Frame::blank();
        match ctx.screen {
            Screen::Page(Page::DateVersion) => draw_date_version(&mut frame, ctx),
            Screen::Page(Page::SystemInfo) => draw_system_info(&mut frame, ctx),
            Screen::Page(Page::PowerMenu) => {
                draw_list(&mut frame, "Power Options", &POWER_MENU_ITEMS, ctx.selection)
            }
            Screen::Page(Page::RebootConfirm) => {
                draw_list(&mut frame, "Reboot?", &DIALOG_ITEMS, ctx.selection)
            }
            Screen::Page(Page::ShutdownConfirm) => {
                draw_list(&mut frame, "Shutdown?", &DIALOG_ITEMS, ctx.selection)
            }
            Screen::Page(Page::ResetNetworkConfirm) => {
                draw_list(&mut frame, "Reset Network?", &DIALOG_ITEMS, ctx.selection)
            }
            Screen::Terminal(action) => draw_please_wait(&mut frame, action),
        }
        Ok(frame)
    }
}

/// Decode a 1-bit BMP into a frame, for the startup splash.
pub fn splash_frame(bmp: &[u8]) -> Result<Frame, Error> {
    let image = Bmp::<BinaryColor>::from_slice(bmp)
        .map_err(|e| Error::Render(format!("splash image: {:?}", e)))?;
    let mut frame = Frame::blank();
    let _ = Image::new(&image, Point::zero()).draw(&mut frame);
    Ok(frame)
}

fn style(font: &'static MonoFont<'static>, color: BinaryColor) -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyle::new(font, color)
}

fn text(frame: &mut Frame, s: &str, x: i32, y: i32, font: &'static MonoFont<'static>) {
    let _ = Text::with_baseline(s, Point::new(x, y), style(font, BinaryColor::On), Baseline::Top)
        .draw(frame);
}

fn or_na<T: core::fmt::Display>(value: Option<T>) -> String<8> {
    let mut out = String::new();
    match value {
        Some(v) => {
            let _ = write!(out, "{}", v);
        }
        None => {
            let _ = out.push_str(UNAVAILABLE);
        }
    }
    out
}

fn draw_date_version(frame: &mut Frame, ctx: &RenderContext) {
    let mut line: String<24> = String::new();
    let _ = write!(line, "{}", ctx.now.format("%d %b %Y"));
    text(frame, &line, 2, 2, &FONT_7X13_BOLD);

    line.clear();
    let _ = write!(line, "{}", ctx.now.format("%H:%M:%S"));
    text(frame, &line, 2, 18, &FONT_6X10);

    let device = &ctx.telemetry.device;
    text(frame, &device.model, 2, 34, &FONT_6X10);
    text(frame, &device.version_line(), 2, 50, &FONT_6X10);
}

fn draw_system_info(frame: &mut Frame, ctx: &RenderContext) {
    let t = &ctx.telemetry;

    let mut ip: String<16> = String::new();
    match t.ip {
        Some(addr) => {
            let _ = write!(ip, "{}", addr);
        }
        None => {
            let _ = ip.push_str(UNAVAILABLE);
        }
    }
    text(frame, &ip, 2, 0, &FONT_7X14);

    let mac = t.mac.as_deref().unwrap_or(UNAVAILABLE);
    text(frame, mac, 2, 18, &FONT_6X12);

    let mut stats: String<32> = String::new();
    let _ = write!(
        stats,
        "CPU:{}% M:{}% D:{}%",
        or_na(t.cpu_percent),
        or_na(t.memory_percent),
        or_na(t.disk_percent)
    );
    text(frame, &stats, 2, 36, &FONT_6X10);

    // A critical temperature blinks: hidden on even seconds.
    let status = t.thermal_status();
    let blink_off = status.is_some_and(|s| s.flashes()) && ctx.now.second() % 2 == 0;
    if !blink_off {
        let mut temp: String<24> = String::new();
        match (t.temperature_c, status) {
            (Some(c), Some(status)) => {
                let _ = write!(temp, "T:{}C {}", c, status.label());
            }
            _ => {
                let _ = write!(temp, "T:{} {}", UNAVAILABLE, UNAVAILABLE);
            }
        }
        text(frame, &temp, 2, 50, &FONT_6X10);
    }
}

fn draw_list(frame: &mut Frame, title: &str, items: &[&str], selection: usize) {
    text(frame, title, 2, 2, &FONT_7X13_BOLD);

    for (row, item) in items.iter().enumerate() {
        let y = LIST_TOP + row as i32 * ROW_PITCH;
        let color = if row == selection {
            let _ = Rectangle::new(Point::new(2, y), Size::new(DISPLAY_WIDTH - 6, ROW_HEIGHT))
                .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
                .draw(frame);
            BinaryColor::Off
        } else {
            BinaryColor::On
        };
        let _ = Text::with_baseline(item, Point::new(4, y + 1), style(&FONT_6X10, color), Baseline::Top)
            .draw(frame);
    }
}

fn draw_please_wait(frame: &mut Frame, action: TerminalAction) {
    text(frame, action.title(), 2, 2, &FONT_7X13_BOLD);
    text(frame, "Please wait...", 2, 20, &FONT_6X10);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::DeviceInfo;
    use chrono::NaiveDate;

    fn ctx(screen: Screen, selection: usize) -> RenderContext {
        RenderContext {
            screen,
            selection,
            telemetry: SystemSnapshot::default(),
            now: NaiveDate::from_ymd_opt(2025, 11, 26)
                .unwrap()
                .and_hms_opt(14, 3, 7)
                .unwrap(),
        }
    }

    fn render(ctx: &RenderContext) -> Frame {
        PageRenderer.render(ctx).unwrap()
    }

    fn row_band(row: usize) -> (u32, u32) {
        let top = (LIST_TOP + row as i32 * ROW_PITCH) as u32;
        (top, top + ROW_HEIGHT)
    }

    #[test]
    fn every_screen_draws_something() {
        let screens = [
            Screen::Page(Page::DateVersion),
            Screen::Page(Page::SystemInfo),
            Screen::Page(Page::PowerMenu),
            Screen::Page(Page::RebootConfirm),
            Screen::Page(Page::ShutdownConfirm),
            Screen::Page(Page::ResetNetworkConfirm),
            Screen::Terminal(TerminalAction::Reboot),
            Screen::Terminal(TerminalAction::PowerOff),
        ];
        for screen in screens {
            assert!(render(&ctx(screen, 0)).lit_pixels() > 0, "{:?} is blank", screen);
        }
    }

    #[test]
    fn selected_row_is_inverted() {
        for selection in 0..3 {
            let frame = render(&ctx(Screen::Page(Page::PowerMenu), selection));
            for row in 0..3 {
                let (y0, y1) = row_band(row);
                let lit = frame.lit_pixels_in_rows(y0, y1);
                // A filled bar lights far more pixels than text alone.
                if row == selection {
                    assert!(lit > 800, "row {} should be highlighted ({} lit)", row, lit);
                } else {
                    assert!(lit < 400, "row {} should be plain ({} lit)", row, lit);
                }
            }
        }
    }

    #[test]
    fn dialogs_differ_by_title_only() {
        let reboot = render(&ctx(Screen::Page(Page::RebootConfirm), 1));
        let shutdown = render(&ctx(Screen::Page(Page::ShutdownConfirm), 1));
        assert_ne!(reboot, shutdown);
        let (y0, _) = row_band(0);
        assert_eq!(
            reboot.lit_pixels_in_rows(y0, 64),
            shutdown.lit_pixels_in_rows(y0, 64)
        );
    }

    #[test]
    fn critical_temperature_blinks() {
        let mut hot = ctx(Screen::Page(Page::SystemInfo), 0);
        hot.telemetry.temperature_c = Some(85);

        hot.now = hot.now.with_second(8).unwrap();
        let hidden = render(&hot);
        hot.now = hot.now.with_second(9).unwrap();
        let shown = render(&hot);

        assert_eq!(hidden.lit_pixels_in_rows(50, 64), 0);
        assert!(shown.lit_pixels_in_rows(50, 64) > 0);
    }

    #[test]
    fn normal_temperature_never_blinks() {
        let mut warm = ctx(Screen::Page(Page::SystemInfo), 0);
        warm.telemetry.temperature_c = Some(50);
        warm.now = warm.now.with_second(8).unwrap();
        assert!(render(&warm).lit_pixels_in_rows(50, 64) > 0);
    }

    #[test]
    fn unavailable_metrics_still_render() {
        let frame = render(&ctx(Screen::Page(Page::SystemInfo), 0));
        assert!(frame.lit_pixels_in_rows(0, 14) > 0);
        assert!(frame.lit_pixels_in_rows(36, 48) > 0);
    }

    #[test]
    fn model_name_changes_the_frame() {
        let base = ctx(Screen::Page(Page::DateVersion), 0);
        let mut custom = base.clone();
        custom.telemetry.device = DeviceInfo {
            model: String::try_from("Booth Unit").unwrap(),
            ..DeviceInfo::default()
        };
        assert_ne!(render(&base), render(&custom));
    }

    #[test]
    fn or_na_formats_placeholder() {
        assert_eq!(or_na(Some(42u8)).as_str(), "42");
        assert_eq!(or_na::<u8>(None).as_str(), "N/A");
    }

    /// 8×2 1-bit BMP with every pixel set to palette entry 1 (white).
    fn white_bmp() -> Vec<u8> {
        let mut bmp = Vec::new();
        // File header: magic, size, reserved, pixel data offset.
        bmp.extend_from_slice(b"BM");
        bmp.extend_from_slice(&70u32.to_le_bytes());
        bmp.extend_from_slice(&0u32.to_le_bytes());
        bmp.extend_from_slice(&62u32.to_le_bytes());
        // BITMAPINFOHEADER.
        bmp.extend_from_slice(&40u32.to_le_bytes());
        bmp.extend_from_slice(&8i32.to_le_bytes());
        bmp.extend_from_slice(&2i32.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&0u32.to_le_bytes());
        bmp.extend_from_slice(&8u32.to_le_bytes());
        bmp.extend_from_slice(&2835i32.to_le_bytes());
        bmp.extend_from_slice(&2835i32.to_le_bytes());
        bmp.extend_from_slice(&2u32.to_le_bytes());
        bmp.extend_from_slice(&0u32.to_le_bytes());
        // Palette: black, white.
        bmp.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x00]);
        // Two rows, padded to 4 bytes each.
        bmp.extend_from_slice(&[0xFF, 0, 0, 0, 0xFF, 0, 0, 0]);
        assert_eq!(bmp.len(), 70);
        bmp
    }

    #[test]
    fn splash_decodes_one_bit_bitmap() {
        let frame = splash_frame(&white_bmp()).unwrap();
        assert_eq!(frame.lit_pixels(), 16);
        assert!(frame.pixel(0, 0));
        assert!(frame.pixel(7, 1));
        assert!(!frame.pixel(8, 0));
        assert!(!frame.pixel(0, 2));
    }

    #[test]
    fn splash_rejects_garbage() {
        assert!(matches!(splash_frame(b"not a bitmap"), Err(Error::Render(_))));
    }
}
