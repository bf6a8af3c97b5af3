/*
 *  draw.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Drawing helpers shared by pages and modes
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle},
    text::{Baseline, Text},
};

use embedded_text::{
    alignment::{HorizontalAlignment, VerticalAlignment},
    style::TextBoxStyleBuilder,
    TextBox,
};

use qrcode::{Color as QrColor, EcLevel, QrCode};

// latin-1 for the degree sign
pub use embedded_graphics::mono_font::iso_8859_1::{FONT_4X6, FONT_5X8, FONT_6X10, FONT_9X15_BOLD};

/// Body text, roughly the 5x7 pil font the panel layouts were designed for.
pub const FONT: &MonoFont<'static> = &FONT_5X8;
/// Small print.
pub const SMALL_FONT: &MonoFont<'static> = &FONT_4X6;
/// Readings next to an icon.
pub const MID_FONT: &MonoFont<'static> = &FONT_6X10;
/// Large numerals.
pub const BIG_FONT: &MonoFont<'static> = &FONT_9X15_BOLD;

pub mod colors {
    use embedded_graphics::pixelcolor::Rgb888;

    pub const WHITE: Rgb888 = Rgb888::new(0xff, 0xff, 0xff);
    pub const LIGHT_GREY: Rgb888 = Rgb888::new(0x88, 0x88, 0x88);
    pub const GREY: Rgb888 = Rgb888::new(0x99, 0x99, 0x99);
    pub const SILVER: Rgb888 = Rgb888::new(0xaa, 0xaa, 0xaa);
    pub const QR_LIGHT: Rgb888 = Rgb888::new(0xcc, 0xcc, 0xcc);
    pub const CYAN: Rgb888 = Rgb888::new(0x00, 0xff, 0xff);
    pub const BLUE: Rgb888 = Rgb888::new(0x00, 0x00, 0xff);
    pub const GREEN: Rgb888 = Rgb888::new(0x00, 0xaa, 0x44);
    pub const AMBER: Rgb888 = Rgb888::new(0xff, 0xaa, 0x00);
    pub const BLACK: Rgb888 = Rgb888::new(0x00, 0x00, 0x00);
}

/// Parse `#rrggbb` (leading `#` optional).
pub fn hex(s: &str) -> Option<Rgb888> {
    let s = s.trim().trim_start_matches('#');
    if s.len() != 6 {
        return None;
    }
    let v = u32::from_str_radix(s, 16).ok()?;
    Some(Rgb888::new((v >> 16) as u8, (v >> 8) as u8, v as u8))
}

/// Left-aligned text with its top edge at `y`.
pub fn draw_text<D>(
    target: &mut D,
    text: &str,
    x: i32,
    y: i32,
    font: &MonoFont,
    color: Rgb888,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    Text::with_baseline(text, Point::new(x, y), MonoTextStyle::new(font, color), Baseline::Top)
        .draw(target)?;
    Ok(())
}

/// Right-aligned text ending at column `right` (exclusive).
pub fn draw_text_right<D>(
    target: &mut D,
    text: &str,
    right: i32,
    y: i32,
    font: &MonoFont,
    color: Rgb888,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let w = text_width(text, font) as i32;
    draw_text(target, text, right - w, y, font, color)
}

/// Pixel width of `text` in a monospaced font.
pub fn text_width(text: &str, font: &MonoFont) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    n * font.character_size.width + (n - 1) * font.character_spacing
}

/// Word-wrapped text inside `region`, aligned as requested.
pub fn draw_text_region_align<D>(
    target: &mut D,
    text: &str,
    region: Rectangle,
    halign: HorizontalAlignment,
    valign: VerticalAlignment,
    font: &MonoFont,
    color: Rgb888,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let character_style = MonoTextStyle::new(font, color);
    let textbox_style = TextBoxStyleBuilder::new()
        .alignment(halign)
        .vertical_alignment(valign)
        .build();
    TextBox::with_textbox_style(text, region, character_style, textbox_style).draw(target)?;
    Ok(())
}

pub fn draw_line<D>(target: &mut D, start: Point, end: Point, color: Rgb888) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    Line::new(start, end)
        .into_styled(PrimitiveStyle::with_stroke(color, 1))
        .draw(target)?;
    Ok(())
}

/// Connected segments through `points`.
pub fn draw_polyline<D>(target: &mut D, points: &[Point], color: Rgb888) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    for pair in points.windows(2) {
        draw_line(target, pair[0], pair[1], color)?;
    }
    Ok(())
}

/// Rectangle by inclusive corners, PIL style.
pub fn draw_rectangle<D>(
    target: &mut D,
    top_left: Point,
    bottom_right: Point,
    fill: Option<Rgb888>,
    outline: Option<Rgb888>,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let mut style = PrimitiveStyleBuilder::new();
    if let Some(c) = fill {
        style = style.fill_color(c);
    }
    if let Some(c) = outline {
        style = style.stroke_color(c).stroke_width(1);
    }
    Rectangle::with_corners(top_left, bottom_right)
        .into_styled(style.build())
        .draw(target)?;
    Ok(())
}

/// Title row plus a separator rule, the header every settings screen uses.
pub fn draw_header<D>(target: &mut D, title: &str, color: Rgb888) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888> + OriginDimensions,
{
    let width = target.size().width as i32;
    let x = (width - text_width(title, FONT) as i32).max(0) / 2;
    draw_text(target, title, x, 0, FONT, color)?;
    draw_line(target, Point::new(0, 9), Point::new(width - 1, 9), colors::LIGHT_GREY)
}

/// Render `data` as a QR code centred in `area`.
///
/// The module size is the largest integer scale that fits, with a one
/// module quiet zone. Returns the module size used, or `None` when the
/// code cannot fit at one pixel per module.
pub fn draw_qr<D>(
    target: &mut D,
    data: &str,
    area: Rectangle,
    dark: Rgb888,
    light: Rgb888,
) -> Result<Option<u32>, D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let code = match QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L) {
        Ok(code) => code,
        Err(e) => {
            log::warn!("QR encode of '{}' failed: {:?}", data, e);
            return Ok(None);
        }
    };
    let modules = code.width() as u32;
    let span = modules + 2;
    let box_size = area.size.width.min(area.size.height) / span;
    if box_size == 0 {
        return Ok(None);
    }

    let px = span * box_size;
    let origin = area.top_left
        + Point::new(
            (area.size.width - px) as i32 / 2,
            (area.size.height - px) as i32 / 2,
        );

    Rectangle::new(origin, Size::new(px, px))
        .into_styled(PrimitiveStyle::with_fill(light))
        .draw(target)?;

    let module_style = PrimitiveStyle::with_fill(dark);
    for y in 0..modules {
        for x in 0..modules {
            if code[(x as usize, y as usize)] == QrColor::Dark {
                let p = origin + Point::new(((x + 1) * box_size) as i32, ((y + 1) * box_size) as i32);
                Rectangle::new(p, Size::new(box_size, box_size))
                    .into_styled(module_style)
                    .draw(target)?;
            }
        }
    }
    Ok(Some(box_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, PanelSize};

    #[test]
    fn test_hex_colors() {
        assert_eq!(hex("#00ff76"), Some(Rgb888::new(0, 0xff, 0x76)));
        assert_eq!(hex("FFAA00"), Some(colors::AMBER));
        assert_eq!(hex("#fff"), None);
        assert_eq!(hex("#zzzzzz"), None);
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("", FONT), 0);
        assert_eq!(text_width("ab", FONT), 2 * FONT.character_size.width + FONT.character_spacing);
    }

    #[test]
    fn test_rectangle_corners_are_inclusive() {
        let mut f = Frame::new(PanelSize::P64x64);
        draw_rectangle(&mut f, Point::new(1, 1), Point::new(8, 8), Some(colors::GREEN), None).unwrap();
        assert_eq!(f.pixel(8, 8), Some(colors::GREEN));
        assert_eq!(f.pixel(9, 9), Some(colors::BLACK));
    }

    #[test]
    fn test_qr_fits_small_panel() {
        let mut f = Frame::new(PanelSize::P64x32);
        let area = Rectangle::new(Point::zero(), Size::new(64, 32));
        let scale = draw_qr(&mut f, "http://192.168.1.20:8080/", area, colors::BLACK, colors::QR_LIGHT)
            .unwrap();
        assert_eq!(scale, Some(1));
        assert!(!f.is_blank());
    }
}
