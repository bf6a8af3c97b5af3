/*
 *  frame.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
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

use core::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use serde::{Deserialize, Serialize};

/// Supported LED matrix geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PanelSize {
    /// 64 columns x 64 rows
    P64x64,
    /// 64 columns x 32 rows
    P64x32,
}

impl PanelSize {
    pub fn width(self) -> u32 {
        64
    }

    pub fn height(self) -> u32 {
        match self {
            PanelSize::P64x64 => 64,
            PanelSize::P64x32 => 32,
        }
    }

    pub fn size(self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// True for the short panel, which most pages lay out differently.
    pub fn is_short(self) -> bool {
        self == PanelSize::P64x32
    }
}

impl Default for PanelSize {
    fn default() -> Self {
        PanelSize::P64x64
    }
}

impl fmt::Display for PanelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width(), self.height())
    }
}

impl FromStr for PanelSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "64x64" => Ok(PanelSize::P64x64),
            "64x32" => Ok(PanelSize::P64x32),
            other => Err(format!("unsupported panel size '{}' (expected 64x64 or 64x32)", other)),
        }
    }
}

impl TryFrom<String> for PanelSize {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PanelSize> for String {
    fn from(value: PanelSize) -> Self {
        value.to_string()
    }
}

/// One rendered RGB bitmap of panel dimensions.
///
/// Frames compare by content, which is what the render loop uses to skip
/// redundant writes to the panel and the preview stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    buf: Vec<Rgb888>,
    size: PanelSize,
}

impl Frame {
    /// A black frame.
    pub fn new(size: PanelSize) -> Self {
        Self::filled(size, Rgb888::BLACK)
    }

    pub fn filled(size: PanelSize, fill: Rgb888) -> Self {
        let len = (size.width() * size.height()) as usize;
        Self { buf: vec![fill; len], size }
    }

    pub fn panel_size(&self) -> PanelSize {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.width() as usize
    }

    pub fn height(&self) -> usize {
        self.size.height() as usize
    }

    /// Row-major pixels.
    pub fn as_slice(&self) -> &[Rgb888] {
        &self.buf
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb888> {
        if x < self.width() && y < self.height() {
            Some(self.buf[y * self.width() + x])
        } else {
            None
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb888) {
        if x < self.width() && y < self.height() {
            let w = self.width();
            self.buf[y * w + x] = color;
        }
    }

    pub fn is_blank(&self) -> bool {
        self.buf.iter().all(|c| *c == Rgb888::BLACK)
    }

    /// Encode as PNG, upscaled by `scale` with nearest-neighbour sampling.
    pub fn encode_png(&self, scale: u32) -> Result<Vec<u8>, String> {
        let scale = scale.max(1);
        let (w, h) = (self.size.width() * scale, self.size.height() * scale);
        let mut pixmap = tiny_skia::Pixmap::new(w, h)
            .ok_or_else(|| format!("cannot allocate {}x{} pixmap", w, h))?;
        let data = pixmap.data_mut();
        for y in 0..h as usize {
            for x in 0..w as usize {
                let c = self.buf[(y / scale as usize) * self.width() + x / scale as usize];
                let i = (y * w as usize + x) * 4;
                data[i..i + 4].copy_from_slice(&[c.r(), c.g(), c.b(), 0xff]);
            }
        }
        pixmap.encode_png().map_err(|e| e.to_string())
    }

    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.width() && y < self.height() {
                return Some(y * self.width() + x);
            }
        }
        None
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        self.size.size()
    }
}

impl DrawTarget for Frame {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        // clip per pixel, the area may hang off any edge
        let Size { width, height } = area.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let mut it = colors.into_iter();
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                let Some(c) = it.next() else { return Ok(()) };
                if let Some(i) = self.idx(area.top_left + Point::new(col, row)) {
                    self.buf[i] = c;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_panel_size_parse() {
        assert_eq!("64x64".parse::<PanelSize>(), Ok(PanelSize::P64x64));
        assert_eq!(" 64X32 ".parse::<PanelSize>(), Ok(PanelSize::P64x32));
        assert!("128x64".parse::<PanelSize>().is_err());
        assert_eq!(PanelSize::P64x32.to_string(), "64x32");
    }

    #[test]
    fn test_frame_dimensions() {
        let f = Frame::new(PanelSize::P64x32);
        assert_eq!(f.width(), 64);
        assert_eq!(f.height(), 32);
        assert_eq!(f.as_slice().len(), 64 * 32);
        assert!(f.is_blank());
    }

    #[test]
    fn test_frames_compare_by_content() {
        let mut a = Frame::new(PanelSize::P64x64);
        let b = Frame::new(PanelSize::P64x64);
        assert_eq!(a, b);

        a.set_pixel(3, 4, Rgb888::RED);
        assert_ne!(a, b);
        assert_eq!(a.pixel(3, 4), Some(Rgb888::RED));
        assert_eq!(a.pixel(64, 0), None);
    }

    #[test]
    fn test_fill_clips_off_panel() {
        let mut f = Frame::new(PanelSize::P64x32);
        Rectangle::new(Point::new(60, 28), Size::new(10, 10))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::GREEN))
            .draw(&mut f)
            .unwrap();
        assert_eq!(f.pixel(63, 31), Some(Rgb888::GREEN));
        assert_eq!(f.pixel(59, 31), Some(Rgb888::BLACK));
    }

    #[test]
    fn test_png_encode_has_signature() {
        let png = Frame::filled(PanelSize::P64x32, Rgb888::BLUE).encode_png(2).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
