/*
 *  pages/fish.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	11:11 make a fish
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

use std::time::Duration;

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use reqwest::Client;
use tiny_skia::Pixmap;

use crate::draw::{self, colors, FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;
use crate::source::{Fetch, FetchError};

pub const NAME: &str = "fish";
pub const TTL: Duration = Duration::from_secs(5);

const FISH_URL: &str = "http://makea.fish/fishimg.php?s=11&t=x6362x&f=11";

/// Straight-alpha RGBA image no larger than its panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<[u8; 4]>,
}

impl Thumbnail {
    /// Shrink to fit `max_w` x `max_h` keeping aspect, never enlarging.
    pub fn fit(pixmap: &Pixmap, max_w: u32, max_h: u32) -> Self {
        let (w, h) = (pixmap.width(), pixmap.height());
        let scale = (max_w as f32 / w as f32).min(max_h as f32 / h as f32).min(1.0);
        let tw = ((w as f32 * scale).round() as u32).clamp(1, max_w);
        let th = ((h as f32 * scale).round() as u32).clamp(1, max_h);
        Self::resize(pixmap, tw, th)
    }

    /// Nearest-neighbour resample to exactly `tw` x `th`.
    pub fn resize(pixmap: &Pixmap, tw: u32, th: u32) -> Self {
        let (w, h) = (pixmap.width(), pixmap.height());
        let mut rgba = Vec::with_capacity((tw * th) as usize);
        for y in 0..th {
            for x in 0..tw {
                let sx = (x * w / tw).min(w - 1);
                let sy = (y * h / th).min(h - 1);
                let px = pixmap
                    .pixel(sx, sy)
                    .map(|p| p.demultiply())
                    .map_or([0, 0, 0, 0], |c| [c.red(), c.green(), c.blue(), c.alpha()]);
                rgba.push(px);
            }
        }
        Self { width: tw, height: th, rgba }
    }

    /// Alpha-composite over `frame` with the top-left at (`left`, `top`).
    pub fn paste_at(&self, frame: &mut Frame, left: usize, top: usize) {
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                let [r, g, b, a] = self.rgba[y * self.width as usize + x];
                let Some(under) = frame.pixel(left + x, top + y) else { continue };
                let mix = |top: u8, bottom: u8| {
                    ((top as u32 * a as u32 + bottom as u32 * (255 - a as u32)) / 255) as u8
                };
                frame.set_pixel(
                    left + x,
                    top + y,
                    Rgb888::new(mix(r, under.r()), mix(g, under.g()), mix(b, under.b())),
                );
            }
        }
    }
}

/// One fish, pre-fitted to both panel shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FishImage {
    pub tall: Thumbnail,
    pub short: Thumbnail,
}

impl FishImage {
    pub fn decode(png: &[u8]) -> Result<Self, FetchError> {
        let pixmap = Pixmap::decode_png(png).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(Self {
            tall: Thumbnail::fit(&pixmap, 64, 64),
            short: Thumbnail::fit(&pixmap, 64, 32),
        })
    }
}

pub struct FishFetch {
    client: Client,
}

impl FishFetch {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Fetch for FishFetch {
    type Data = Option<FishImage>;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        let bytes = self.client.get(FISH_URL).send().await?.error_for_status()?.bytes().await?;
        FishImage::decode(&bytes).map(Some)
    }

    // no fish, just the water
    fn fallback(&self) -> Self::Data {
        None
    }
}

pub fn render(data: &Option<FishImage>, size: PanelSize) -> Result<Option<Frame>, RenderError> {
    draw_fish(data.as_ref(), size).map(Some)
}

pub fn draw_fish(fish: Option<&FishImage>, size: PanelSize) -> Result<Frame, RenderError> {
    let mut frame = Frame::filled(size, colors::BLUE);

    if let Some(fish) = fish {
        let thumb = if size.is_short() { &fish.short } else { &fish.tall };
        thumb.paste_at(&mut frame, 0, 0);
    }

    if size.is_short() {
        draw::draw_text(&mut frame, "11:11", 39, 24, FONT, colors::WHITE)?;
    } else {
        draw::draw_text(&mut frame, "11:11", 20, 47, FONT, colors::WHITE)?;
        draw::draw_text(&mut frame, "make a fish", 5, 55, FONT, colors::WHITE)?;
    }
    Ok(frame)
}
