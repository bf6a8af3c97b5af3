/*
 *  modes/brightness.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Brightness control
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

use embedded_graphics::prelude::*;
use log::{error, info, warn};

use super::ModeKind;
use crate::draw::{self, colors, text_width, BIG_FONT};
use crate::frame::{Frame, PanelSize};
use crate::panel::SharedPanel;
use crate::screen::RenderError;

pub const STEP: u8 = 10;
const MAX: u8 = 100;

pub struct BrightnessMode {
    panel: SharedPanel,
    value: u8,
    size: PanelSize,
}

impl BrightnessMode {
    /// Applies `initial` to the panel straight away.
    pub fn new(panel: SharedPanel, initial: u8, size: PanelSize) -> Self {
        let mut mode = Self { panel, value: initial.min(MAX), size };
        mode.apply();
        mode
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    fn apply(&mut self) {
        match self.panel.set_brightness(self.value) {
            Ok(()) => info!("brightness {}%", self.value),
            Err(e) => warn!("brightness {}% not applied: {}", self.value, e),
        }
    }

    pub fn handle_push(&mut self) -> Option<ModeKind> {
        Some(ModeKind::Main)
    }

    pub fn handle_cw(&mut self) -> Option<ModeKind> {
        self.value = self.value.saturating_add(STEP).min(MAX);
        self.apply();
        None
    }

    pub fn handle_ccw(&mut self) -> Option<ModeKind> {
        self.value = self.value.saturating_sub(STEP);
        self.apply();
        None
    }

    pub fn image(&self) -> Frame {
        self.draw().unwrap_or_else(|e| {
            error!("brightness render failed: {}", e);
            Frame::new(self.size)
        })
    }

    fn draw(&self) -> Result<Frame, RenderError> {
        let mut frame = Frame::new(self.size);
        draw::draw_header(&mut frame, "Brightness", colors::GREY)?;

        let text = format!("{}%", self.value);
        let x = (64 - text_width(&text, BIG_FONT) as i32) / 2;
        let (text_y, bar_y) = if self.size.is_short() { (11, 27) } else { (18, 42) };
        draw::draw_text(&mut frame, &text, x, text_y, BIG_FONT, colors::WHITE)?;

        let (left, right) = (4, 59);
        let bottom = bar_y + if self.size.is_short() { 3 } else { 7 };
        draw::draw_rectangle(&mut frame, Point::new(left, bar_y), Point::new(right, bottom), None, Some(colors::LIGHT_GREY))?;
        let fill = (right - left - 1) * self.value as i32 / MAX as i32;
        if fill > 0 {
            draw::draw_rectangle(
                &mut frame,
                Point::new(left + 1, bar_y + 1),
                Point::new(left + fill, bottom - 1),
                Some(colors::AMBER),
                None,
            )?;
        }
        Ok(frame)
    }
}
