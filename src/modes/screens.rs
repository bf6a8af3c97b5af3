/*
 *  modes/screens.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Enable and disable rotating screens
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

use std::sync::Arc;

use embedded_graphics::prelude::*;
use log::{error, info};

use super::{scroll_start, ModeKind};
use crate::draw::{self, colors, FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::{RenderError, Screen};

const TOP: i32 = 12;
const PITCH: i32 = 10;

/// Cursor 0 is the back arrow in the header, 1..=n the screens.
pub struct ScreensMode {
    screens: Vec<Arc<dyn Screen>>,
    cursor: usize,
    size: PanelSize,
}

impl ScreensMode {
    pub fn new(screens: Vec<Arc<dyn Screen>>, size: PanelSize) -> Self {
        Self { screens, cursor: 0, size }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn total(&self) -> usize {
        self.screens.len() + 1
    }

    pub fn handle_push(&mut self) -> Option<ModeKind> {
        let Some(screen) = self.cursor.checked_sub(1).and_then(|i| self.screens.get(i)) else {
            return Some(ModeKind::Menu);
        };
        let enabled = !screen.is_enabled();
        screen.set_enabled(enabled);
        info!("screen {} {}", screen.name(), if enabled { "enabled" } else { "disabled" });
        None
    }

    pub fn handle_cw(&mut self) -> Option<ModeKind> {
        self.cursor = (self.cursor + 1) % self.total();
        None
    }

    pub fn handle_ccw(&mut self) -> Option<ModeKind> {
        self.cursor = (self.cursor + self.total() - 1) % self.total();
        None
    }

    pub fn image(&self) -> Frame {
        self.draw().unwrap_or_else(|e| {
            error!("screens render failed: {}", e);
            Frame::new(self.size)
        })
    }

    fn draw(&self) -> Result<Frame, RenderError> {
        let mut frame = Frame::new(self.size);

        if self.cursor == 0 {
            draw::draw_rectangle(&mut frame, Point::new(0, 0), Point::new(10, 10), Some(colors::BLUE), None)?;
        }
        draw::draw_line(&mut frame, Point::new(2, 5), Point::new(8, 5), colors::WHITE)?;
        draw::draw_line(&mut frame, Point::new(2, 5), Point::new(5, 8), colors::WHITE)?;
        draw::draw_line(&mut frame, Point::new(2, 5), Point::new(5, 2), colors::WHITE)?;
        draw::draw_text(&mut frame, "Screens", 16, 1, FONT, colors::GREY)?;
        draw::draw_line(&mut frame, Point::new(11, 10), Point::new(63, 10), colors::LIGHT_GREY)?;

        let visible = ((self.size.height() as i32 - TOP) / PITCH) as usize;
        let selected = self.cursor.checked_sub(1);
        let first = selected.map_or(0, |s| scroll_start(s, visible));

        for (row, (i, screen)) in self.screens.iter().enumerate().skip(first).take(visible).enumerate() {
            let y = TOP + PITCH * row as i32;
            let current = selected == Some(i);
            if current {
                draw::draw_rectangle(&mut frame, Point::new(0, y), Point::new(63, y + PITCH - 1), None, Some(colors::BLUE))?;
            }
            draw_checkbox(&mut frame, Point::new(2, y + 1), screen.is_enabled())?;
            let color = if current { colors::WHITE } else { colors::LIGHT_GREY };
            draw::draw_text(&mut frame, screen.name(), 12, y + 1, FONT, color)?;
        }
        Ok(frame)
    }
}

/// 8x8 box, green and ticked when checked.
fn draw_checkbox(frame: &mut Frame, at: Point, checked: bool) -> Result<(), RenderError> {
    let p = |x, y| at + Point::new(x, y);
    let fill = checked.then_some(colors::GREEN);
    draw::draw_rectangle(frame, p(0, 0), p(7, 7), fill, Some(colors::LIGHT_GREY))?;
    if checked {
        draw::draw_polyline(frame, &[p(1, 4), p(3, 6), p(6, 1)], colors::WHITE)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::testing::{Output, StaticScreen};
    use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

    fn screens(n: usize) -> Vec<Arc<dyn Screen>> {
        (0..n)
            .map(|i| StaticScreen::new(&format!("s{}", i), Output::Solid(Rgb888::RED)) as Arc<dyn Screen>)
            .collect()
    }

    #[test]
    fn test_back_returns_to_menu() {
        let mut mode = ScreensMode::new(screens(2), PanelSize::P64x64);
        assert_eq!(mode.handle_push(), Some(ModeKind::Menu));
        mode.handle_ccw();
        assert_eq!(mode.cursor(), 2);
        mode.handle_cw();
        assert_eq!(mode.cursor(), 0);
    }

    #[test]
    fn test_push_toggles_enabled() {
        let list = screens(3);
        let mut mode = ScreensMode::new(list.clone(), PanelSize::P64x64);
        mode.handle_cw();
        mode.handle_cw();
        assert_eq!(mode.handle_push(), None);
        assert!(!list[1].is_enabled());
        assert!(list[0].is_enabled());
        let unchecked = mode.image();
        mode.handle_push();
        assert!(list[1].is_enabled());
        assert_ne!(unchecked, mode.image());
    }

    #[test]
    fn test_cursor_row_stays_visible() {
        let mut mode = ScreensMode::new(screens(6), PanelSize::P64x32);
        for _ in 0..6 {
            mode.handle_cw();
            let frame = mode.image();
            // the cursor outline is always drawn
            assert!(frame.as_slice().iter().any(|c| *c == colors::BLUE));
        }
    }
}
