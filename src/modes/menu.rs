/*
 *  modes/menu.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Settings menu
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
use log::error;

use super::{scroll_start, ModeKind};
use crate::draw::{self, colors, FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;

const TOP: i32 = 10;
const PITCH: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuOption {
    pub name: &'static str,
    pub target: ModeKind,
}

pub struct MenuMode {
    options: Vec<MenuOption>,
    selected: usize,
    size: PanelSize,
}

impl MenuMode {
    pub fn new(size: PanelSize, network: bool) -> Self {
        let mut options = vec![
            MenuOption { name: "Home", target: ModeKind::Main },
            MenuOption { name: "Screen Off", target: ModeKind::Off },
            MenuOption { name: "Brightness", target: ModeKind::Brightness },
            MenuOption { name: "Screens", target: ModeKind::Screens },
        ];
        if network {
            options.push(MenuOption { name: "Network", target: ModeKind::Network });
        }
        Self { options, selected: 0, size }
    }

    pub fn options(&self) -> &[MenuOption] {
        &self.options
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn handle_push(&mut self) -> Option<ModeKind> {
        self.options.get(self.selected).map(|o| o.target)
    }

    pub fn handle_cw(&mut self) -> Option<ModeKind> {
        self.selected = (self.selected + 1) % self.options.len();
        None
    }

    pub fn handle_ccw(&mut self) -> Option<ModeKind> {
        let n = self.options.len();
        self.selected = (self.selected + n - 1) % n;
        None
    }

    pub fn image(&self) -> Frame {
        self.draw().unwrap_or_else(|e| {
            error!("menu render failed: {}", e);
            Frame::new(self.size)
        })
    }

    fn draw(&self) -> Result<Frame, RenderError> {
        let mut frame = Frame::new(self.size);
        draw::draw_header(&mut frame, "Settings", colors::GREY)?;

        let visible = ((self.size.height() as i32 - TOP) / PITCH) as usize;
        let first = scroll_start(self.selected, visible);
        for (row, (i, opt)) in self.options.iter().enumerate().skip(first).take(visible).enumerate() {
            let y = TOP + PITCH * row as i32;
            let color = if i == self.selected { colors::WHITE } else { colors::LIGHT_GREY };
            if i == self.selected {
                draw::draw_rectangle(&mut frame, Point::new(0, y), Point::new(63, y + PITCH - 1), None, Some(colors::CYAN))?;
            }
            draw::draw_text(&mut frame, ">", 2, y + 1, FONT, color)?;
            draw::draw_text(&mut frame, opt.name, 10, y + 1, FONT, color)?;
        }
        Ok(frame)
    }
}
