/*
 *  modes/off.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Screen off
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

use super::ModeKind;
use crate::frame::{Frame, PanelSize};

pub struct OffMode {
    size: PanelSize,
}

impl OffMode {
    pub fn new(size: PanelSize) -> Self {
        Self { size }
    }

    pub fn handle_push(&mut self) -> Option<ModeKind> {
        Some(ModeKind::Main)
    }

    pub fn handle_cw(&mut self) -> Option<ModeKind> {
        None
    }

    pub fn handle_ccw(&mut self) -> Option<ModeKind> {
        None
    }

    pub fn image(&self) -> Frame {
        Frame::new(self.size)
    }
}
