/*
 *  pages/no_connection.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Clock placeholder shown when no page has anything to draw
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

use chrono::NaiveDateTime;

use crate::draw::{self, colors, text_width, BIG_FONT, FONT, SMALL_FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;

pub const NO_CONNECTION: &str = "no connection";
pub const NO_DATA: &str = "no data";

fn centred(text: &str, font: &embedded_graphics::mono_font::MonoFont) -> i32 {
    ((64 - text_width(text, font) as i32) / 2).max(0)
}

/// HH:MM, MM/DD/YY and a status line.
pub fn draw_no_connection(size: PanelSize, now: NaiveDateTime, status: &str) -> Result<Frame, RenderError> {
    let mut frame = Frame::new(size);
    let time_str = now.format("%H:%M").to_string();
    let date_str = now.format("%m/%d/%y").to_string();

    let (time_y, date_y, status_y) = if size.is_short() { (1, 16, 25) } else { (10, 28, 52) };
    draw::draw_text(&mut frame, &time_str, centred(&time_str, BIG_FONT), time_y, BIG_FONT, colors::WHITE)?;
    draw::draw_text(&mut frame, &date_str, centred(&date_str, FONT), date_y, FONT, colors::WHITE)?;
    draw::draw_text(&mut frame, status, centred(status, SMALL_FONT), status_y, SMALL_FONT, colors::LIGHT_GREY)?;
    Ok(frame)
}

/// Placeholder for Main mode. Never fails: a clock with no text is still a
/// clock.
pub fn placeholder(size: PanelSize, now: NaiveDateTime) -> Frame {
    draw_no_connection(size, now, NO_DATA).unwrap_or_else(|_| Frame::new(size))
}
