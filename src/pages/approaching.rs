/*
 *  pages/approaching.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Static departures board, everything five minutes out
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

use chrono::NaiveDateTime;

use crate::draw::{self, colors, FONT, SMALL_FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;
use crate::source::{FetchError, FnFetch};

pub const NAME: &str = "approaching";
// nothing to refresh
pub const TTL: Duration = Duration::from_secs(24 * 3600);

const BOARD: &[&str] = &[
    "dial a fish",
    "make a fish",
    "ssh a fish",
    "spin a fish",
    "bake a dish",
    "make a seq.",
];

const SHORT_BOARD: &[&str] = &["make a fish", "bake a dish", "make a seq."];

const WAIT_MINUTES: u32 = 5;

type Ready = std::future::Ready<Result<(), FetchError>>;

pub fn fetcher() -> FnFetch<impl Fn() -> Ready + Send + Sync, impl Fn() + Send + Sync> {
    FnFetch::new(|| std::future::ready(Ok(())), || ())
}

pub fn render(_: &(), size: PanelSize) -> Result<Option<Frame>, RenderError> {
    draw_approaching(size, super::now()).map(Some)
}

pub fn draw_approaching(size: PanelSize, now: NaiveDateTime) -> Result<Frame, RenderError> {
    let mut frame = Frame::new(size);
    draw::draw_text_right(&mut frame, &now.format("%H:%M").to_string(), 64, 1, FONT, colors::AMBER)?;

    let (board, top) = if size.is_short() { (SHORT_BOARD, 10) } else { (BOARD, 12) };
    for (i, label) in board.iter().enumerate() {
        let y = top + 9 * i as i32;
        draw::draw_text(&mut frame, label, 1, y + 1, SMALL_FONT, colors::AMBER)?;
        draw::draw_text_right(&mut frame, &WAIT_MINUTES.to_string(), 57, y, FONT, colors::AMBER)?;
        draw::draw_text(&mut frame, "m", 59, y, FONT, colors::AMBER)?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Fetch;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_fetch_never_fails() {
        assert!(fetcher().fetch().await.is_ok());
    }

    #[test]
    fn test_board_fits_both_panels() {
        let now = NaiveDate::from_ymd_opt(2024, 11, 11).unwrap().and_hms_opt(11, 5, 0).unwrap();
        for size in [PanelSize::P64x64, PanelSize::P64x32] {
            let frame = draw_approaching(size, now).unwrap();
            assert_eq!(frame.panel_size(), size);
            assert!(!frame.is_blank());
        }
    }
}
