/*
 *  modes/main.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Main mode: screen rotation and the special time window
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
use std::time::Duration;

use chrono::{NaiveDateTime, Timelike};
use log::{error, info};
use tokio::time::Instant;

use super::ModeKind;
use crate::config::{DEFAULT_SPECIAL_HOURS, DEFAULT_SPECIAL_MINUTE};
use crate::frame::{Frame, PanelSize};
use crate::pages::no_connection;
use crate::screen::Screen;

/// Builds the special screen. Called once per window entry; the returned
/// screen owns a fresh worker which is cancelled when it is dropped.
pub type SpecialFactory = Box<dyn FnMut() -> Box<dyn Screen> + Send>;

/// A minute that repeats at several hours of the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialWindow {
    pub minute: u32,
    pub hours: Vec<u32>,
}

impl Default for SpecialWindow {
    fn default() -> Self {
        Self {
            minute: DEFAULT_SPECIAL_MINUTE,
            hours: DEFAULT_SPECIAL_HOURS.to_vec(),
        }
    }
}

impl SpecialWindow {
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        now.minute() == self.minute && self.hours.contains(&now.hour())
    }
}

pub struct MainMode {
    screens: Vec<Arc<dyn Screen>>,
    size: PanelSize,
    // position in the active list, wrapped on use
    index: i64,
    dwell: Duration,
    manual_dwell: Duration,
    next_advance: Instant,
    window: SpecialWindow,
    factory: Option<SpecialFactory>,
    special: Option<Box<dyn Screen>>,
    specials_created: usize,
}

impl MainMode {
    pub fn new(
        screens: Vec<Arc<dyn Screen>>,
        size: PanelSize,
        dwell: Duration,
        manual_dwell: Duration,
        window: SpecialWindow,
        factory: Option<SpecialFactory>,
    ) -> Self {
        Self {
            screens,
            size,
            index: 0,
            dwell,
            manual_dwell,
            next_advance: Instant::now() + dwell,
            window,
            factory,
            special: None,
            specials_created: 0,
        }
    }

    pub fn size(&self) -> PanelSize {
        self.size
    }

    pub fn screens(&self) -> &[Arc<dyn Screen>] {
        &self.screens
    }

    /// Rotation position, already wrapped to the active list.
    pub fn index(&self) -> usize {
        let n = self.active_count();
        if n == 0 { 0 } else { self.index.rem_euclid(n as i64) as usize }
    }

    pub fn special_active(&self) -> bool {
        self.special.is_some()
    }

    pub fn specials_created(&self) -> usize {
        self.specials_created
    }

    fn active_count(&self) -> usize {
        self.screens.iter().filter(|s| s.is_enabled()).count()
    }

    fn rotate(&mut self, step: i64) {
        self.index += step;
        self.next_advance = Instant::now() + self.manual_dwell;
    }

    pub fn handle_push(&mut self) -> Option<ModeKind> {
        Some(ModeKind::Menu)
    }

    pub fn handle_cw(&mut self) -> Option<ModeKind> {
        self.rotate(1);
        None
    }

    pub fn handle_ccw(&mut self) -> Option<ModeKind> {
        self.rotate(-1);
        None
    }

    pub fn image(&mut self, now: NaiveDateTime) -> Frame {
        if self.window.contains(now) && self.factory.is_some() {
            if let Some(frame) = self.special_image() {
                return frame;
            }
            // special not ready yet: hold the current screen
            return self.rotation_image(now);
        }

        self.expire_special(now);

        if Instant::now() >= self.next_advance {
            self.index += 1;
            self.next_advance = Instant::now() + self.dwell;
        }
        self.rotation_image(now)
    }

    /// Drop the special screen, cancelling its worker, once `now` is
    /// outside the window. Runs every tick whichever mode is active.
    pub fn expire_special(&mut self, now: NaiveDateTime) {
        if self.special.is_none() || self.window.contains(now) {
            return;
        }
        self.special = None;
        info!("special window over, resuming rotation");
        self.next_advance = Instant::now() + self.dwell;
    }

    fn special_image(&mut self) -> Option<Frame> {
        if self.special.is_none() {
            let factory = self.factory.as_mut()?;
            let screen = factory();
            info!("special window open, showing {}", screen.name());
            self.special = Some(screen);
            self.specials_created += 1;
        }
        let screen = self.special.as_ref()?;
        match screen.render(self.size) {
            Ok(frame) => frame,
            Err(e) => {
                error!("render {} failed: {}", screen.name(), e);
                None
            }
        }
    }

    /// First active screen from the index onward that produces a frame.
    fn rotation_image(&mut self, now: NaiveDateTime) -> Frame {
        let active: Vec<&Arc<dyn Screen>> = self.screens.iter().filter(|s| s.is_enabled()).collect();
        let n = active.len() as i64;

        for step in 0..n {
            let screen = active[(self.index + step).rem_euclid(n) as usize];
            match screen.render(self.size) {
                Ok(Some(frame)) => {
                    self.index += step;
                    return frame;
                }
                Ok(None) => {}
                Err(e) => error!("render {} failed: {}", screen.name(), e),
            }
        }
        no_connection::placeholder(self.size, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::testing::{Output, StaticScreen};
    use chrono::NaiveDate;
    use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn main_mode(screens: Vec<Arc<dyn Screen>>, factory: Option<SpecialFactory>) -> MainMode {
        MainMode::new(
            screens,
            PanelSize::P64x64,
            Duration::from_secs(5),
            Duration::from_secs(10),
            SpecialWindow::default(),
            factory,
        )
    }

    fn color(frame: &Frame) -> Option<Rgb888> {
        frame.pixel(0, 0)
    }

    #[test]
    fn test_window_contains() {
        let w = SpecialWindow::default();
        assert!(w.contains(at(11, 11)));
        assert!(w.contains(at(23, 11)));
        assert!(!w.contains(at(11, 12)));
        assert!(!w.contains(at(12, 11)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_advance_after_dwell() {
        let screens: Vec<Arc<dyn Screen>> = vec![
            StaticScreen::new("red", Output::Solid(Rgb888::RED)),
            StaticScreen::new("green", Output::Solid(Rgb888::GREEN)),
        ];
        let mut m = main_mode(screens, None);

        assert_eq!(color(&m.image(at(9, 0))), Some(Rgb888::RED));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(color(&m.image(at(9, 0))), Some(Rgb888::RED));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(color(&m.image(at(9, 0))), Some(Rgb888::GREEN));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(color(&m.image(at(9, 0))), Some(Rgb888::RED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_rotation_holds_longer() {
        let screens: Vec<Arc<dyn Screen>> = vec![
            StaticScreen::new("red", Output::Solid(Rgb888::RED)),
            StaticScreen::new("green", Output::Solid(Rgb888::GREEN)),
            StaticScreen::new("blue", Output::Solid(Rgb888::BLUE)),
        ];
        let mut m = main_mode(screens, None);

        m.handle_ccw();
        assert_eq!(color(&m.image(at(9, 0))), Some(Rgb888::BLUE));
        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(color(&m.image(at(9, 0))), Some(Rgb888::BLUE));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(color(&m.image(at(9, 0))), Some(Rgb888::RED));
        assert_eq!(m.handle_push(), Some(ModeKind::Menu));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_and_unready_screens_are_skipped() {
        let screens: Vec<Arc<dyn Screen>> = vec![
            StaticScreen::new("broken", Output::Fails),
            StaticScreen::new("loading", Output::Nothing),
            StaticScreen::new("green", Output::Solid(Rgb888::GREEN)),
        ];
        let mut m = main_mode(screens, None);
        assert_eq!(color(&m.image(at(9, 0))), Some(Rgb888::GREEN));
        assert_eq!(m.index(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_disabled_shows_placeholder_then_resumes() {
        let red = StaticScreen::new("red", Output::Solid(Rgb888::RED));
        let green = StaticScreen::new("green", Output::Solid(Rgb888::GREEN));
        let screens: Vec<Arc<dyn Screen>> = vec![red.clone(), green.clone()];
        let mut m = main_mode(screens, None);

        red.set_enabled(false);
        green.set_enabled(false);
        let now = at(9, 0);
        assert_eq!(m.image(now), no_connection::placeholder(PanelSize::P64x64, now));

        green.set_enabled(true);
        assert_eq!(color(&m.image(now)), Some(Rgb888::GREEN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_special_window_creates_one_screen() {
        let made = Arc::new(AtomicUsize::new(0));
        let counter = made.clone();
        let factory: SpecialFactory = Box::new(move || -> Box<dyn Screen> {
            counter.fetch_add(1, Ordering::SeqCst);
            StaticScreen::boxed("special", Output::Solid(Rgb888::BLUE))
        });
        let screens: Vec<Arc<dyn Screen>> = vec![
            StaticScreen::new("red", Output::Solid(Rgb888::RED)),
            StaticScreen::new("green", Output::Solid(Rgb888::GREEN)),
        ];
        let mut m = main_mode(screens, Some(factory));
        m.handle_cw();
        assert_eq!(color(&m.image(at(11, 10))), Some(Rgb888::GREEN));

        for _ in 0..20 {
            assert_eq!(color(&m.image(at(11, 11))), Some(Rgb888::BLUE));
            tokio::time::advance(Duration::from_secs(3)).await;
        }
        assert_eq!(made.load(Ordering::SeqCst), 1);
        assert!(m.special_active());

        // index survives the window
        assert_eq!(color(&m.image(at(11, 12))), Some(Rgb888::GREEN));
        assert!(!m.special_active());
        assert_eq!(m.specials_created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_without_factory_keeps_rotating() {
        let screens: Vec<Arc<dyn Screen>> = vec![StaticScreen::new("red", Output::Solid(Rgb888::RED))];
        let mut m = main_mode(screens, None);
        assert_eq!(color(&m.image(at(23, 11))), Some(Rgb888::RED));
        assert!(!m.special_active());
    }
}
