/*
 *  modes/mod.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Interaction modes and the table that owns them
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

pub mod brightness;
pub mod main;
pub mod menu;
pub mod network;
pub mod off;
pub mod screens;

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use log::{info, warn};

pub use brightness::BrightnessMode;
pub use main::{MainMode, SpecialFactory, SpecialWindow};
pub use menu::MenuMode;
pub use network::{NetworkInfo, NetworkMode};
pub use off::OffMode;
pub use screens::ScreensMode;

use crate::app::InputEvent;
use crate::frame::{Frame, PanelSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Main,
    Menu,
    Off,
    Brightness,
    Network,
    Screens,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModeKind::Main => "main",
            ModeKind::Menu => "menu",
            ModeKind::Off => "off",
            ModeKind::Brightness => "brightness",
            ModeKind::Network => "network",
            ModeKind::Screens => "screens",
        };
        f.write_str(s)
    }
}

/// One interaction mode with its local state.
///
/// Handlers return the mode to switch to, if any.
pub enum Mode {
    Main(MainMode),
    Menu(MenuMode),
    Off(OffMode),
    Brightness(BrightnessMode),
    Network(NetworkMode),
    Screens(ScreensMode),
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Main(_) => ModeKind::Main,
            Mode::Menu(_) => ModeKind::Menu,
            Mode::Off(_) => ModeKind::Off,
            Mode::Brightness(_) => ModeKind::Brightness,
            Mode::Network(_) => ModeKind::Network,
            Mode::Screens(_) => ModeKind::Screens,
        }
    }

    pub fn handle_push(&mut self) -> Option<ModeKind> {
        match self {
            Mode::Main(m) => m.handle_push(),
            Mode::Menu(m) => m.handle_push(),
            Mode::Off(m) => m.handle_push(),
            Mode::Brightness(m) => m.handle_push(),
            Mode::Network(m) => m.handle_push(),
            Mode::Screens(m) => m.handle_push(),
        }
    }

    pub fn handle_cw(&mut self) -> Option<ModeKind> {
        match self {
            Mode::Main(m) => m.handle_cw(),
            Mode::Menu(m) => m.handle_cw(),
            Mode::Off(m) => m.handle_cw(),
            Mode::Brightness(m) => m.handle_cw(),
            Mode::Network(m) => m.handle_cw(),
            Mode::Screens(m) => m.handle_cw(),
        }
    }

    pub fn handle_ccw(&mut self) -> Option<ModeKind> {
        match self {
            Mode::Main(m) => m.handle_ccw(),
            Mode::Menu(m) => m.handle_ccw(),
            Mode::Off(m) => m.handle_ccw(),
            Mode::Brightness(m) => m.handle_ccw(),
            Mode::Network(m) => m.handle_ccw(),
            Mode::Screens(m) => m.handle_ccw(),
        }
    }

    /// Called each time the mode becomes active.
    pub fn on_enter(&mut self) {
        if let Mode::Network(m) = self {
            m.refresh();
        }
    }

    pub fn image(&mut self, now: NaiveDateTime) -> Frame {
        match self {
            Mode::Main(m) => m.image(now),
            Mode::Menu(m) => m.image(),
            Mode::Off(m) => m.image(),
            Mode::Brightness(m) => m.image(),
            Mode::Network(m) => m.image(),
            Mode::Screens(m) => m.image(),
        }
    }
}

/// Every mode plus which one is active. Owned by the render loop.
pub struct ModeTable {
    modes: HashMap<ModeKind, Mode>,
    active: ModeKind,
    size: PanelSize,
}

impl ModeTable {
    /// Starts in Main.
    pub fn new(main: MainMode) -> Self {
        let size = main.size();
        let mut modes = HashMap::new();
        modes.insert(ModeKind::Main, Mode::Main(main));
        Self { modes, active: ModeKind::Main, size }
    }

    pub fn with(mut self, mode: Mode) -> Self {
        self.modes.insert(mode.kind(), mode);
        self
    }

    pub fn active(&self) -> ModeKind {
        self.active
    }

    pub fn size(&self) -> PanelSize {
        self.size
    }

    pub fn get(&self, kind: ModeKind) -> Option<&Mode> {
        self.modes.get(&kind)
    }

    pub fn get_mut(&mut self, kind: ModeKind) -> Option<&mut Mode> {
        self.modes.get_mut(&kind)
    }

    /// Make `kind` active. Unknown modes are refused and logged.
    pub fn switch_to(&mut self, kind: ModeKind) -> bool {
        if kind == self.active {
            return true;
        }
        let Some(mode) = self.modes.get_mut(&kind) else {
            warn!("mode {} is not available", kind);
            return false;
        };
        mode.on_enter();
        info!("mode {} -> {}", self.active, kind);
        self.active = kind;
        true
    }

    /// Route one input event to the active mode. Returns the new mode when
    /// the event caused a switch.
    pub fn apply(&mut self, event: InputEvent) -> Option<ModeKind> {
        let mode = self.modes.get_mut(&self.active)?;
        let next = match event {
            InputEvent::Clockwise => mode.handle_cw(),
            InputEvent::CounterClockwise => mode.handle_ccw(),
            InputEvent::Press => mode.handle_push(),
        }?;
        (next != self.active && self.switch_to(next)).then_some(next)
    }

    pub fn image(&mut self, now: NaiveDateTime) -> Frame {
        if let Some(Mode::Main(main)) = self.modes.get_mut(&ModeKind::Main) {
            main.expire_special(now);
        }
        match self.modes.get_mut(&self.active) {
            Some(mode) => mode.image(now),
            None => Frame::new(self.size),
        }
    }
}

/// First row to draw so `cursor` stays inside a window of `visible` rows.
pub(crate) fn scroll_start(cursor: usize, visible: usize) -> usize {
    if visible == 0 {
        return cursor;
    }
    (cursor + 1).saturating_sub(visible)
}


#[cfg(test)]
mod tests {
    use super::testing::{Output, StaticScreen};
    use super::*;
    use crate::screen::Screen;
    use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
    use std::sync::Arc;
    use std::time::Duration;

    fn table() -> ModeTable {
        table_with_special(None)
    }

    fn table_with_special(factory: Option<SpecialFactory>) -> ModeTable {
        let screens: Vec<Arc<dyn Screen>> = vec![StaticScreen::new("red", Output::Solid(Rgb888::RED))];
        let main = MainMode::new(
            screens.clone(),
            PanelSize::P64x64,
            Duration::from_secs(5),
            Duration::from_secs(10),
            SpecialWindow::default(),
            factory,
        );
        ModeTable::new(main)
            .with(Mode::Menu(MenuMode::new(PanelSize::P64x64, false)))
            .with(Mode::Off(OffMode::new(PanelSize::P64x64)))
            .with(Mode::Screens(ScreensMode::new(screens, PanelSize::P64x64)))
    }

    #[test]
    fn test_scroll_start() {
        assert_eq!(scroll_start(0, 4), 0);
        assert_eq!(scroll_start(3, 4), 0);
        assert_eq!(scroll_start(4, 4), 1);
        assert_eq!(scroll_start(9, 2), 8);
    }

    #[tokio::test]
    async fn test_push_walks_main_menu_off_main() {
        let mut t = table();
        assert_eq!(t.active(), ModeKind::Main);
        assert_eq!(t.apply(InputEvent::Press), Some(ModeKind::Menu));
        // Screen Off is second
        assert_eq!(t.apply(InputEvent::Clockwise), None);
        assert_eq!(t.apply(InputEvent::Press), Some(ModeKind::Off));
        assert!(t.image(crate::pages::now()).is_blank());
        assert_eq!(t.apply(InputEvent::Clockwise), None);
        assert_eq!(t.active(), ModeKind::Off);
        assert_eq!(t.apply(InputEvent::Press), Some(ModeKind::Main));
    }

    #[tokio::test(start_paused = true)]
    async fn test_special_expires_while_another_mode_is_active() {
        use chrono::NaiveDate;

        let at = |h, m| NaiveDate::from_ymd_opt(2024, 9, 2).unwrap().and_hms_opt(h, m, 0).unwrap();
        let special_active = |t: &ModeTable| match t.get(ModeKind::Main) {
            Some(Mode::Main(m)) => m.special_active(),
            _ => false,
        };
        let factory: SpecialFactory =
            Box::new(|| -> Box<dyn Screen> { StaticScreen::boxed("special", Output::Solid(Rgb888::BLUE)) });
        let mut t = table_with_special(Some(factory));

        assert_eq!(t.image(at(11, 11)).pixel(0, 0), Some(Rgb888::BLUE));
        assert!(special_active(&t));

        // Main -> Menu -> Off while the window is still open
        t.apply(InputEvent::Press);
        t.apply(InputEvent::Clockwise);
        assert_eq!(t.apply(InputEvent::Press), Some(ModeKind::Off));
        t.image(at(11, 11));
        assert!(special_active(&t));

        assert!(t.image(at(12, 30)).is_blank());
        assert!(!special_active(&t));
    }

    #[tokio::test]
    async fn test_missing_mode_is_refused() {
        let mut t = table();
        assert!(!t.switch_to(ModeKind::Network));
        assert_eq!(t.active(), ModeKind::Main);
    }
}
