/*
 *  app.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Render loop, input handoff and frame sinks
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

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::frame::Frame;
use crate::modes::{
    BrightnessMode, MainMode, MenuMode, Mode, ModeKind, ModeTable, NetworkMode, OffMode, ScreensMode,
    SpecialFactory, SpecialWindow,
};
use crate::pages::no_connection;
use crate::panel::{PanelError, SharedPanel};
use crate::screen::Screen;

/// Rotary encoder and button events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Clockwise,
    CounterClockwise,
    Press,
}

/// Cheap, cloneable way to feed the render loop. Safe to call from GPIO
/// interrupt threads and HTTP handlers; never blocks.
#[derive(Debug, Clone)]
pub struct InputHandle {
    tx: mpsc::UnboundedSender<InputEvent>,
}

impl InputHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InputEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// False once the render loop has gone away.
    pub fn send(&self, event: InputEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                debug!("input {:?} dropped, render loop stopped", event);
                false
            }
        }
    }

    pub fn clockwise(&self) -> bool {
        self.send(InputEvent::Clockwise)
    }

    pub fn counter_clockwise(&self) -> bool {
        self.send(InputEvent::CounterClockwise)
    }

    pub fn press(&self) -> bool {
        self.send(InputEvent::Press)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("panel: {0}")]
    Panel(#[from] PanelError),
    #[error("encode: {0}")]
    Encode(String),
}

/// Somewhere finished frames go.
pub trait FrameSink: Send {
    fn name(&self) -> &str;

    fn present(&mut self, frame: &Frame) -> Result<(), SinkError>;

    fn clear(&mut self) -> Result<(), SinkError>;
}

pub struct PanelSink(pub SharedPanel);

impl FrameSink for PanelSink {
    fn name(&self) -> &str {
        "panel"
    }

    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        Ok(self.0.write_frame(frame)?)
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        Ok(self.0.clear()?)
    }
}

#[derive(Debug, Default)]
pub struct LoopStats {
    renders: AtomicU64,
    dispatched: AtomicU64,
    events: AtomicU64,
}

impl LoopStats {
    /// Frames produced by the active mode.
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    /// Frames that differed from the previous one and went to the sinks.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

/// Every mode wired up from config. Network is only added when the menu
/// lists it.
pub fn build_mode_table(
    cfg: &Config,
    screens: Vec<Arc<dyn Screen>>,
    special: Option<SpecialFactory>,
    panel: SharedPanel,
) -> ModeTable {
    let size = cfg.panel_size();
    let window = SpecialWindow { minute: cfg.special_minute(), hours: cfg.special_hours() };
    let main = MainMode::new(screens.clone(), size, cfg.dwell(), cfg.manual_dwell(), window, special);

    let mut table = ModeTable::new(main)
        .with(Mode::Menu(MenuMode::new(size, cfg.menu_network())))
        .with(Mode::Off(OffMode::new(size)))
        .with(Mode::Brightness(BrightnessMode::new(panel, cfg.brightness(), size)))
        .with(Mode::Screens(ScreensMode::new(screens, size)));
    if cfg.menu_network() {
        table = table.with(Mode::Network(NetworkMode::new(size, cfg.remote_port())));
    }
    table
}

pub struct App {
    modes: ModeTable,
    sinks: Vec<Box<dyn FrameSink>>,
    input: InputHandle,
    input_rx: mpsc::UnboundedReceiver<InputEvent>,
    frame_period: Duration,
    clock: Box<dyn Fn() -> NaiveDateTime + Send>,
    stats: Arc<LoopStats>,
}

impl App {
    pub fn new(modes: ModeTable, frame_period: Duration) -> Self {
        let (input, input_rx) = InputHandle::channel();
        Self {
            modes,
            sinks: Vec::new(),
            input,
            input_rx,
            frame_period,
            clock: Box::new(crate::pages::now),
            stats: Arc::new(LoopStats::default()),
        }
    }

    pub fn with_sink(mut self, sink: impl FrameSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Replace the wall clock handed to the modes.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn input(&self) -> InputHandle {
        self.input.clone()
    }

    pub fn stats(&self) -> Arc<LoopStats> {
        self.stats.clone()
    }

    pub fn active_mode(&self) -> ModeKind {
        self.modes.active()
    }

    fn handle(&mut self, event: InputEvent) {
        self.stats.events.fetch_add(1, Ordering::Relaxed);
        debug!("input {:?} in {}", event, self.modes.active());
        self.modes.apply(event);
    }

    fn dispatch(&mut self, frame: &Frame) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.present(frame) {
                warn!("{} sink: {}", sink.name(), e);
            }
        }
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Render, dispatch on change, then wait for input, shutdown or the
    /// next frame. Sinks are cleared on the way out.
    /// One tick of the active mode. A panicking page costs a frame, not
    /// the loop.
    fn render(&mut self, now: NaiveDateTime) -> Frame {
        let modes = &mut self.modes;
        match panic::catch_unwind(AssertUnwindSafe(|| modes.image(now))) {
            Ok(frame) => frame,
            Err(_) => {
                error!("{} mode panicked while rendering", self.modes.active());
                no_connection::placeholder(self.modes.size(), now)
            }
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "render loop started: {:?} per frame, {} sink(s)",
            self.frame_period,
            self.sinks.len()
        );
        let mut last_sent: Option<Frame> = None;

        loop {
            let frame = self.render((self.clock)());
            self.stats.renders.fetch_add(1, Ordering::Relaxed);
            if last_sent.as_ref() != Some(&frame) {
                self.dispatch(&frame);
                last_sent = Some(frame);
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(event) = self.input_rx.recv() => {
                    self.handle(event);
                    while let Ok(event) = self.input_rx.try_recv() {
                        self.handle(event);
                    }
                }
                _ = tokio::time::sleep(self.frame_period) => {}
            }
        }

        info!(
            "render loop stopped after {} renders, clearing {} sink(s)",
            self.stats.renders(),
            self.sinks.len()
        );
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.clear() {
                warn!("{} sink clear: {}", sink.name(), e);
            }
        }
    }
}
