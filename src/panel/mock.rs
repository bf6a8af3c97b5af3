/*
 *  panel/mock.rs
 *
 *  LyMatrix - pixel panel dashboard
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock panel for tests and headless runs
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::frame::{Frame, PanelSize};
use crate::panel::error::PanelError;
use crate::panel::{Panel, PanelCapabilities};

/// Panel that only records what it was asked to do.
///
/// The state is shared so a test can keep a handle after the panel has been
/// moved into a [`SharedPanel`](crate::panel::SharedPanel).
#[derive(Debug, Clone)]
pub struct MockPanel {
    capabilities: PanelCapabilities,
    state: Arc<Mutex<MockPanelState>>,
}

/// Internal state for the mock panel (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockPanelState {
    pub frames_written: usize,
    pub clear_count: usize,
    pub last_brightness: Option<u8>,
    /// Copy of the most recent frame
    pub last_frame: Option<Frame>,
    /// Simulate failures (for error testing)
    pub simulate_write_failure: bool,
}

impl MockPanel {
    pub fn new(size: PanelSize) -> Self {
        let capabilities = PanelCapabilities {
            size,
            max_fps: 60,
            supports_brightness: true,
        };
        Self {
            capabilities,
            state: Arc::new(Mutex::new(MockPanelState::default())),
        }
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockPanelState>> {
        Arc::clone(&self.state)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockPanelState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl Panel for MockPanel {
    fn capabilities(&self) -> &PanelCapabilities {
        &self.capabilities
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), PanelError> {
        debug!("mock panel brightness {}%", percent);
        self.with_state(|s| s.last_brightness = Some(percent));
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), PanelError> {
        self.with_state(|s| {
            if s.simulate_write_failure {
                return Err(PanelError::Io("simulated write failure".to_string()));
            }
            s.frames_written += 1;
            s.last_frame = Some(frame.clone());
            Ok(())
        })
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        let size = self.capabilities.size;
        self.with_state(|s| {
            s.clear_count += 1;
            s.last_frame = Some(Frame::new(size));
        });
        Ok(())
    }
}
