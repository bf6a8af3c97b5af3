/*
 *  panel/mod.rs
 *
 *  LyMatrix - pixel panel dashboard
 *  (c) 2020-26 Stuart Hunter
 *
 *  Physical panel abstraction
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

pub mod error;
pub mod mock;

use std::sync::{Arc, Mutex, MutexGuard};

pub use error::PanelError;
pub use mock::{MockPanel, MockPanelState};

use crate::frame::{Frame, PanelSize};

/// Panel capabilities and metadata
#[derive(Debug, Clone)]
pub struct PanelCapabilities {
    pub size: PanelSize,

    /// Maximum recommended frame rate
    pub max_fps: u32,

    pub supports_brightness: bool,
}

/// Minimal hardware abstraction every LED matrix driver implements.
///
/// Brightness is a percentage. Drivers map it onto whatever their hardware
/// accepts.
pub trait Panel: Send {
    fn capabilities(&self) -> &PanelCapabilities;

    fn size(&self) -> PanelSize {
        self.capabilities().size
    }

    /// Set brightness, 0-100 percent
    fn set_brightness(&mut self, percent: u8) -> Result<(), PanelError>;

    /// Push a whole frame to the panel
    fn write_frame(&mut self, frame: &Frame) -> Result<(), PanelError>;

    /// Blank the panel
    fn clear(&mut self) -> Result<(), PanelError>;
}

/// Panel handle shared between the render loop and the brightness mode.
#[derive(Clone)]
pub struct SharedPanel {
    inner: Arc<Mutex<Box<dyn Panel>>>,
}

impl SharedPanel {
    pub fn new(panel: impl Panel + 'static) -> Self {
        Self { inner: Arc::new(Mutex::new(Box::new(panel))) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn Panel>>, PanelError> {
        self.inner.lock().map_err(|_| PanelError::Poisoned)
    }

    pub fn size(&self) -> Result<PanelSize, PanelError> {
        Ok(self.lock()?.size())
    }

    pub fn set_brightness(&self, percent: u8) -> Result<(), PanelError> {
        if percent > 100 {
            return Err(PanelError::InvalidBrightness(percent));
        }
        self.lock()?.set_brightness(percent)
    }

    pub fn write_frame(&self, frame: &Frame) -> Result<(), PanelError> {
        let mut panel = self.lock()?;
        if frame.panel_size() != panel.size() {
            return Err(PanelError::SizeMismatch {
                expected: panel.size(),
                actual: frame.panel_size(),
            });
        }
        panel.write_frame(frame)
    }

    pub fn clear(&self) -> Result<(), PanelError> {
        self.lock()?.clear()
    }
}
