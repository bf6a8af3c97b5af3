/*
 *  panel/error.rs
 *
 *  LyMatrix - pixel panel dashboard
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error type for the panel subsystem
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

use thiserror::Error;

use crate::frame::PanelSize;

#[derive(Debug, Error)]
pub enum PanelError {
    /// Frame geometry does not match the panel
    #[error("frame size mismatch: panel is {expected}, frame is {actual}")]
    SizeMismatch { expected: PanelSize, actual: PanelSize },

    #[error("brightness {0} out of range (0-100)")]
    InvalidBrightness(u8),

    #[error("panel lock poisoned")]
    Poisoned,

    /// Driver or bus failure
    #[error("panel I/O error: {0}")]
    Io(String),
}
