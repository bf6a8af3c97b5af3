/*
 *  hardware.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	GPIO rotary encoder and push button (Raspberry Pi)
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

use std::time::{Duration, Instant};

use log::{debug, info};
use rppal::gpio::{Gpio, InputPin, Level, Trigger};
use thiserror::Error;

use crate::app::InputHandle;
use crate::config::HardwareConfig;

// fast spins put detents only a few ms apart
const DIAL_BOUNCE: Duration = Duration::from_millis(3);
const BUTTON_BOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("gpio: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// Drops edges that land within `window` of the last accepted one.
#[derive(Debug)]
struct Debounce {
    window: Duration,
    last: Option<Instant>,
}

impl Debounce {
    fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(t) if now.duration_since(t) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Holds the interrupt pins; dropping it stops input.
pub struct Encoder {
    _a: InputPin,
    _button: InputPin,
}

impl Encoder {
    /// A falling edge on A with B high is a clockwise step. The button is
    /// active low.
    pub fn start(cfg: &HardwareConfig, input: InputHandle) -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;
        let mut a = gpio.get(cfg.encoder_a)?.into_input_pullup();
        let b = gpio.get(cfg.encoder_b)?.into_input_pullup();
        let mut button = gpio.get(cfg.button)?.into_input_pullup();

        let dial = input.clone();
        let mut dial_bounce = Debounce::new(DIAL_BOUNCE);
        a.set_async_interrupt(Trigger::FallingEdge, move |_: Level| {
            if !dial_bounce.accept(Instant::now()) {
                return;
            }
            if b.read() == Level::High {
                dial.clockwise();
            } else {
                dial.counter_clockwise();
            }
        })?;

        let mut press_bounce = Debounce::new(BUTTON_BOUNCE);
        button.set_async_interrupt(Trigger::FallingEdge, move |_: Level| {
            if press_bounce.accept(Instant::now()) {
                debug!("button pressed");
                input.press();
            }
        })?;

        info!(
            "encoder on gpio {}/{}, button on gpio {}",
            cfg.encoder_a, cfg.encoder_b, cfg.button
        );
        Ok(Self { _a: a, _button: button })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_window() {
        let mut d = Debounce::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(d.accept(t0));
        assert!(!d.accept(t0 + Duration::from_millis(40)));
        assert!(d.accept(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn test_fast_spin_keeps_every_detent() {
        let mut dial = Debounce::new(DIAL_BOUNCE);
        let t0 = Instant::now();
        // ten detents 8 ms apart, each with a contact bounce 1 ms later
        let mut steps = 0;
        for i in 0..10u64 {
            let edge = t0 + Duration::from_millis(8 * i);
            steps += dial.accept(edge) as u32;
            steps += dial.accept(edge + Duration::from_millis(1)) as u32;
        }
        assert_eq!(steps, 10);

        let mut button = Debounce::new(BUTTON_BOUNCE);
        assert!(button.accept(t0));
        assert!(!button.accept(t0 + Duration::from_millis(30)));
    }
}
