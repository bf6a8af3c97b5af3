/*
 *  modes/network.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Network details and remote QR code
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

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};

use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{debug, error, warn};
use tokio::process::Command;

use super::ModeKind;
use crate::draw::{self, colors, FONT, SMALL_FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;

const WIFI_IFACE: &str = "wlan0";
// 4x6 glyphs across 64 columns
const MAX_CHARS: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ssid: Option<String>,
    pub ip: Option<IpAddr>,
}

impl NetworkInfo {
    /// Ask `iw` for the SSID and the OS for the primary address.
    pub async fn probe() -> Self {
        let ssid = match Command::new("iw").args(["dev", WIFI_IFACE, "link"]).output().await {
            Ok(out) if out.status.success() => parse_ssid(&String::from_utf8_lossy(&out.stdout)),
            Ok(out) => {
                debug!("iw exited with {}", out.status);
                None
            }
            Err(e) => {
                debug!("iw unavailable: {}", e);
                None
            }
        };
        let ip = match local_ip_address::local_ip() {
            Ok(ip) => Some(ip),
            Err(e) => {
                warn!("no local ip address: {}", e);
                None
            }
        };
        Self { ssid, ip }
    }
}

/// `iw dev <if> link` output -> SSID.
pub fn parse_ssid(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|l| l.trim().strip_prefix("SSID: "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub struct NetworkMode {
    info: Arc<Mutex<NetworkInfo>>,
    port: u16,
    show_qr: bool,
    size: PanelSize,
}

impl NetworkMode {
    /// Starts a probe when a runtime is available.
    pub fn new(size: PanelSize, port: u16) -> Self {
        let mode = Self::with_info(size, port, NetworkInfo::default());
        mode.refresh();
        mode
    }

    pub fn with_info(size: PanelSize, port: u16, info: NetworkInfo) -> Self {
        Self {
            info: Arc::new(Mutex::new(info)),
            port,
            show_qr: false,
            size,
        }
    }

    /// Re-read SSID and address in the background.
    pub fn refresh(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("network info not refreshed: no runtime");
            return;
        };
        let slot = self.info.clone();
        handle.spawn(async move {
            let info = NetworkInfo::probe().await;
            debug!("network info {:?}", info);
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = info;
        });
    }

    pub fn info(&self) -> NetworkInfo {
        self.info.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn showing_qr(&self) -> bool {
        self.show_qr
    }

    /// Address of the remote control page, when we know our IP.
    pub fn url(&self) -> Option<String> {
        self.info().ip.map(|ip| format!("http://{}/", SocketAddr::new(ip, self.port)))
    }

    pub fn handle_push(&mut self) -> Option<ModeKind> {
        Some(ModeKind::Main)
    }

    pub fn handle_cw(&mut self) -> Option<ModeKind> {
        self.show_qr = !self.show_qr;
        None
    }

    pub fn handle_ccw(&mut self) -> Option<ModeKind> {
        self.handle_cw()
    }

    pub fn image(&self) -> Frame {
        let drawn = if self.show_qr { self.draw_qr() } else { self.draw_text() };
        drawn.unwrap_or_else(|e| {
            error!("network render failed: {}", e);
            Frame::new(self.size)
        })
    }

    fn draw_text(&self) -> Result<Frame, RenderError> {
        let mut frame = Frame::new(self.size);
        let info = self.info();
        let ssid: String = info.ssid.as_deref().unwrap_or("not connected").chars().take(MAX_CHARS).collect();
        let ip = info.ip.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());

        let top = if self.size.is_short() {
            0
        } else {
            draw::draw_header(&mut frame, "Network Info", colors::GREY)?;
            12
        };
        let pitch = if self.size.is_short() { 8 } else { 10 };
        draw::draw_text(&mut frame, "SSID", 1, top, FONT, colors::GREY)?;
        draw::draw_text(&mut frame, &ssid, 1, top + pitch, SMALL_FONT, colors::WHITE)?;
        draw::draw_text(&mut frame, "IP Address", 1, top + 2 * pitch, FONT, colors::GREY)?;
        draw::draw_text(&mut frame, &ip, 1, top + 3 * pitch, SMALL_FONT, colors::WHITE)?;
        Ok(frame)
    }

    fn draw_qr(&self) -> Result<Frame, RenderError> {
        let mut frame = Frame::new(self.size);
        let drawn = match self.url() {
            Some(url) => {
                let area = Rectangle::new(Point::zero(), self.size.size());
                draw::draw_qr(&mut frame, &url, area, colors::BLACK, colors::QR_LIGHT)?
            }
            None => None,
        };
        if drawn.is_none() {
            draw::draw_text(&mut frame, "no address", 2, 2, FONT, colors::LIGHT_GREY)?;
        }
        Ok(frame)
    }
}
