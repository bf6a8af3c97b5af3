/*
 *  pages/bluebikes.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Bike-share dock availability (GBFS)
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

use chrono::NaiveDateTime;
use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use log::debug;
use mini_moka::sync::Cache;
use reqwest::Client;
use serde::Deserialize;

use crate::config::{BlueBikesConfig, StationConfig};
use crate::draw::{self, colors, FONT, SMALL_FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;
use crate::source::{Fetch, FetchError};

pub const NAME: &str = "bluebikes";
pub const TTL: Duration = Duration::from_secs(60);

const INFO_URL: &str = "https://gbfs.lyft.com/gbfs/1.1/bos/en/station_information.json";
const STATUS_URL: &str = "https://gbfs.lyft.com/gbfs/1.1/bos/en/station_status.json";

// station ids almost never change; no need to pull the big feed every minute
const GUID_TTL: Duration = Duration::from_secs(6 * 3600);

const TITLE_COLOR: Rgb888 = Rgb888::new(0x2c, 0xa3, 0xe1);
const BIKE_COLOR: Rgb888 = TITLE_COLOR;
const EBIKE_COLOR: Rgb888 = Rgb888::new(0xb6, 0xd3, 0xd4);
const DOCK_COLOR: Rgb888 = Rgb888::new(0x42, 0x54, 0xf5);

#[derive(Debug, Deserialize)]
struct Feed<T> {
    data: FeedData<T>,
}

#[derive(Debug, Deserialize)]
struct FeedData<T> {
    stations: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StationInformation {
    station_id: String,
    short_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationStatus {
    pub station_id: String,
    pub num_bikes_available: u32,
    #[serde(default)]
    pub num_ebikes_available: u32,
    pub num_docks_available: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub bikes: u32,
    pub ebikes: u32,
    pub docks: u32,
}

/// One configured station; `counts` is `None` when it could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationReading {
    pub label: String,
    pub counts: Option<Counts>,
}

pub struct BlueBikesFetch {
    client: Client,
    stations: Vec<StationConfig>,
    guids: Arc<Cache<String, String>>,
}

impl BlueBikesFetch {
    pub fn new(client: Client, cfg: &BlueBikesConfig) -> Self {
        let guids = Cache::builder().max_capacity(256).time_to_live(GUID_TTL).build();
        Self {
            client,
            stations: cfg.stations.clone(),
            guids: Arc::new(guids),
        }
    }

    async fn get_feed<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, FetchError> {
        let feed = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Feed<T>>()
            .await?;
        Ok(feed.data.stations)
    }

    async fn refresh_guids(&self) -> Result<(), FetchError> {
        let info = self.get_feed::<StationInformation>(INFO_URL).await?;
        for s in info {
            if let Some(short) = s.short_name {
                if self.stations.iter().any(|c| c.id == short) {
                    self.guids.insert(short, s.station_id);
                }
            }
        }
        debug!("bluebikes: {} station ids cached", self.guids.entry_count());
        Ok(())
    }
}

impl Fetch for BlueBikesFetch {
    type Data = Vec<StationReading>;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        let cached = self.stations.iter().all(|s| self.guids.contains_key(&s.id));
        let status: Vec<StationStatus> = if cached {
            self.get_feed::<StationStatus>(STATUS_URL).await?
        } else {
            let (info, status) = tokio::join!(self.refresh_guids(), self.get_feed::<StationStatus>(STATUS_URL));
            info?;
            status?
        };
        Ok(resolve(&self.stations, |id| self.guids.get(&id.to_string()), &status))
    }

    fn fallback(&self) -> Self::Data {
        self.stations
            .iter()
            .map(|s| StationReading { label: s.label.clone(), counts: None })
            .collect()
    }
}

/// Configured short id -> GBFS guid -> status, in configured order.
fn resolve(
    stations: &[StationConfig],
    guid_for: impl Fn(&str) -> Option<String>,
    status: &[StationStatus],
) -> Vec<StationReading> {
    stations
        .iter()
        .map(|s| {
            let counts = guid_for(&s.id)
                .and_then(|guid| status.iter().find(|st| st.station_id == guid))
                .map(|st| Counts {
                    bikes: st.num_bikes_available,
                    ebikes: st.num_ebikes_available,
                    docks: st.num_docks_available,
                });
            StationReading { label: s.label.clone(), counts }
        })
        .collect()
}

pub fn render(data: &Vec<StationReading>, size: PanelSize) -> Result<Option<Frame>, RenderError> {
    draw_bluebikes(data, size, super::now()).map(Some)
}

pub fn draw_bluebikes(
    stations: &[StationReading],
    size: PanelSize,
    now: NaiveDateTime,
) -> Result<Frame, RenderError> {
    let mut frame = Frame::new(size);

    // the short panel drops the header and packs rows tighter
    let (top, pitch, label_font) = if size.is_short() {
        (1, 16, SMALL_FONT)
    } else {
        draw::draw_text(&mut frame, "Bikes", 1, 1, FONT, TITLE_COLOR)?;
        draw::draw_text_right(&mut frame, &now.format("%H:%M").to_string(), 64, 1, FONT, TITLE_COLOR)?;
        (10, 18, FONT)
    };

    for (i, st) in stations.iter().enumerate() {
        let y = top + pitch * i as i32;
        if y >= size.height() as i32 {
            break;
        }
        draw::draw_text(&mut frame, &st.label, 1, y, label_font, colors::GREY)?;

        let fmt = |n: Option<u32>| n.map_or_else(|| "??".to_string(), |n| format!("{:0>2}", n));
        let counts = st.counts;
        let row = y + 8;
        draw_bike(&mut frame, Point::new(1, row), BIKE_COLOR)?;
        draw::draw_text(&mut frame, &fmt(counts.map(|c| c.bikes)), 12, row + 1, FONT, BIKE_COLOR)?;
        draw_bike(&mut frame, Point::new(23, row), EBIKE_COLOR)?;
        draw::draw_text(&mut frame, &fmt(counts.map(|c| c.ebikes)), 33, row + 1, FONT, EBIKE_COLOR)?;
        draw_dock(&mut frame, Point::new(45, row))?;
        draw::draw_text(&mut frame, &fmt(counts.map(|c| c.docks)), 53, row + 1, FONT, DOCK_COLOR)?;
    }
    Ok(frame)
}

/// 9x7 bicycle glyph.
fn draw_bike(frame: &mut Frame, at: Point, color: Rgb888) -> Result<(), RenderError> {
    let p = |x, y| at + Point::new(x, y);
    draw::draw_rectangle(frame, p(0, 3), p(2, 5), None, Some(color))?;
    draw::draw_rectangle(frame, p(6, 3), p(8, 5), None, Some(color))?;
    draw::draw_polyline(frame, &[p(1, 4), p(3, 1), p(6, 1), p(7, 4)], color)?;
    draw::draw_line(frame, p(3, 1), p(4, 4), color)?;
    Ok(())
}

/// 7x7 "P" sign.
fn draw_dock(frame: &mut Frame, at: Point) -> Result<(), RenderError> {
    let p = |x, y| at + Point::new(x, y);
    draw::draw_rectangle(frame, p(0, 0), p(6, 6), Some(DOCK_COLOR), None)?;
    draw::draw_line(frame, p(2, 1), p(2, 5), colors::WHITE)?;
    draw::draw_polyline(frame, &[p(2, 1), p(4, 1), p(4, 3), p(2, 3)], colors::WHITE)?;
    Ok(())
}
