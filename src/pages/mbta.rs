/*
 *  pages/mbta.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Transit departures: realtime predictions with schedule fill-in
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

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Timelike};
use embedded_graphics::{pixelcolor::Rgb888, prelude::*, primitives::{Circle, PrimitiveStyle, Rectangle}};
use embedded_text::alignment::{HorizontalAlignment, VerticalAlignment};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use tokio::task::JoinSet;

use crate::config::{LineConfig, MbtaConfig};
use crate::draw::{self, colors, FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;
use crate::source::{Fetch, FetchError};

pub const NAME: &str = "mbta";
pub const TTL: Duration = Duration::from_secs(30);

const BASE_URL: &str = "https://api-v3.mbta.com";

/// Departures kept per line.
pub const PER_LINE: usize = 2;
/// Rows drawn on the tall panel.
pub const MAX_ROWS: usize = 6;
/// Waits at or beyond this are not worth showing.
const MAX_WAIT_MINUTES: i64 = 100;
/// Service day rolls over at 03:00.
const SERVICE_DAY_START_HOUR: u32 = 3;

const TITLE_COLOR: Rgb888 = colors::AMBER;
const SCHEDULED_COLOR: Rgb888 = colors::LIGHT_GREY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureKind {
    Prediction,
    Schedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub label: String,
    pub color: Rgb888,
    pub wait: chrono::Duration,
    pub kind: DepartureKind,
}

impl Departure {
    /// Scheduled trips are drawn grey to tell them apart from realtime.
    pub fn display_color(&self) -> Rgb888 {
        match self.kind {
            DepartureKind::Prediction => self.color,
            DepartureKind::Schedule => SCHEDULED_COLOR,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    data: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    attributes: Attributes,
    relationships: Relationships,
}

#[derive(Debug, Deserialize)]
struct Attributes {
    departure_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Relationships {
    trip: Related,
}

#[derive(Debug, Deserialize)]
struct Related {
    data: Option<RelatedId>,
}

#[derive(Debug, Deserialize)]
struct RelatedId {
    id: String,
}

impl Resource {
    fn trip_id(&self) -> Option<&str> {
        self.relationships.trip.data.as_ref().map(|d| d.id.as_str())
    }

    fn departure(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.attributes.departure_time.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("mbta: bad departure_time '{}': {}", raw, e);
                None
            }
        }
    }
}

fn usable_wait(departure: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> Option<chrono::Duration> {
    let wait = departure.signed_duration_since(now);
    (wait > chrono::Duration::zero() && wait < chrono::Duration::minutes(MAX_WAIT_MINUTES)).then_some(wait)
}

/// Realtime waits first; returns them with every realtime trip id seen.
fn take_predictions(
    items: &[Resource],
    now: DateTime<FixedOffset>,
) -> (Vec<(chrono::Duration, DepartureKind)>, HashSet<String>) {
    let mut waits = Vec::new();
    let mut realtime = HashSet::new();
    for item in items {
        if waits.len() >= PER_LINE {
            break;
        }
        let Some(departure) = item.departure() else { continue };
        if let Some(trip) = item.trip_id() {
            realtime.insert(trip.to_string());
        }
        if let Some(wait) = usable_wait(departure, now) {
            waits.push((wait, DepartureKind::Prediction));
        }
    }
    (waits, realtime)
}

/// Top up `waits` from the schedule, skipping trips already seen realtime.
fn fill_from_schedule(
    waits: &mut Vec<(chrono::Duration, DepartureKind)>,
    items: &[Resource],
    realtime: &HashSet<String>,
    now: DateTime<FixedOffset>,
) {
    for item in items {
        if waits.len() >= PER_LINE {
            break;
        }
        if item.trip_id().is_some_and(|t| realtime.contains(t)) {
            continue;
        }
        let Some(departure) = item.departure() else { continue };
        if let Some(wait) = usable_wait(departure, now) {
            waits.push((wait, DepartureKind::Schedule));
        }
    }
}

/// Service date and time-of-day filter for a wall-clock instant.
///
/// Between midnight and 03:00 the service day is still yesterday and the
/// hour counts on past 24, so 01:00 on 9/2 is "25:00" on 9/1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceWindow {
    pub date: NaiveDate,
    pub min_time: String,
    pub max_time: String,
}

pub fn service_window(wall: NaiveDateTime) -> ServiceWindow {
    let (date, hour) = if wall.hour() < SERVICE_DAY_START_HOUR {
        (wall.date().pred_opt().unwrap_or(wall.date()), wall.hour() + 24)
    } else {
        (wall.date(), wall.hour())
    };
    let minute = wall.minute();
    ServiceWindow {
        date,
        min_time: format!("{:02}:{:02}", hour, minute),
        max_time: format!("{:02}:{:02}", hour + 2, minute),
    }
}

#[derive(Clone)]
struct LineQuery {
    client: Client,
    api_key: Option<String>,
    line: LineConfig,
}

impl LineQuery {
    async fn get(&self, path: &str, extra: &[(&str, String)]) -> Result<Vec<Resource>, FetchError> {
        let mut params = vec![
            ("filter[stop]", self.line.stop.clone()),
            ("filter[route]", self.line.route.clone()),
            ("filter[direction_id]", self.line.direction.to_string()),
            ("include", "stop".to_string()),
            ("sort", "arrival_time".to_string()),
            ("page[limit]", "3".to_string()),
        ];
        params.extend(extra.iter().map(|(k, v)| (*k, v.clone())));
        if let Some(key) = self.api_key.as_ref() {
            params.push(("api_key", key.clone()));
        }
        let doc = self
            .client
            .get(format!("{}/{}", BASE_URL, path))
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<Document>()
            .await?;
        Ok(doc.data)
    }

    async fn waits(&self) -> Result<Vec<Departure>, FetchError> {
        let predictions = self.get("predictions", &[]).await?;
        let now = Local::now().fixed_offset();
        let (mut waits, realtime) = take_predictions(&predictions, now);

        if waits.len() < PER_LINE {
            let window = service_window(now.naive_local());
            let extra = [
                ("filter[date]", window.date.format("%Y-%m-%d").to_string()),
                ("filter[min_time]", window.min_time),
                ("filter[max_time]", window.max_time),
            ];
            let schedules = self.get("schedules", &extra).await?;
            fill_from_schedule(&mut waits, &schedules, &realtime, Local::now().fixed_offset());
        }

        let color = draw::hex(&self.line.color).unwrap_or(TITLE_COLOR);
        Ok(waits
            .into_iter()
            .map(|(wait, kind)| Departure { label: self.line.label.clone(), color, wait, kind })
            .collect())
    }
}

pub struct MbtaFetch {
    queries: Vec<LineQuery>,
}

impl MbtaFetch {
    pub fn new(client: Client, cfg: &MbtaConfig) -> Self {
        let queries = cfg
            .lines
            .iter()
            .map(|line| LineQuery { client: client.clone(), api_key: cfg.api_key.clone(), line: line.clone() })
            .collect();
        Self { queries }
    }
}

impl Fetch for MbtaFetch {
    type Data = Vec<Departure>;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        let mut tasks = JoinSet::new();
        for q in self.queries.iter().cloned() {
            tasks.spawn(async move { q.waits().await });
        }

        let mut all = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let waits = joined.map_err(|e| FetchError::MissingData(format!("line query aborted: {}", e)))??;
            all.extend(waits);
        }
        merge(&mut all);
        debug!("mbta: {} departures", all.len());
        Ok(all)
    }

    fn fallback(&self) -> Self::Data {
        Vec::new()
    }
}

/// All lines together, soonest first.
fn merge(all: &mut [Departure]) {
    all.sort_by(|a, b| a.wait.cmp(&b.wait).then_with(|| a.label.cmp(&b.label)));
}

pub fn render(data: &Vec<Departure>, size: PanelSize) -> Result<Option<Frame>, RenderError> {
    draw_mbta(data, size, super::now()).map(Some)
}

pub fn draw_mbta(departures: &[Departure], size: PanelSize, now: NaiveDateTime) -> Result<Frame, RenderError> {
    let mut frame = Frame::new(size);
    let short = size.is_short();

    let (top, max_rows) = if short {
        (0, 3)
    } else {
        draw::draw_text(&mut frame, "MBTA", 1, 1, FONT, TITLE_COLOR)?;
        draw::draw_text_right(&mut frame, &now.format("%H:%M").to_string(), 64, 1, FONT, TITLE_COLOR)?;
        (12, MAX_ROWS)
    };

    if departures.is_empty() {
        let y = if short {
            8
        } else {
            draw_sleeping_train(&mut frame, Point::new(16, 14))?;
            45
        };
        let region = Rectangle::new(Point::new(0, y), Size::new(64, 18));
        draw::draw_text_region_align(
            &mut frame,
            "trains are sleeping",
            region,
            HorizontalAlignment::Center,
            VerticalAlignment::Top,
            FONT,
            TITLE_COLOR,
        )?;
        return Ok(frame);
    }

    for (i, d) in departures.iter().take(max_rows).enumerate() {
        let y = top + 9 * i as i32 + if short { 2 } else { 0 };
        let color = d.display_color();
        let label: String = d.label.chars().take(8).collect();
        draw::draw_text(&mut frame, &label, 1, y, FONT, color)?;
        draw::draw_text_right(&mut frame, &d.wait.num_minutes().to_string(), 57, y, FONT, color)?;
        draw::draw_text(&mut frame, "m", 59, y, FONT, color)?;
    }
    Ok(frame)
}

/// Little train with a "z" over it.
fn draw_sleeping_train(frame: &mut Frame, at: Point) -> Result<(), RenderError> {
    let p = |x, y| at + Point::new(x, y);
    draw::draw_rectangle(frame, p(0, 6), p(20, 18), Some(TITLE_COLOR), None)?;
    draw::draw_rectangle(frame, p(3, 9), p(8, 13), Some(colors::BLACK), None)?;
    draw::draw_rectangle(frame, p(12, 9), p(17, 13), Some(colors::BLACK), None)?;
    for x in [3, 14] {
        Circle::new(p(x, 17), 4).into_styled(PrimitiveStyle::with_fill(colors::GREY)).draw(frame)?;
    }
    draw::draw_polyline(frame, &[p(22, 0), p(26, 0), p(22, 4), p(26, 4)], colors::WHITE)?;
    Ok(())
}
