/*
 *  pages/weather.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Current conditions from OpenWeatherMap
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

use std::time::Duration;

use chrono::NaiveDateTime;
use embedded_graphics::{
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Circle, PrimitiveStyle},
};
use log::info;
use reqwest::Client;
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::draw::{self, colors, FONT, MID_FONT};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;
use crate::source::{Fetch, FetchError};

pub const NAME: &str = "weather";
pub const TTL: Duration = Duration::from_secs(600);

const BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

const TIME_DATE_COLOR: Rgb888 = colors::SILVER;
const HIGH_COLOR: Rgb888 = Rgb888::new(0xff, 0xa0, 0x24);
const LOW_COLOR: Rgb888 = Rgb888::new(0x5c, 0xc9, 0xff);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherData {
    pub main: Readings,
    pub weather: Vec<Condition>,
}

/// Temperatures in Kelvin, as delivered.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Readings {
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    pub id: u32,
    /// e.g. "10d"; the trailing letter is d(ay) or n(ight)
    pub icon: String,
}

impl WeatherData {
    pub fn is_daytime(&self) -> bool {
        self.weather.first().is_some_and(|c| c.icon.ends_with('d'))
    }

    pub fn icon_class(&self) -> Option<&'static str> {
        self.weather.first().and_then(|c| icon_class(c.id, self.is_daytime()))
    }
}

pub fn k_to_f(k: f64) -> i32 {
    ((k - 273.15) * 9.0 / 5.0 + 32.0) as i32
}

pub fn k_to_c(k: f64) -> i32 {
    (k - 273.15) as i32
}

const DAYTIME: &[(&str, &[u32])] = &[
    ("cloud", &[803]),
    ("cloud_sun", &[801, 802]),
    ("cloud_wind", &[711, 721, 731, 741, 751, 761, 762]),
    ("cloud_wind_sun", &[701]),
    ("clouds", &[804]),
    ("lightning", &[210, 211, 212, 221]),
    ("rain0", &[302, 310, 311, 312, 313, 314, 321]),
    ("rain0_sun", &[300, 301]),
    ("rain1", &[502, 521, 522]),
    ("rain1_sun", &[500, 501]),
    ("rain2", &[503, 504, 531]),
    ("rain_lightning", &[200, 201, 202, 230, 231, 232]),
    ("rain_snow", &[511, 615, 616]),
    ("snow", &[602, 613, 621, 622]),
    ("snow_sun", &[600, 601, 611, 612, 620]),
    ("sun", &[800]),
    ("wind", &[771, 781]),
];

const NIGHTTIME: &[(&str, &[u32])] = &[
    ("cloud", &[803]),
    ("cloud_moon", &[801, 802]),
    ("cloud_wind", &[711, 721, 731, 741, 751, 761, 762]),
    ("cloud_wind_moon", &[701]),
    ("clouds", &[804]),
    ("lightning", &[210, 211, 212, 221]),
    ("moon", &[800]),
    ("rain0", &[300, 301, 302, 310, 311, 312, 313, 314, 321]),
    ("rain1", &[502, 521, 522]),
    ("rain1_moon", &[500, 501]),
    ("rain2", &[503, 504, 531]),
    ("rain_lightning", &[200, 201, 202, 230, 231, 232]),
    ("rain_snow", &[511, 615, 616]),
    ("snow", &[602, 613, 621, 622]),
    ("snow_moon", &[600, 601, 611, 612, 620]),
    ("wind", &[771, 781]),
];

/// Map an OpenWeatherMap condition code to an icon class.
pub fn icon_class(code: u32, daytime: bool) -> Option<&'static str> {
    let table = if daytime { DAYTIME } else { NIGHTTIME };
    table
        .iter()
        .find(|(_, codes)| codes.contains(&code))
        .map(|(name, _)| *name)
}

pub struct WeatherFetch {
    client: Client,
    api_key: String,
    zip_code: String,
}

impl WeatherFetch {
    pub fn new(client: Client, cfg: &WeatherConfig) -> Self {
        info!("weather for zip {}", cfg.zip_code);
        Self {
            client,
            api_key: cfg.api_key.clone(),
            zip_code: cfg.zip_code.clone(),
        }
    }
}

impl Fetch for WeatherFetch {
    type Data = Option<WeatherData>;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        let data = self
            .client
            .get(BASE_URL)
            .query(&[("appid", self.api_key.as_str()), ("zip", self.zip_code.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<WeatherData>()
            .await?;
        Ok(Some(data))
    }

    fn fallback(&self) -> Self::Data {
        None
    }
}

pub fn render(data: &Option<WeatherData>, size: PanelSize) -> Result<Option<Frame>, RenderError> {
    draw_weather(data.as_ref(), size, super::now()).map(Some)
}

pub fn draw_weather(
    data: Option<&WeatherData>,
    size: PanelSize,
    now: NaiveDateTime,
) -> Result<Frame, RenderError> {
    let mut frame = Frame::new(size);
    let time_str = now.format("%H:%M").to_string();

    if size.is_short() {
        draw::draw_text_right(&mut frame, &time_str, 64, 24, FONT, TIME_DATE_COLOR)?;
        let Some(data) = data else { return Ok(frame) };

        draw_icon(&mut frame, data.icon_class(), Point::new(1, 0))?;
        draw_reading(&mut frame, k_to_f(data.main.temp), "F", Point::new(33, 0))?;
        draw_reading(&mut frame, k_to_c(data.main.temp), "C", Point::new(33, 11))?;
        return Ok(frame);
    }

    draw::draw_text(&mut frame, &now.format("%m/%d").to_string(), 1, 1, FONT, TIME_DATE_COLOR)?;
    draw::draw_text_right(&mut frame, &time_str, 64, 1, FONT, TIME_DATE_COLOR)?;
    let Some(data) = data else { return Ok(frame) };

    draw_icon(&mut frame, data.icon_class(), Point::new(1, 11))?;
    draw_reading(&mut frame, k_to_f(data.main.temp), "F", Point::new(33, 14))?;
    draw_reading(&mut frame, k_to_c(data.main.temp), "C", Point::new(33, 28))?;

    // high / low
    let hi = [Point::new(4, 51), Point::new(6, 49), Point::new(8, 51)];
    draw::draw_polyline(&mut frame, &hi, HIGH_COLOR)?;
    draw::draw_text(&mut frame, &format!("{:>2}°F", k_to_f(data.main.temp_max)), 14, 47, FONT, HIGH_COLOR)?;
    draw::draw_text(&mut frame, &format!("{:>2}°C", k_to_c(data.main.temp_max)), 40, 47, FONT, HIGH_COLOR)?;
    let lo = [Point::new(4, 57), Point::new(6, 59), Point::new(8, 57)];
    draw::draw_polyline(&mut frame, &lo, LOW_COLOR)?;
    draw::draw_text(&mut frame, &format!("{:>2}°F", k_to_f(data.main.temp_min)), 14, 55, FONT, LOW_COLOR)?;
    draw::draw_text(&mut frame, &format!("{:>2}°C", k_to_c(data.main.temp_min)), 40, 55, FONT, LOW_COLOR)?;

    Ok(frame)
}

fn draw_reading(frame: &mut Frame, value: i32, unit: &str, at: Point) -> Result<(), RenderError> {
    draw::draw_text(frame, &format!("{:>3}°", value), at.x, at.y, MID_FONT, colors::WHITE)?;
    draw::draw_text(frame, unit, 58, at.y + 2, FONT, TIME_DATE_COLOR)?;
    Ok(())
}

/// 30x30 pictogram assembled from the parts named in the icon class.
fn draw_icon(frame: &mut Frame, class: Option<&str>, origin: Point) -> Result<(), RenderError> {
    let Some(class) = class else { return Ok(()) };

    const SUN: Rgb888 = Rgb888::new(0xff, 0xd0, 0x20);
    const MOON: Rgb888 = Rgb888::new(0xe0, 0xe0, 0xc0);
    const CLOUD: Rgb888 = Rgb888::new(0xb0, 0xb0, 0xb8);
    const RAIN: Rgb888 = Rgb888::new(0x40, 0x90, 0xff);

    let at = |x: i32, y: i32| origin + Point::new(x, y);
    let has_cloud = class.starts_with("cloud") || class.starts_with("rain") || class.starts_with("snow")
        || class == "lightning";

    if class.contains("sun") {
        let (d, p) = if has_cloud { (14, at(14, 0)) } else { (22, at(4, 4)) };
        Circle::new(p, d).into_styled(PrimitiveStyle::with_fill(SUN)).draw(frame)?;
    }
    if class.contains("moon") {
        let (d, p) = if has_cloud { (14, at(14, 0)) } else { (22, at(4, 4)) };
        Circle::new(p, d).into_styled(PrimitiveStyle::with_fill(MOON)).draw(frame)?;
        Circle::new(p + Point::new(d as i32 / 3, -2), d)
            .into_styled(PrimitiveStyle::with_fill(colors::BLACK))
            .draw(frame)?;
    }
    if has_cloud {
        let fill = PrimitiveStyle::with_fill(if class == "clouds" { colors::GREY } else { CLOUD });
        Circle::new(at(3, 8), 12).into_styled(fill).draw(frame)?;
        Circle::new(at(10, 4), 14).into_styled(fill).draw(frame)?;
        draw::draw_rectangle(frame, at(3, 13), at(26, 19), Some(CLOUD), None)?;
    }
    if class.starts_with("rain") {
        let drops = class.chars().nth(4).and_then(|c| c.to_digit(10)).unwrap_or(1) + 1;
        for i in 0..drops as i32 {
            let x = 6 + i * 7;
            draw::draw_line(frame, at(x, 22), at(x - 2, 27), RAIN)?;
        }
    }
    if class.contains("snow") {
        for (x, y) in [(7, 23), (14, 26), (21, 23)] {
            Circle::new(at(x, y), 3).into_styled(PrimitiveStyle::with_fill(colors::WHITE)).draw(frame)?;
        }
    }
    if class.contains("lightning") {
        let bolt = [at(16, 20), at(12, 25), at(16, 25), at(13, 29)];
        draw::draw_polyline(frame, &bolt, SUN)?;
    }
    if class.contains("wind") {
        for (y, w) in [(22, 20), (25, 14), (28, 18)] {
            draw::draw_line(frame, at(4, y), at(4 + w, y), colors::SILVER)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(code: u32, icon: &str) -> WeatherData {
        WeatherData {
            main: Readings { temp: 295.0, temp_min: 290.0, temp_max: 300.0 },
            weather: vec![Condition { id: code, icon: icon.into() }],
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_kelvin_conversions_truncate() {
        assert_eq!(k_to_f(273.15), 32);
        assert_eq!(k_to_c(273.15), 0);
        assert_eq!(k_to_f(295.0), 71);
        assert_eq!(k_to_c(300.0), 26);
    }

    #[test]
    fn test_icon_class_day_and_night() {
        assert_eq!(icon_class(800, true), Some("sun"));
        assert_eq!(icon_class(800, false), Some("moon"));
        assert_eq!(icon_class(801, true), Some("cloud_sun"));
        assert_eq!(icon_class(801, false), Some("cloud_moon"));
        assert_eq!(icon_class(300, false), Some("rain0"));
        assert_eq!(icon_class(999, true), None);
        assert!(sample(800, "01n").icon_class() == Some("moon"));
    }

    #[test]
    fn test_parse_openweathermap_payload() {
        let json = r#"{"coord":{"lon":-71.1,"lat":42.4},
            "weather":[{"id":500,"main":"Rain","description":"light rain","icon":"10d"}],
            "main":{"temp":288.4,"feels_like":287.9,"temp_min":286.2,"temp_max":290.1,"pressure":1012,"humidity":80},
            "name":"Somerville"}"#;
        let data: WeatherData = serde_json::from_str(json).unwrap();
        assert!(data.is_daytime());
        assert_eq!(data.icon_class(), Some("rain1_sun"));
        assert_eq!(k_to_f(data.main.temp_max), 62);
    }

    #[test]
    fn test_missing_data_draws_only_header() {
        let frame = draw_weather(None, PanelSize::P64x64, noon()).unwrap();
        assert!(!frame.is_blank());
        // nothing below the header row
        assert!((0..64).all(|x| (20..64).all(|y| frame.pixel(x, y) == Some(colors::BLACK))));
    }

    #[test]
    fn test_short_panel_layout() {
        let data = sample(804, "04d");
        let frame = draw_weather(Some(&data), PanelSize::P64x32, noon()).unwrap();
        assert_eq!(frame.panel_size(), PanelSize::P64x32);
        assert!(!frame.is_blank());
    }
}
