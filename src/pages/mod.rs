/*
 *  pages/mod.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Data-source pages and the screen list built from config
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

pub mod approaching;
pub mod bluebikes;
pub mod fish;
pub mod mbta;
pub mod no_connection;
pub mod spotify;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use log::info;
use reqwest::{header, Client};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::modes::SpecialFactory;
use crate::screen::{Page, Screen};
use crate::source::{RefreshPolicy, RefreshableSource};

const USER_AGENT: &str = concat!("LyMatrix/", env!("CARGO_PKG_VERSION"));

/// Shared plumbing every page fetcher needs.
#[derive(Clone)]
pub struct PageContext {
    pub client: Client,
    pub metrics: Metrics,
    pub fetch_timeout: Duration,
}

impl PageContext {
    pub fn new(metrics: Metrics, fetch_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(fetch_timeout)?,
            metrics,
            fetch_timeout,
        })
    }

    fn policy(&self, ttl: Duration) -> RefreshPolicy {
        RefreshPolicy::new(ttl, self.fetch_timeout)
    }

    /// Spawn a source and wrap it with its view.
    fn page<F, V>(&self, name: &str, fetcher: F, ttl: Duration, view: V) -> Page<F::Data>
    where
        F: crate::source::Fetch,
        V: crate::screen::View<F::Data> + 'static,
    {
        let source = RefreshableSource::spawn(name, fetcher, self.policy(ttl), self.metrics.clone());
        Page::new(source, view)
    }
}

pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = header::HeaderMap::new();
    headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
    headers.insert("Accept", header::HeaderValue::from_static("application/json"));

    Client::builder()
        .connect_timeout(timeout.min(Duration::from_millis(1500)))
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

/// Wall clock used by every view header.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Build the rotating screens in display order. Must be called from within
/// a tokio runtime; every page starts its worker immediately.
///
/// A page with a config section is always built. Its `enabled` key only
/// sets the starting state, so the Screens menu can still turn it on.
pub fn build_screens(cfg: &Config, ctx: &PageContext) -> Vec<Arc<dyn Screen>> {
    let mut screens: Vec<Arc<dyn Screen>> = Vec::new();

    if let Some(m) = cfg.mbta.as_ref() {
        let fetcher = mbta::MbtaFetch::new(ctx.client.clone(), m);
        let page = ctx.page(mbta::NAME, fetcher, mbta::TTL, mbta::render);
        add(&mut screens, page, cfg.mbta_enabled());
    }
    if let Some(s) = cfg.spotify.as_ref() {
        let fetcher = spotify::SpotifyFetch::new(ctx.client.clone(), s);
        let page = ctx.page(spotify::NAME, fetcher, spotify::TTL, spotify::render);
        add(&mut screens, page, cfg.spotify_enabled());
    }
    if let Some(w) = cfg.weather.as_ref() {
        let fetcher = weather::WeatherFetch::new(ctx.client.clone(), w);
        let page = ctx.page(weather::NAME, fetcher, weather::TTL, weather::render);
        add(&mut screens, page, cfg.weather_enabled());
    }
    if let Some(b) = cfg.bluebikes.as_ref() {
        let fetcher = bluebikes::BlueBikesFetch::new(ctx.client.clone(), b);
        let page = ctx.page(bluebikes::NAME, fetcher, bluebikes::TTL, bluebikes::render);
        add(&mut screens, page, cfg.bluebikes_enabled());
    }
    if cfg.approaching.is_some() {
        let page = ctx.page(approaching::NAME, approaching::fetcher(), approaching::TTL, approaching::render);
        add(&mut screens, page, cfg.approaching_enabled());
    }

    info!(
        "screens: [{}]",
        screens
            .iter()
            .map(|s| if s.is_enabled() { s.name().to_string() } else { format!("({})", s.name()) })
            .collect::<Vec<_>>()
            .join(", ")
    );
    screens
}

fn add(screens: &mut Vec<Arc<dyn Screen>>, screen: impl Screen + 'static, enabled: bool) {
    screen.set_enabled(enabled);
    screens.push(Arc::new(screen));
}

/// Factory for the time-windowed special screen, if configured. Each call
/// spawns a fresh worker.
pub fn special_factory(cfg: &Config, ctx: &PageContext) -> Option<SpecialFactory> {
    if !cfg.fish_enabled() {
        return None;
    }
    let ctx = ctx.clone();
    Some(Box::new(move || -> Box<dyn Screen> {
        let fetcher = fish::FishFetch::new(ctx.client.clone());
        Box::new(ctx.page(fish::NAME, fetcher, fish::TTL, fish::render))
    }))
}

/// Every configured page, special included, for `--previews`.
pub fn preview_screens(cfg: &Config, ctx: &PageContext) -> Vec<Arc<dyn Screen>> {
    let mut out = build_screens(cfg, ctx);
    if let Some(mut factory) = special_factory(cfg, ctx) {
        out.push(Arc::from(factory()));
    }
    out
}
