/*
 *  pages/spotify.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Now playing: album art for the first account with a track
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

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use log::{debug, warn};
use mini_moka::sync::Cache;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::fish::Thumbnail;
use crate::config::{SpotifyAccount, SpotifyConfig};
use crate::frame::{Frame, PanelSize};
use crate::screen::RenderError;
use crate::source::{Fetch, FetchError};

pub const NAME: &str = "spotify";
pub const TTL: Duration = Duration::from_secs(15);

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const PLAYING_URL: &str = "https://api.spotify.com/v1/me/player/currently-playing";

// access tokens are good for an hour
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    item: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    album: Album,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    images: Vec<AlbumImage>,
}

#[derive(Debug, Deserialize)]
struct AlbumImage {
    url: String,
}

/// Cover art resized for both panel shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumArt {
    pub full: Thumbnail,
    pub half: Thumbnail,
}

impl AlbumArt {
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| FetchError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(Self {
            full: thumbnail(&img, 64),
            half: thumbnail(&img, 32),
        })
    }
}

fn thumbnail(img: &DynamicImage, side: u32) -> Thumbnail {
    let rgba = img.resize_exact(side, side, FilterType::Triangle).to_rgba8();
    Thumbnail {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.pixels().map(|p| p.0).collect(),
    }
}

/// Cover URL of the current track, if anything is loaded in the player.
fn cover_url(playing: &CurrentlyPlaying) -> Option<&str> {
    playing.item.as_ref()?.album.images.first().map(|i| i.url.as_str())
}

pub struct SpotifyFetch {
    client: Client,
    client_id: String,
    client_secret: String,
    accounts: Vec<SpotifyAccount>,
    tokens: Arc<Cache<String, String>>,
}

impl SpotifyFetch {
    pub fn new(client: Client, cfg: &SpotifyConfig) -> Self {
        let tokens = Cache::builder().max_capacity(16).time_to_live(TOKEN_TTL).build();
        Self {
            client,
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            accounts: cfg.accounts.clone(),
            tokens: Arc::new(tokens),
        }
    }

    /// Refresh-token grant, cached per account.
    async fn access_token(&self, account: &SpotifyAccount) -> Result<String, FetchError> {
        if let Some(token) = self.tokens.get(&account.name) {
            return Ok(token);
        }
        let grant: TokenGrant = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", account.refresh_token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("spotify: new access token for {}", account.name);
        self.tokens.insert(account.name.clone(), grant.access_token.clone());
        Ok(grant.access_token)
    }

    async fn now_playing(&self, account: &SpotifyAccount) -> Result<Option<String>, FetchError> {
        let token = self.access_token(account).await?;
        let resp = self.client.get(PLAYING_URL).bearer_auth(token).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate(&account.name);
        }
        let resp = resp.error_for_status()?;
        // 204: player idle
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let playing: CurrentlyPlaying = resp.json().await?;
        Ok(cover_url(&playing).map(str::to_string))
    }
}

impl Fetch for SpotifyFetch {
    type Data = Option<AlbumArt>;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        for account in &self.accounts {
            let url = match self.now_playing(account).await {
                Ok(Some(url)) => url,
                Ok(None) => continue,
                Err(e) => {
                    warn!("spotify: {}: {}", account.name, e);
                    continue;
                }
            };
            let bytes = self.client.get(&url).send().await?.error_for_status()?.bytes().await?;
            return AlbumArt::decode(&bytes).map(Some);
        }
        Ok(None)
    }

    fn fallback(&self) -> Self::Data {
        None
    }
}

/// Nothing playing means nothing to show; rotation skips the page.
pub fn render(data: &Option<AlbumArt>, size: PanelSize) -> Result<Option<Frame>, RenderError> {
    Ok(data.as_ref().map(|art| draw_album_art(art, size)))
}

pub fn draw_album_art(art: &AlbumArt, size: PanelSize) -> Frame {
    let mut frame = Frame::new(size);
    if size.is_short() {
        art.half.paste_at(&mut frame, 16, 0);
    } else {
        art.full.paste_at(&mut frame, 0, 0);
    }
    frame
}
