/*
 *  config.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	YAML configuration layered under CLI overrides
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

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::frame::PanelSize;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub const DEFAULT_FRAME_RATE: u32 = 10;
pub const DEFAULT_DWELL_SECS: u64 = 5;
pub const DEFAULT_MANUAL_DWELL_SECS: u64 = 10;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_BRIGHTNESS: u8 = 60;
pub const DEFAULT_REMOTE_PORT: u16 = 8080;
pub const DEFAULT_SPECIAL_MINUTE: u32 = 11;
pub const DEFAULT_SPECIAL_HOURS: [u32; 2] = [11, 23];

/// Top-level app configuration. Every group is optional; accessors supply
/// the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub panel: Option<PanelConfig>,
    pub app: Option<AppConfig>,
    pub special: Option<SpecialConfig>,
    pub remote: Option<RemoteConfig>,
    pub hardware: Option<HardwareConfig>,
    pub menu: Option<MenuConfig>,

    // pages
    pub weather: Option<WeatherConfig>,
    pub bluebikes: Option<BlueBikesConfig>,
    pub mbta: Option<MbtaConfig>,
    pub spotify: Option<SpotifyConfig>,
    pub fish: Option<FishConfig>,
    pub approaching: Option<ApproachingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PanelConfig {
    pub size: Option<PanelSize>,    // "64x64" | "64x32"
    pub brightness: Option<u8>,     // 0-100
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub frame_rate: Option<u32>,
    pub dwell_secs: Option<u64>,
    pub manual_dwell_secs: Option<u64>,
    pub fetch_timeout_ms: Option<u64>,
}

/// Time window in which the special screen replaces rotation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpecialConfig {
    pub minute: Option<u32>,
    pub hours: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteConfig {
    pub enabled: Option<bool>,
    pub port: Option<u16>,
}

/// BCM pin numbers for the rotary encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    pub encoder_a: u8,
    pub encoder_b: u8,
    pub button: u8,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self { encoder_a: 8, encoder_b: 7, button: 25 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MenuConfig {
    pub network: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeatherConfig {
    pub enabled: Option<bool>,
    pub api_key: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlueBikesConfig {
    pub enabled: Option<bool>,
    pub stations: Vec<StationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StationConfig {
    /// short station id as printed on the dock, e.g. "S32022"
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MbtaConfig {
    pub enabled: Option<bool>,
    pub api_key: Option<String>,
    pub lines: Vec<LineConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineConfig {
    pub label: String,
    /// `#rrggbb`
    pub color: String,
    pub stop: String,
    pub route: String,
    pub direction: u8,
}

/// Now-playing album art. Each account needs a refresh token obtained
/// once through the authorization code flow.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpotifyConfig {
    pub enabled: Option<bool>,
    pub client_id: String,
    pub client_secret: String,
    pub accounts: Vec<SpotifyAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpotifyAccount {
    pub name: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FishConfig {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApproachingConfig {
    pub enabled: Option<bool>,
}

impl Config {
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn panel_size(&self) -> PanelSize {
        self.panel.as_ref().and_then(|p| p.size).unwrap_or_default()
    }

    pub fn brightness(&self) -> u8 {
        self.panel.as_ref().and_then(|p| p.brightness).unwrap_or(DEFAULT_BRIGHTNESS)
    }

    pub fn frame_rate(&self) -> u32 {
        self.app.as_ref().and_then(|a| a.frame_rate).unwrap_or(DEFAULT_FRAME_RATE)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate().max(1) as f64)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.app.as_ref().and_then(|a| a.dwell_secs).unwrap_or(DEFAULT_DWELL_SECS))
    }

    pub fn manual_dwell(&self) -> Duration {
        Duration::from_secs(
            self.app.as_ref().and_then(|a| a.manual_dwell_secs).unwrap_or(DEFAULT_MANUAL_DWELL_SECS),
        )
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(
            self.app.as_ref().and_then(|a| a.fetch_timeout_ms).unwrap_or(DEFAULT_FETCH_TIMEOUT_MS),
        )
    }

    pub fn special_minute(&self) -> u32 {
        self.special.as_ref().and_then(|s| s.minute).unwrap_or(DEFAULT_SPECIAL_MINUTE)
    }

    pub fn special_hours(&self) -> Vec<u32> {
        self.special
            .as_ref()
            .and_then(|s| s.hours.clone())
            .unwrap_or_else(|| DEFAULT_SPECIAL_HOURS.to_vec())
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.as_ref().and_then(|r| r.enabled).unwrap_or(true)
    }

    pub fn remote_port(&self) -> u16 {
        self.remote.as_ref().and_then(|r| r.port).unwrap_or(DEFAULT_REMOTE_PORT)
    }

    pub fn hardware(&self) -> HardwareConfig {
        self.hardware.clone().unwrap_or_default()
    }

    /// Network entry in the menu. Only Linux can report the SSID.
    pub fn menu_network(&self) -> bool {
        self.menu.as_ref().and_then(|m| m.network).unwrap_or(cfg!(target_os = "linux"))
    }

    pub fn weather_enabled(&self) -> bool {
        self.weather.as_ref().is_some_and(|w| w.enabled.unwrap_or(true))
    }

    pub fn bluebikes_enabled(&self) -> bool {
        self.bluebikes.as_ref().is_some_and(|b| b.enabled.unwrap_or(true))
    }

    pub fn mbta_enabled(&self) -> bool {
        self.mbta.as_ref().is_some_and(|m| m.enabled.unwrap_or(true))
    }

    pub fn spotify_enabled(&self) -> bool {
        self.spotify.as_ref().is_some_and(|s| s.enabled.unwrap_or(true))
    }

    /// The special screen is on unless switched off.
    pub fn fish_enabled(&self) -> bool {
        self.fish.as_ref().and_then(|f| f.enabled).unwrap_or(true)
    }

    pub fn approaching_enabled(&self) -> bool {
        self.approaching.as_ref().is_some_and(|a| a.enabled.unwrap_or(true))
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "LyMatrix", about = "LyMatrix pixel panel dashboard", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// shorthand for --log-level debug
    #[arg(long, action = ArgAction::SetTrue)]
    pub debug: bool,
    /// 64x64 or 64x32
    #[arg(long)]
    pub panel_size: Option<PanelSize>,
    #[arg(long)]
    pub brightness: Option<u8>,
    #[arg(long)]
    pub frame_rate: Option<u32>,
    #[arg(long)]
    pub remote_port: Option<u16>,
    /// disable the HTTP preview/remote surface
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_remote: bool,
    /// render every page once into this directory as PNG and exit
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub previews: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: read YAML, merge, apply CLI, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Pretty YAML of effective config (nice for debugging)
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/lymatrix/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/lymatrix/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/lymatrix.yaml");
        if p.exists() { return Some(p) }
    }
    // project local, then system wide
    for candidate in &["lymatrix.yaml", "/etc/lymatrix/lymatrix.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

pub fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()   { dst.log_level = src.log_level; }
    match (&mut dst.panel, src.panel) {
        (None, Some(c)) => dst.panel = Some(c),
        (Some(d), Some(s)) => merge_panel(d, s),
        _ => {}
    }
    match (&mut dst.app, src.app) {
        (None, Some(c)) => dst.app = Some(c),
        (Some(d), Some(s)) => merge_app(d, s),
        _ => {}
    }
    if src.special.is_some()     { dst.special = src.special; }
    if src.remote.is_some()      { dst.remote = src.remote; }
    if src.hardware.is_some()    { dst.hardware = src.hardware; }
    if src.menu.is_some()        { dst.menu = src.menu; }
    if src.weather.is_some()     { dst.weather = src.weather; }
    if src.bluebikes.is_some()   { dst.bluebikes = src.bluebikes; }
    if src.mbta.is_some()        { dst.mbta = src.mbta; }
    if src.spotify.is_some()     { dst.spotify = src.spotify; }
    if src.fish.is_some()        { dst.fish = src.fish; }
    if src.approaching.is_some() { dst.approaching = src.approaching; }
}

fn merge_panel(dst: &mut PanelConfig, src: PanelConfig) {
    if src.size.is_some()        { dst.size = src.size; }
    if src.brightness.is_some()  { dst.brightness = src.brightness; }
}

fn merge_app(dst: &mut AppConfig, src: AppConfig) {
    if src.frame_rate.is_some()        { dst.frame_rate = src.frame_rate; }
    if src.dwell_secs.is_some()        { dst.dwell_secs = src.dwell_secs; }
    if src.manual_dwell_secs.is_some() { dst.manual_dwell_secs = src.manual_dwell_secs; }
    if src.fetch_timeout_ms.is_some()  { dst.fetch_timeout_ms = src.fetch_timeout_ms; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()   { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                 { cfg.log_level = Some("debug".to_string()); }

    if cli.panel_size.is_some() || cli.brightness.is_some() {
        let panel = cfg.panel.get_or_insert_with(PanelConfig::default);
        if cli.panel_size.is_some()  { panel.size = cli.panel_size; }
        if cli.brightness.is_some()  { panel.brightness = cli.brightness; }
    }
    if cli.frame_rate.is_some() {
        cfg.app.get_or_insert_with(AppConfig::default).frame_rate = cli.frame_rate;
    }
    if cli.remote_port.is_some() || cli.no_remote {
        let remote = cfg.remote.get_or_insert_with(RemoteConfig::default);
        if cli.remote_port.is_some() { remote.port = cli.remote_port; }
        if cli.no_remote             { remote.enabled = Some(false); }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let fr = cfg.frame_rate();
    if fr == 0 || fr > 120 {
        return Err(ConfigError::Validation("app frame_rate must be 1..=120".into()));
    }
    if cfg.brightness() > 100 {
        return Err(ConfigError::Validation("panel brightness must be 0..=100".into()));
    }
    if cfg.dwell().is_zero() || cfg.manual_dwell().is_zero() {
        return Err(ConfigError::Validation("app dwell_secs/manual_dwell_secs must be > 0".into()));
    }
    if cfg.fetch_timeout().is_zero() {
        return Err(ConfigError::Validation("app fetch_timeout_ms must be > 0".into()));
    }
    if cfg.special_minute() > 59 {
        return Err(ConfigError::Validation("special minute must be 0..=59".into()));
    }
    if cfg.special_hours().iter().any(|h| *h > 23) {
        return Err(ConfigError::Validation("special hours must be 0..=23".into()));
    }
    if cfg.remote_enabled() && cfg.remote_port() == 0 {
        return Err(ConfigError::Validation("remote port must be > 0 when remote is enabled".into()));
    }
    if let Some(w) = cfg.weather.as_ref().filter(|_| cfg.weather_enabled()) {
        if w.api_key.is_empty() || w.zip_code.is_empty() {
            return Err(ConfigError::Validation("weather needs api_key and zip_code".into()));
        }
    }
    if let Some(s) = cfg.spotify.as_ref().filter(|_| cfg.spotify_enabled()) {
        if s.client_id.is_empty() || s.client_secret.is_empty() || s.accounts.is_empty() {
            return Err(ConfigError::Validation(
                "spotify needs client_id, client_secret and at least one account".into(),
            ));
        }
    }
    if let Some(m) = cfg.mbta.as_ref().filter(|_| cfg.mbta_enabled()) {
        for line in &m.lines {
            if crate::draw::hex(&line.color).is_none() {
                return Err(ConfigError::Validation(format!(
                    "mbta line '{}' color must be #rrggbb", line.label
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        f
    }

    fn cli_for(path: &Path) -> Cli {
        Cli { config: Some(path.to_path_buf()), ..Default::default() }
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.panel_size(), PanelSize::P64x64);
        assert_eq!(cfg.frame_rate(), 10);
        assert_eq!(cfg.frame_period(), Duration::from_millis(100));
        assert_eq!(cfg.dwell(), Duration::from_secs(5));
        assert_eq!(cfg.manual_dwell(), Duration::from_secs(10));
        assert_eq!(cfg.special_minute(), 11);
        assert_eq!(cfg.special_hours(), vec![11, 23]);
        assert!(cfg.fish_enabled());
        assert!(!cfg.weather_enabled());
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_load_yaml_with_cli_overrides() {
        let f = write_config(
            "panel:\n  size: 64x32\n  brightness: 60\napp:\n  frame_rate: 20\n\
             mbta:\n  lines:\n    - { label: Heath St, color: \"#00ff76\", stop: place-mgngl, route: Green-E, direction: 0 }\n",
        );
        let mut cli = cli_for(f.path());
        cli.brightness = Some(30);
        cli.no_remote = true;

        let cfg = load(&cli).unwrap();
        assert_eq!(cfg.panel_size(), PanelSize::P64x32);
        assert_eq!(cfg.brightness(), 30);
        assert_eq!(cfg.frame_rate(), 20);
        assert!(!cfg.remote_enabled());
        assert!(cfg.mbta_enabled());
        assert_eq!(cfg.mbta.as_ref().unwrap().lines[0].route, "Green-E");
    }

    #[test]
    fn test_unknown_panel_size_rejected() {
        let f = write_config("panel:\n  size: 128x64\n");
        assert!(matches!(load(&cli_for(f.path())), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_zero_frame_rate_rejected() {
        let f = write_config("app:\n  frame_rate: 0\n");
        assert!(matches!(load(&cli_for(f.path())), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_special_window_range_checked() {
        let f = write_config("special:\n  minute: 11\n  hours: [11, 24]\n");
        assert!(matches!(load(&cli_for(f.path())), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_spotify_needs_an_account() {
        let f = write_config("spotify:\n  client_id: abc\n  client_secret: def\n  accounts: []\n");
        assert!(matches!(load(&cli_for(f.path())), Err(ConfigError::Validation(_))));

        let f = write_config(
            "spotify:\n  client_id: abc\n  client_secret: def\n  accounts:\n    - { name: kitchen, refresh_token: xyz }\n",
        );
        let cfg = load(&cli_for(f.path())).unwrap();
        assert!(cfg.spotify_enabled());
        assert_eq!(cfg.spotify.unwrap().accounts[0].name, "kitchen");
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let cli = cli_for(Path::new("/nonexistent/lymatrix.yaml"));
        assert!(matches!(load(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_dump_round_trips() {
        let mut cfg = Config::default();
        cfg.panel = Some(PanelConfig { size: Some(PanelSize::P64x32), brightness: Some(50) });
        let yaml = dump(&cfg).unwrap();
        assert!(yaml.contains("64x32"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.panel_size(), PanelSize::P64x32);
    }
}
