/*
 *  main.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Entry point: config, sources, render loop, remote and shutdown
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

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use lymatrix::app::{self, App, PanelSink};
use lymatrix::config::{self, Cli, Config};
use lymatrix::frame::Frame;
use lymatrix::metrics::Metrics;
use lymatrix::pages::{self, no_connection, PageContext};
use lymatrix::panel::{MockPanel, SharedPanel};
use lymatrix::remote::{self, PreviewHub, PREVIEW_SCALE};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP.
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received. Initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received. Initiating graceful shutdown."),
        _ = sighup.recv() => info!("SIGHUP received. Initiating graceful shutdown."),
    }
    Ok(())
}

fn write_png(dir: &Path, name: &str, frame: &Frame) -> Result<()> {
    let png = frame.encode_png(PREVIEW_SCALE).map_err(anyhow::Error::msg)?;
    let path = dir.join(format!("{}.png", name));
    fs::write(&path, png).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Render every configured page once, after its first fetch, then the
/// no-connection placeholder.
async fn write_previews(cfg: &Config, ctx: &PageContext, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let size = cfg.panel_size();

    for screen in pages::preview_screens(cfg, ctx) {
        screen.ready().await;
        match screen.render(size) {
            Ok(Some(frame)) => write_png(dir, screen.name(), &frame)?,
            Ok(None) => warn!("{}: nothing to preview", screen.name()),
            Err(e) => error!("{}: {}", screen.name(), e),
        }
    }

    let frame = no_connection::draw_no_connection(size, pages::now(), no_connection::NO_CONNECTION)?;
    write_png(dir, "no_connection", &frame)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("loading configuration")?;

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level()))
        .format_timestamp_secs()
        .init();

    info!("LyMatrix v{} built {} ({})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_PROFILE);

    if cli.dump_config {
        println!("{}", config::dump(&cfg)?);
        return Ok(());
    }

    let metrics = Metrics::new();
    let ctx = PageContext::new(metrics.clone(), cfg.fetch_timeout()).context("building http client")?;

    if let Some(dir) = cli.previews.as_deref() {
        return write_previews(&cfg, &ctx, dir).await;
    }

    let size = cfg.panel_size();
    // physical drivers live outside this crate; the mock keeps headless runs honest
    let panel = SharedPanel::new(MockPanel::new(size));
    info!("panel {} at {} fps", size, cfg.frame_rate());

    let screens = pages::build_screens(&cfg, &ctx);
    let special = pages::special_factory(&cfg, &ctx);
    let modes = app::build_mode_table(&cfg, screens, special, panel.clone());

    let hub = PreviewHub::new(size, PREVIEW_SCALE);
    let app = App::new(modes, cfg.frame_period())
        .with_sink(PanelSink(panel))
        .with_sink(hub.clone());
    let input = app.input();
    let shutdown = CancellationToken::new();

    let remote = if cfg.remote_enabled() {
        let listener = remote::bind(cfg.remote_port()).await.context("starting remote")?;
        Some(tokio::spawn(remote::serve(listener, input.clone(), hub, shutdown.clone())))
    } else {
        info!("remote disabled");
        None
    };

    #[cfg(feature = "rpi")]
    let _encoder = lymatrix::hardware::Encoder::start(&cfg.hardware(), input.clone())
        .context("starting gpio input")?;
    drop(input);

    let render = tokio::spawn(app.run(shutdown.clone()));

    let signals = signal_handler().await;
    shutdown.cancel();

    render.await.context("render loop")?;
    signals.context("installing signal handlers")?;
    if let Some(remote) = remote {
        remote.await.context("remote task")??;
    }

    for (name, m) in metrics.snapshot() {
        info!(
            "{}: {} fetches, {} failures, last load {:.3}s",
            name, m.fetches, m.failures, m.load_seconds
        );
    }
    info!("Main application exiting.");
    Ok(())
}
