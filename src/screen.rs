/*
 *  screen.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	Views, and pages pairing a source with its view
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

use core::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::frame::{Frame, PanelSize};
use crate::source::RefreshableSource;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing failed: {0}")]
    Draw(String),
    #[error("missing data: {0}")]
    MissingData(String),
}

// Frame is an infallible draw target
impl From<Infallible> for RenderError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

/// Pure function from a data snapshot to a frame.
///
/// `Ok(None)` asks the caller to skip this screen for now.
pub trait View<T>: Send + Sync {
    fn render(&self, data: &T, size: PanelSize) -> Result<Option<Frame>, RenderError>;
}

impl<T, F> View<T> for F
where
    F: Fn(&T, PanelSize) -> Result<Option<Frame>, RenderError> + Send + Sync,
{
    fn render(&self, data: &T, size: PanelSize) -> Result<Option<Frame>, RenderError> {
        self(data, size)
    }
}

/// Something Main mode can rotate through.
pub trait Screen: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    /// Has the backing source published at least once.
    fn is_ready(&self) -> bool;

    /// Render the latest data without waiting.
    fn render(&self, size: PanelSize) -> Result<Option<Frame>, RenderError>;

    /// Resolve once the backing source has published.
    fn ready(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// A [`RefreshableSource`] plus the view that draws it.
pub struct Page<T> {
    source: RefreshableSource<T>,
    view: Box<dyn View<T>>,
}

impl<T: Send + Sync + 'static> Page<T> {
    pub fn new(source: RefreshableSource<T>, view: impl View<T> + 'static) -> Self {
        Self { source, view: Box::new(view) }
    }

    pub fn source(&self) -> &RefreshableSource<T> {
        &self.source
    }
}

impl<T: Send + Sync + 'static> Screen for Page<T> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn is_enabled(&self) -> bool {
        self.source.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.source.set_enabled(enabled)
    }

    fn is_ready(&self) -> bool {
        self.source.is_ready()
    }

    fn render(&self, size: PanelSize) -> Result<Option<Frame>, RenderError> {
        match self.source.latest() {
            Some(data) => self.view.render(&data, size),
            None => Ok(None),
        }
    }

    fn ready(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.source.snapshot().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::source::{FetchError, FnFetch, RefreshPolicy};
    use embedded_graphics::pixelcolor::Rgb888;
    use std::time::Duration;

    fn fill_view(data: &Rgb888, size: PanelSize) -> Result<Option<Frame>, RenderError> {
        Ok(Some(Frame::filled(size, *data)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_unready_page_renders_nothing() {
        let fetcher = FnFetch::new(
            || async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok::<_, FetchError>(Rgb888::new(1, 2, 3))
            },
            || Rgb888::new(0, 0, 0),
        );
        let policy = RefreshPolicy::new(Duration::from_secs(60), Duration::from_secs(10));
        let page = Page::new(RefreshableSource::spawn("fill", fetcher, policy, Metrics::new()), fill_view);

        assert!(!page.is_ready());
        assert!(page.render(PanelSize::P64x32).unwrap().is_none());

        page.ready().await;
        let frame = page.render(PanelSize::P64x32).unwrap().unwrap();
        assert_eq!(frame.pixel(0, 0), Some(Rgb888::new(1, 2, 3)));
        assert_eq!(page.name(), "fill");
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_enabled_follows_source() {
        let fetcher = FnFetch::new(|| async { Ok::<_, FetchError>(Rgb888::new(0, 0, 0)) }, || Rgb888::new(0, 0, 0));
        let policy = RefreshPolicy::new(Duration::from_secs(60), Duration::from_secs(1));
        let page = Page::new(RefreshableSource::spawn("flag", fetcher, policy, Metrics::new()), fill_view);
        page.set_enabled(false);
        assert!(!page.source().is_enabled());
    }
}
