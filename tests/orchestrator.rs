/*
 *  tests/orchestrator.rs
 *
 *  End-to-end tests for sources, modes and the render loop
 *
 *  LyMatrix - pixel panel dashboard
 *  (c) 2020-26 Stuart Hunter
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use tokio_util::sync::CancellationToken;

use lymatrix::app::{build_mode_table, App, InputHandle, LoopStats, PanelSink};
use lymatrix::config::Config;
use lymatrix::frame::{Frame, PanelSize};
use lymatrix::metrics::Metrics;
use lymatrix::modes::SpecialFactory;
use lymatrix::pages::no_connection;
use lymatrix::panel::{MockPanel, MockPanelState, SharedPanel};
use lymatrix::screen::{Page, RenderError, Screen};
use lymatrix::source::{FetchError, FnFetch, RefreshPolicy, RefreshableSource};

const FETCH_TIMEOUT: Duration = Duration::from_secs(2);

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 2).unwrap().and_hms_opt(h, m, 0).unwrap()
}

fn config() -> Config {
    serde_yaml::from_str("menu:\n  network: false\n").unwrap()
}

fn solid(color: &Rgb888, size: PanelSize) -> Result<Option<Frame>, RenderError> {
    Ok(Some(Frame::filled(size, *color)))
}

fn solid_page(name: &str, color: Rgb888, metrics: &Metrics) -> Page<Rgb888> {
    let fetcher = FnFetch::new(move || async move { Ok::<_, FetchError>(color) }, move || color);
    let policy = RefreshPolicy::new(Duration::from_secs(5), FETCH_TIMEOUT);
    Page::new(RefreshableSource::spawn(name, fetcher, policy, metrics.clone()), solid)
}

struct Harness {
    input: InputHandle,
    stats: Arc<LoopStats>,
    panel: Arc<Mutex<MockPanelState>>,
    clock: Arc<Mutex<NaiveDateTime>>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn start(screens: Vec<Arc<dyn Screen>>, special: Option<SpecialFactory>) -> Self {
        let cfg = config();
        let mock = MockPanel::new(PanelSize::P64x64);
        let panel_state = mock.state();
        let panel = SharedPanel::new(mock);

        let clock = Arc::new(Mutex::new(at(9, 0)));
        let now = clock.clone();
        let table = build_mode_table(&cfg, screens, special, panel.clone());
        let app = App::new(table, Duration::from_millis(100))
            .with_sink(PanelSink(panel))
            .with_clock(move || *now.lock().unwrap());

        let input = app.input();
        let stats = app.stats();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(app.run(shutdown.clone()));
        Self { input, stats, panel: panel_state, clock, shutdown, task }
    }

    fn set_clock(&self, t: NaiveDateTime) {
        *self.clock.lock().unwrap() = t;
    }

    fn last_frame(&self) -> Frame {
        self.panel.lock().unwrap().last_frame.clone().unwrap()
    }

    fn last_color(&self) -> Option<Rgb888> {
        self.last_frame().pixel(0, 0)
    }

    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(350)).await;
    }

    async fn stop(self) -> Arc<Mutex<MockPanelState>> {
        self.shutdown.cancel();
        self.task.await.unwrap();
        self.panel
    }
}

#[tokio::test(start_paused = true)]
async fn test_sources_refresh_at_their_own_ttl() {
    let metrics = Metrics::new();
    let sources: Vec<_> = [5u64, 10, 30]
        .into_iter()
        .map(|ttl| {
            let fetcher = FnFetch::new(|| async { Ok::<_, FetchError>(()) }, || ());
            let policy = RefreshPolicy::new(Duration::from_secs(ttl), FETCH_TIMEOUT);
            RefreshableSource::spawn(format!("ttl{}", ttl), fetcher, policy, metrics.clone())
        })
        .collect();

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert!(sources[0].refresh_count() >= 6);
    assert!(sources[1].refresh_count() >= 3);
    assert!(sources[2].refresh_count() >= 1);
    assert!(metrics.get("ttl5").unwrap().fetches >= 6);

    for source in sources {
        source.join().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_source_renders_fallback() {
    let fetcher = FnFetch::new(
        || async { Err::<Rgb888, _>(FetchError::MissingData("offline".into())) },
        || Rgb888::CYAN,
    );
    let policy = RefreshPolicy::new(Duration::from_secs(30), FETCH_TIMEOUT);
    let page = Page::new(RefreshableSource::spawn("offline", fetcher, policy, Metrics::new()), solid);

    page.ready().await;
    let frame = page.render(PanelSize::P64x32).unwrap().unwrap();
    assert_eq!(frame.pixel(10, 10), Some(Rgb888::CYAN));
}

#[tokio::test(start_paused = true)]
async fn test_join_is_bounded_by_fetch_timeout() {
    let fetcher = FnFetch::new(
        || async {
            std::future::pending::<()>().await;
            Ok::<_, FetchError>(0u8)
        },
        || 0u8,
    );
    let policy = RefreshPolicy::new(Duration::from_secs(60), FETCH_TIMEOUT);
    let source = RefreshableSource::spawn("stuck", fetcher, policy, Metrics::new());

    let start = tokio::time::Instant::now();
    source.join().await;
    assert!(start.elapsed() <= FETCH_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_render_cadence_and_input_wakeup() {
    let metrics = Metrics::new();
    let screens: Vec<Arc<dyn Screen>> = vec![Arc::new(solid_page("red", Rgb888::RED, &metrics))];
    let h = Harness::start(screens, None);

    tokio::time::sleep(Duration::from_millis(1050)).await;
    let renders = h.stats.renders();
    assert!((9..=11).contains(&renders), "{} renders in 1s", renders);

    h.input.clockwise();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(h.stats.renders(), renders + 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_frames_are_not_redispatched() {
    let metrics = Metrics::new();
    let screens: Vec<Arc<dyn Screen>> = vec![Arc::new(solid_page("red", Rgb888::RED, &metrics))];
    let h = Harness::start(screens, None);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.last_color(), Some(Rgb888::RED));
    // at most the placeholder before the first fetch, then red
    let dispatched = h.stats.dispatched();
    assert!(dispatched <= 2);
    assert!(h.stats.renders() > 20);

    let panel = h.stop().await;
    let state = panel.lock().unwrap();
    assert_eq!(state.frames_written as u64, dispatched);
    assert_eq!(state.clear_count, 1);
    assert!(state.last_frame.as_ref().unwrap().is_blank());
}

#[tokio::test(start_paused = true)]
async fn test_special_window_lifecycle() {
    let metrics = Metrics::new();
    let screens: Vec<Arc<dyn Screen>> = vec![
        Arc::new(solid_page("red", Rgb888::RED, &metrics)),
        Arc::new(solid_page("green", Rgb888::GREEN, &metrics)),
    ];

    let tokens = Arc::new(Mutex::new(Vec::<CancellationToken>::new()));
    let made = tokens.clone();
    let m = metrics.clone();
    let factory: SpecialFactory = Box::new(move || -> Box<dyn Screen> {
        let page = solid_page("fish", Rgb888::BLUE, &m);
        made.lock().unwrap().push(page.source().cancellation_token());
        Box::new(page)
    });

    let h = Harness::start(screens, Some(factory));
    h.set_clock(at(11, 10));
    h.settle().await;
    h.input.clockwise();
    h.settle().await;
    assert_eq!(h.last_color(), Some(Rgb888::GREEN));
    assert!(tokens.lock().unwrap().is_empty());

    h.set_clock(at(11, 11));
    for _ in 0..6 {
        h.settle().await;
    }
    assert_eq!(h.last_color(), Some(Rgb888::BLUE));
    {
        let tokens = tokens.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(!tokens[0].is_cancelled());
    }

    h.set_clock(at(11, 12));
    h.settle().await;
    assert_eq!(h.last_color(), Some(Rgb888::GREEN));
    {
        let tokens = tokens.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_cancelled());
    }

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_special_worker_stops_when_window_ends_in_off() {
    let metrics = Metrics::new();
    let screens: Vec<Arc<dyn Screen>> = vec![Arc::new(solid_page("red", Rgb888::RED, &metrics))];

    let tokens = Arc::new(Mutex::new(Vec::<CancellationToken>::new()));
    let made = tokens.clone();
    let m = metrics.clone();
    let factory: SpecialFactory = Box::new(move || -> Box<dyn Screen> {
        let page = solid_page("fish", Rgb888::BLUE, &m);
        made.lock().unwrap().push(page.source().cancellation_token());
        Box::new(page)
    });

    let h = Harness::start(screens, Some(factory));
    h.set_clock(at(11, 11));
    for _ in 0..4 {
        h.settle().await;
    }
    assert_eq!(h.last_color(), Some(Rgb888::BLUE));

    // Main -> Menu -> Off, then let the window close
    h.input.press();
    h.input.clockwise();
    h.input.press();
    h.settle().await;
    assert!(h.last_frame().is_blank());

    h.set_clock(at(12, 30));
    tokio::time::sleep(Duration::from_secs(60)).await;
    {
        let tokens = tokens.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_cancelled());
    }
    let fish_fetches = metrics.get("fish").map_or(0, |m| m.fetches);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(metrics.get("fish").map_or(0, |m| m.fetches), fish_fetches);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_disabled_screens_fall_back_to_placeholder() {
    let metrics = Metrics::new();
    let red: Arc<dyn Screen> = Arc::new(solid_page("red", Rgb888::RED, &metrics));
    let green: Arc<dyn Screen> = Arc::new(solid_page("green", Rgb888::GREEN, &metrics));
    let h = Harness::start(vec![red.clone(), green.clone()], None);
    h.settle().await;

    red.set_enabled(false);
    green.set_enabled(false);
    h.settle().await;
    assert_eq!(h.last_frame(), no_connection::placeholder(PanelSize::P64x64, at(9, 0)));

    green.set_enabled(true);
    h.settle().await;
    assert_eq!(h.last_color(), Some(Rgb888::GREEN));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_brightness_flow_reaches_panel() {
    let metrics = Metrics::new();
    let screens: Vec<Arc<dyn Screen>> = vec![Arc::new(solid_page("red", Rgb888::RED, &metrics))];
    let h = Harness::start(screens, None);
    h.settle().await;
    assert_eq!(h.panel.lock().unwrap().last_brightness, Some(60));

    // Main -> Menu -> Brightness
    h.input.press();
    h.input.clockwise();
    h.input.clockwise();
    h.input.press();
    for _ in 0..6 {
        h.input.clockwise();
    }
    h.settle().await;
    assert_eq!(h.panel.lock().unwrap().last_brightness, Some(100));

    for _ in 0..12 {
        h.input.counter_clockwise();
    }
    h.settle().await;
    assert_eq!(h.panel.lock().unwrap().last_brightness, Some(0));

    h.input.press();
    h.settle().await;
    assert_eq!(h.last_color(), Some(Rgb888::RED));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_screens_toggle_and_back() {
    let metrics = Metrics::new();
    let red: Arc<dyn Screen> = Arc::new(solid_page("red", Rgb888::RED, &metrics));
    let green: Arc<dyn Screen> = Arc::new(solid_page("green", Rgb888::GREEN, &metrics));
    let h = Harness::start(vec![red.clone(), green.clone()], None);
    h.settle().await;

    // Main -> Menu -> Screens, disable red
    h.input.press();
    for _ in 0..3 {
        h.input.clockwise();
    }
    h.input.press();
    h.input.clockwise();
    h.input.press();
    h.settle().await;
    assert!(!red.is_enabled());
    assert!(green.is_enabled());

    // back to Menu, which still has Screens selected; wrap to Home
    h.input.counter_clockwise();
    h.input.press();
    h.input.clockwise();
    h.input.press();
    h.settle().await;
    assert_eq!(h.last_color(), Some(Rgb888::GREEN));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_menu_wraps_back_to_home() {
    let metrics = Metrics::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetcher = FnFetch::new(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, FetchError>(Rgb888::RED) }
        },
        || Rgb888::RED,
    );
    let policy = RefreshPolicy::new(Duration::from_secs(5), FETCH_TIMEOUT);
    let page = Page::new(RefreshableSource::spawn("red", fetcher, policy, metrics), solid);
    let h = Harness::start(vec![Arc::new(page)], None);
    h.settle().await;

    h.input.press();
    h.settle().await;
    assert_ne!(h.last_color(), Some(Rgb888::RED));

    // four options without network
    for _ in 0..4 {
        h.input.clockwise();
    }
    h.input.press();
    h.settle().await;
    assert_eq!(h.last_color(), Some(Rgb888::RED));
    assert!(calls.load(Ordering::SeqCst) >= 1);

    h.stop().await;
}
