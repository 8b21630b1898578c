use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender, unbounded};
use tempfile::TempDir;

use super::LiveServer;
use crate::actor::{BuildError, BuildKind, BuildOutcome};
use crate::compiler::{ArtifactId, RenderContext, Rendered, Renderer, SiteRenderer};
use crate::config::{Overrides, SiteConfig};
use crate::core::{ChangeEvent, ShutdownHandle};
use crate::lazy::Gate;

const TIMEOUT: Duration = Duration::from_secs(10);

const SERVE: &str = "[serve]\nport = 0\nwatch = false\n";

const HOME: &str = "<h1>List: {{ site.title }}</h1>\n<ul>{{#data.testdata}}<li>{{ key }}: {{ value }}</li>{{/data.testdata}}</ul>";

// =============================================================================
// Helpers
// =============================================================================

fn site(files: &[(&str, &str)]) -> (TempDir, SiteConfig) {
    let dir = TempDir::new().unwrap();
    for (path, body) in files {
        write(dir.path(), path, body);
    }
    let config = SiteConfig::load_with(&dir.path().join("kiln.toml"), Overrides::default()).unwrap();
    (dir, config)
}

fn write(root: &Path, path: &str, body: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn data_site() -> (TempDir, SiteConfig) {
    site(&[
        ("kiln.toml", &format!("[site]\ntitle = \"Hugo Rocks!\"\n{SERVE}")),
        ("layouts/index.html", HOME),
        ("data/testdata.json", r#"{"v1": "a", "v2": "b"}"#),
        ("content/a.md", "A"),
    ])
}

struct Reply {
    status: u16,
    headers: String,
    body: String,
}

impl Reply {
    fn generation(&self) -> Option<u64> {
        let name = format!("{}:", super::GENERATION_HEADER.to_ascii_lowercase());
        self.headers
            .lines()
            .find_map(|line| line.to_ascii_lowercase().strip_prefix(&name).map(str::to_string))
            .and_then(|value| value.trim().parse().ok())
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

fn http(addr: SocketAddr, method: &str, path: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(TIMEOUT)).unwrap();
    write!(
        stream,
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    )
    .unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((&raw, ""));
    let (status_line, headers) = head.split_once("\r\n").unwrap_or((head, ""));
    let status = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();

    Reply {
        status,
        headers: headers.to_string(),
        body: body.to_string(),
    }
}

fn get(addr: SocketAddr, path: &str) -> Reply {
    http(addr, "GET", path)
}

/// A server with its request loop on a background thread.
struct Harness {
    server: Arc<LiveServer>,
    thread: JoinHandle<Result<(), BuildError>>,
}

impl Harness {
    fn start(config: SiteConfig) -> Self {
        Self::start_with(config, Arc::new(SiteRenderer))
    }

    fn start_with(config: SiteConfig, renderer: Arc<dyn Renderer>) -> Self {
        let server = Arc::new(LiveServer::start_with(config, renderer, ShutdownHandle::new()).unwrap());
        let runner = Arc::clone(&server);
        let thread = thread::spawn(move || runner.run());
        Self { server, thread }
    }

    fn addr(&self) -> SocketAddr {
        self.server.addr()
    }

    fn stop(self) -> Result<(), BuildError> {
        self.server.shutdown();
        self.thread.join().unwrap()
    }
}

fn next(outcomes: &Receiver<BuildOutcome>) -> BuildOutcome {
    outcomes.recv_timeout(TIMEOUT).expect("no outcome in time")
}

/// Blocks rendering `target` while armed, until the gate fires.
struct Blocking {
    target: ArtifactId,
    gate: Gate,
    armed: AtomicBool,
    started: Sender<()>,
}

fn blocking(target: ArtifactId, armed: bool) -> (Arc<Blocking>, Receiver<()>) {
    let (started, rx) = unbounded();
    let renderer = Blocking {
        target,
        gate: Gate::new(),
        armed: AtomicBool::new(armed),
        started,
    };
    (Arc::new(renderer), rx)
}

impl Renderer for Blocking {
    fn discover(&self, config: &SiteConfig) -> anyhow::Result<Vec<ArtifactId>> {
        SiteRenderer.discover(config)
    }

    fn render(&self, id: &ArtifactId, ctx: &RenderContext<'_>) -> Rendered {
        if *id == self.target && self.armed.load(Ordering::SeqCst) {
            let _ = self.started.send(());
            self.gate.wait();
        }
        SiteRenderer.render(id, ctx)
    }
}

// =============================================================================
// Serving
// =============================================================================

#[test]
fn test_data_error_keeps_serving_last_good_output() {
    let (dir, config) = data_site();
    let data = config.build.data.join("testdata.json");
    let harness = Harness::start(config);
    assert_eq!(harness.server.wait_ready(), Ok(1));

    let before = get(harness.addr(), "/");
    assert_eq!(before.status, 200);
    assert_eq!(before.generation(), Some(1));
    assert!(before.body.contains("List: Hugo Rocks!"));
    assert_eq!(before.body.matches("<li>").count(), 2);

    let outcomes = harness.server.outcomes();
    write(dir.path(), "data/testdata.json", r#"{"v1": "a", "v2": "#);
    assert!(harness.server.notify(vec![ChangeEvent::modified(data.clone())]));
    let failed = next(&outcomes);
    assert!(!failed.ok());

    let during = get(harness.addr(), "/");
    assert_eq!(during.status, 200);
    assert_eq!(during.generation(), Some(1));
    assert_eq!(during.body, before.body);

    let status = get(harness.addr(), "/__kiln/status").json();
    assert_eq!(status["generation"], 1);
    assert_eq!(status["ok"], false);
    assert!(status["error"].as_str().unwrap().contains("testdata.json"));

    write(dir.path(), "data/testdata.json", r#"{"v1": "a", "v2": "b", "v3": "c"}"#);
    assert!(harness.server.notify(vec![ChangeEvent::modified(data)]));
    let fixed = next(&outcomes);
    assert!(fixed.ok(), "{:?}", fixed.error);
    assert_eq!(fixed.generation, 2);

    let after = get(harness.addr(), "/");
    assert_eq!(after.generation(), Some(2));
    assert_eq!(after.body.matches("<li>").count(), 3);
    assert!(after.body.contains("<li>v3: c</li>"));

    let status = get(harness.addr(), "/__kiln/status").json();
    assert_eq!(status["generation"], 2);
    assert_eq!(status["ok"], true);
    assert!(status["error"].is_null());

    assert_eq!(harness.stop(), Ok(()));
}

#[test]
fn test_pages_not_found_and_head() {
    let (_dir, config) = data_site();
    let harness = Harness::start(config);
    harness.server.wait_ready().unwrap();

    let page = get(harness.addr(), "/a/");
    assert_eq!(page.status, 200);
    assert!(page.body.contains("<p>A</p>"));

    let missing = get(harness.addr(), "/missing/");
    assert_eq!(missing.status, 404);
    assert!(missing.body.contains("404 Page not found"));

    let escape = get(harness.addr(), "/../kiln.toml");
    assert_eq!(escape.status, 404);

    let head = http(harness.addr(), "HEAD", "/");
    assert_eq!(head.status, 200);
    assert!(head.body.is_empty());
    assert_eq!(head.generation(), Some(1));

    assert_eq!(harness.stop(), Ok(()));
}

#[test]
fn test_explicit_full_rebuild() {
    let (_dir, config) = data_site();
    let harness = Harness::start(config);
    harness.server.wait_ready().unwrap();

    let outcomes = harness.server.outcomes();
    assert!(harness.server.rebuild());
    let outcome = next(&outcomes);
    assert_eq!((outcome.generation, outcome.kind), (2, BuildKind::Full));
    assert_eq!(harness.server.state().last_good_generation, 2);

    assert_eq!(harness.stop(), Ok(()));
}

#[test]
fn test_unavailable_until_first_build() {
    let (_dir, config) = data_site();
    let (renderer, started) = blocking(ArtifactId::Home, true);
    let harness = Harness::start_with(config, renderer.clone());
    started.recv_timeout(TIMEOUT).unwrap();

    let pending = get(harness.addr(), "/");
    assert_eq!(pending.status, 503);
    assert!(pending.headers.to_ascii_lowercase().contains("retry-after"));

    let status = get(harness.addr(), "/__kiln/status").json();
    assert_eq!(status["ready"], false);
    assert_eq!(status["running"], true);

    renderer.gate.fire();
    assert_eq!(harness.server.wait_ready(), Ok(1));
    assert_eq!(get(harness.addr(), "/").status, 200);

    assert_eq!(harness.stop(), Ok(()));
}

// =============================================================================
// Startup failures
// =============================================================================

#[test]
fn test_startup_build_failure_stops_server() {
    let (_dir, config) = site(&[
        ("kiln.toml", SERVE),
        ("data/testdata.json", "{"),
    ]);
    let server = LiveServer::start(config, ShutdownHandle::new()).unwrap();

    let result = server.run();
    assert!(matches!(result, Err(BuildError::StartupFatal(_))), "{result:?}");
    assert!(server.shutdown_handle().is_shutdown());
    assert!(!server.state().running);
}

#[test]
fn test_invalid_config_binds_nothing() {
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let dir = TempDir::new().unwrap();
    let config = format!("[build]\nmode = \"staging\"\n[serve]\nport = {port}\nwatch = false\n");
    write(dir.path(), "kiln.toml", &config);

    let result = LiveServer::open(
        &dir.path().join("kiln.toml"),
        Overrides::default(),
        ShutdownHandle::new(),
    );
    let Err(BuildError::StartupFatal(message)) = result else {
        panic!("expected a startup failure");
    };
    assert!(message.contains("build.mode"), "{message}");
    assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn test_shutdown_before_first_build() {
    let (_dir, config) = data_site();
    let (renderer, started) = blocking(ArtifactId::Home, true);
    let harness = Harness::start_with(config, renderer.clone());
    started.recv_timeout(TIMEOUT).unwrap();

    let ready = harness.server.ready_handle();
    let server = Arc::clone(&harness.server);
    assert_eq!(harness.stop(), Ok(()));

    let Err(BuildError::Recoverable(message)) = ready.wait() else {
        panic!("waiters must be released by shutdown");
    };
    assert!(message.contains("shut down"));
    assert!(!server.state().running);
    renderer.gate.fire();
}

#[test]
fn test_shutdown_during_rebuild_is_bounded() {
    let (_dir, config) = data_site();
    let page = config.build.content.join("a.md");
    let (renderer, started) = blocking(ArtifactId::Page("a.md".into()), false);
    let harness = Harness::start_with(config, renderer.clone());
    harness.server.wait_ready().unwrap();

    renderer.armed.store(true, Ordering::SeqCst);
    fs::write(&page, "changed").unwrap();
    assert!(harness.server.notify(vec![ChangeEvent::modified(page)]));
    started.recv_timeout(TIMEOUT).unwrap();

    let server = Arc::clone(&harness.server);
    let begin = Instant::now();
    assert_eq!(harness.stop(), Ok(()));
    assert!(begin.elapsed() < Duration::from_secs(5), "{:?}", begin.elapsed());
    assert!(!server.state().running);
    renderer.gate.fire();
}

#[test]
fn test_shutdown_releases_port() {
    let (_dir, config) = data_site();
    let harness = Harness::start(config);
    harness.server.wait_ready().unwrap();
    assert_eq!(get(harness.addr(), "/").status, 200);

    let addr = harness.addr();
    let server = Arc::clone(&harness.server);
    assert_eq!(harness.stop(), Ok(()));

    // The listener closes on the accept thread shortly after the last handle drops.
    let deadline = Instant::now() + TIMEOUT;
    while let Err(err) = TcpListener::bind(addr) {
        assert!(Instant::now() < deadline, "port still bound after shutdown: {err}");
        thread::sleep(Duration::from_millis(20));
    }
    assert!(!server.state().running);
}

#[test]
fn test_shutdown_after_failed_rebuild() {
    let (dir, config) = data_site();
    let data = config.build.data.join("testdata.json");
    let harness = Harness::start(config);
    harness.server.wait_ready().unwrap();

    let outcomes = harness.server.outcomes();
    write(dir.path(), "data/testdata.json", "[");
    assert!(harness.server.notify(vec![ChangeEvent::modified(data)]));
    assert!(!next(&outcomes).ok());
    assert!(harness.server.state().current_error.is_some());

    assert_eq!(harness.stop(), Ok(()));
}
