//! Polling fallback against a loopback axum server.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::routing::{get, post};
use parking_lot::Mutex;
use serde_json::{Value, json};
use snaplink::{
	CaptureAdapter, CaptureError, Image, PollConfig, PollOutcome, Poller, StaticCapture,
};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(Debug, Clone)]
struct Request {
	method: &'static str,
	path: &'static str,
	body: Value,
}

#[derive(Clone)]
struct PollServer {
	status: Value,
	requests: Arc<Mutex<Vec<Request>>>,
}

impl PollServer {
	fn log(&self, method: &'static str, path: &'static str, body: Value) {
		self.requests.lock().push(Request { method, path, body });
	}
}

struct Running {
	base_url: String,
	requests: Arc<Mutex<Vec<Request>>>,
}

impl Running {
	/// Answers `/check-status` with `status` and uploads with `{}`.
	async fn start(status: Value) -> Self {
		let requests = Arc::new(Mutex::new(Vec::new()));
		let state = PollServer {
			status,
			requests: Arc::clone(&requests),
		};
		let app = axum::Router::new()
			.route("/check-status", get(check_status))
			.route("/upload-screenshot", post(upload_screenshot))
			.with_state(state);

		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let base_url = format!("http://{}", listener.local_addr().unwrap());
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		Self { base_url, requests }
	}

	fn requests(&self) -> Vec<Request> {
		self.requests.lock().clone()
	}
}

async fn check_status(State(server): State<PollServer>) -> Json<Value> {
	server.log("GET", "/check-status", Value::Null);
	Json(server.status.clone())
}

async fn upload_screenshot(
	State(server): State<PollServer>,
	Json(body): Json<Value>,
) -> Json<Value> {
	server.log("POST", "/upload-screenshot", body);
	Json(json!({}))
}

fn png_capture() -> CaptureAdapter {
	CaptureAdapter::new(Arc::new(StaticCapture(Ok(Image::png(vec![1, 2, 3])))))
}

#[tokio::test]
async fn idle_when_nothing_is_pending() {
	let server = Running::start(json!({"request": null})).await;
	let poller = Poller::new(PollConfig::new(&server.base_url), png_capture()).unwrap();

	assert_eq!(poller.poll_once().await.unwrap(), PollOutcome::Idle);
	let requests = server.requests();
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].method, "GET");
	assert_eq!(requests[0].path, "/check-status");
}

#[tokio::test]
async fn pending_request_uploads_screenshot() {
	let server = Running::start(json!({"request": {"id": "shot-9", "status": "pending"}})).await;
	let poller = Poller::new(PollConfig::new(format!("{}/", server.base_url)), png_capture()).unwrap();

	assert_eq!(
		poller.poll_once().await.unwrap(),
		PollOutcome::Uploaded {
			id: "shot-9".into()
		}
	);

	let requests = server.requests();
	let upload = requests
		.iter()
		.find(|r| r.path == "/upload-screenshot")
		.expect("no upload");
	assert_eq!(upload.method, "POST");
	assert_eq!(
		upload.body,
		json!({"id": "shot-9", "screenshotData": "data:image/png;base64,AQID"})
	);
}

#[tokio::test]
async fn numeric_id_is_echoed_unchanged() {
	let server = Running::start(json!({"request": {"id": 7}})).await;
	let poller = Poller::new(PollConfig::new(&server.base_url), png_capture()).unwrap();

	assert_eq!(
		poller.poll_once().await.unwrap(),
		PollOutcome::Uploaded { id: json!(7) }
	);
	let requests = server.requests();
	let upload = requests
		.iter()
		.find(|r| r.path == "/upload-screenshot")
		.expect("no upload");
	assert_eq!(upload.body["id"], json!(7));
}

#[tokio::test]
async fn capture_failure_drops_the_request() {
	let server = Running::start(json!({"request": {"id": "shot-1"}})).await;
	let capture = CaptureAdapter::new(Arc::new(StaticCapture(Err(CaptureError::Platform(
		"no display".into(),
	)))));
	let poller = Poller::new(PollConfig::new(&server.base_url), capture).unwrap();

	assert_eq!(
		poller.poll_once().await.unwrap(),
		PollOutcome::CaptureFailed {
			id: "shot-1".into(),
			error: "Screenshot failed: no display".into(),
		}
	);
	assert!(server.requests().iter().all(|r| r.path != "/upload-screenshot"));
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let base_url = format!("http://{}", listener.local_addr().unwrap());
	drop(listener);

	let poller = Poller::new(PollConfig::new(base_url), png_capture()).unwrap();
	assert!(poller.poll_once().await.is_err());
}

#[tokio::test]
async fn zero_interval_is_rejected() {
	let mut config = PollConfig::new("http://127.0.0.1:1");
	config.interval_ms = 0;
	assert!(Poller::new(config, png_capture()).is_err());
}

#[tokio::test]
async fn run_loop_stops_on_shutdown() {
	let server = Running::start(json!({"request": null})).await;
	let mut config = PollConfig::new(&server.base_url);
	config.interval_ms = 50;
	let poller = Poller::new(config, png_capture()).unwrap();

	let (stop, stopped) = watch::channel(false);
	let task = tokio::spawn(poller.run(stopped));
	tokio::time::sleep(Duration::from_millis(200)).await;
	stop.send(true).unwrap();
	tokio::time::timeout(Duration::from_secs(5), task)
		.await
		.unwrap()
		.unwrap();

	assert!(server.requests().len() >= 2);
}
