//! End-to-end tests against a real tokio-tungstenite server on loopback.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use snaplink::{
	CaptureAdapter, ChannelSink, ClientConfig, Image, MemoryStore, StaticCapture, Supervisor,
};
use snaplink_protocol::{CommandReply, ConnectionState, LinkStatus, LocalCommand, UiEvent};
use snaplink_runtime::WebSocketConnector;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, accept_async};

const WAIT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

struct Server {
	endpoint: String,
	accepted: mpsc::UnboundedReceiver<ServerSocket>,
}

impl Server {
	async fn start() -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let endpoint = format!("ws://{}", listener.local_addr().unwrap());
		let (tx, accepted) = mpsc::unbounded_channel();
		tokio::spawn(async move {
			while let Ok((stream, _)) = listener.accept().await {
				if let Ok(ws) = accept_async(stream).await {
					if tx.send(ws).is_err() {
						break;
					}
				}
			}
		});
		Self { endpoint, accepted }
	}

	async fn accept(&mut self) -> ServerSocket {
		timeout(WAIT, self.accepted.recv())
			.await
			.expect("no client connected")
			.unwrap()
	}
}

async fn next_json(ws: &mut ServerSocket) -> Value {
	loop {
		let frame = timeout(WAIT, ws.next())
			.await
			.expect("no frame from client")
			.expect("client went away")
			.unwrap();
		if let WsMessage::Text(text) = frame {
			return serde_json::from_str(&text).unwrap();
		}
	}
}

async fn send_json(ws: &mut ServerSocket, value: Value) {
	ws.send(WsMessage::Text(value.to_string().into())).await.unwrap();
}

fn config(endpoint: &str) -> ClientConfig {
	let mut config = ClientConfig {
		endpoint: endpoint.to_string(),
		liveness_interval_ms: 0,
		close_timeout_ms: 500,
		..ClientConfig::default()
	};
	config.reconnect.interval_ms = 100;
	config
}

async fn wait_for_status(ui: &mut mpsc::UnboundedReceiver<UiEvent>, want: LinkStatus) -> u32 {
	loop {
		let event = timeout(WAIT, ui.recv()).await.expect("no ui event").unwrap();
		if let UiEvent::ConnectionStatus {
			status,
			attempt_count,
			..
		} = event
		{
			if status == want {
				return attempt_count;
			}
		}
	}
}

fn start(
	endpoint: &str,
	capture: CaptureAdapter,
) -> (Supervisor, mpsc::UnboundedReceiver<UiEvent>) {
	let (sink, ui) = ChannelSink::new();
	let client = Supervisor::builder(config(endpoint))
		.capture(capture)
		.sink(Arc::new(sink))
		.store(Arc::new(MemoryStore::new()))
		.start(WebSocketConnector)
		.unwrap();
	(client, ui)
}

#[tokio::test]
async fn handshake_then_capture_answer_with_echoed_id() {
	let mut server = Server::start().await;
	let capture = CaptureAdapter::new(Arc::new(StaticCapture(Ok(Image::png(vec![1, 2, 3])))));
	let (client, mut ui) = start(&server.endpoint, capture);

	let mut ws = server.accept().await;
	let hello = next_json(&mut ws).await;
	assert_eq!(hello["type"], "ping");
	assert_eq!(hello["message"], "Client connected");
	assert!(hello["timestamp"].is_i64());
	wait_for_status(&mut ui, LinkStatus::Connected).await;

	send_json(&mut ws, json!({"action": "capture", "id": "req-7"})).await;
	let result = next_json(&mut ws).await;
	assert_eq!(result["type"], "screenshot_result");
	assert_eq!(result["dataUrl"], "data:image/png;base64,AQID");
	assert_eq!(result["id"], "req-7");

	client.shutdown().await.unwrap();
}

#[tokio::test]
async fn unavailable_capture_reports_error_and_stays_open() {
	let mut server = Server::start().await;
	let (client, mut ui) = start(&server.endpoint, CaptureAdapter::unavailable());

	let mut ws = server.accept().await;
	next_json(&mut ws).await;
	wait_for_status(&mut ui, LinkStatus::Connected).await;

	send_json(&mut ws, json!({"action": "capture"})).await;
	let result = next_json(&mut ws).await;
	assert_eq!(result["type"], "error");
	assert!(
		result["error"]
			.as_str()
			.unwrap()
			.starts_with("Screenshot API not available")
	);
	assert!(result.get("dataUrl").is_none());
	assert_eq!(client.status().state, ConnectionState::Open);

	client.shutdown().await.unwrap();
}

#[tokio::test]
async fn server_pushes_reach_ui_and_commands_reach_server() {
	let mut server = Server::start().await;
	let (client, mut ui) = start(&server.endpoint, CaptureAdapter::unavailable());

	let mut ws = server.accept().await;
	next_json(&mut ws).await;
	wait_for_status(&mut ui, LinkStatus::Connected).await;

	send_json(
		&mut ws,
		json!({"type": "server_message", "data": {"type": "pong", "message": "pong"}}),
	)
	.await;
	let event = timeout(WAIT, ui.recv()).await.unwrap().unwrap();
	match event {
		UiEvent::ServerMessage { data } => assert_eq!(data["type"], "pong"),
		other => panic!("unexpected ui event {other:?}"),
	}

	let reply = client
		.command(LocalCommand::SendToServer {
			data: json!({"type": "echo", "message": "hi"}),
		})
		.await;
	assert_eq!(reply, CommandReply::ok());
	assert_eq!(
		next_json(&mut ws).await,
		json!({"type": "echo", "message": "hi"})
	);

	assert_eq!(
		client.command(LocalCommand::GetConnectionStatus).await,
		CommandReply::Status {
			status: LinkStatus::Connected,
			attempt_count: 0,
		}
	);

	client.shutdown().await.unwrap();
}

#[tokio::test]
async fn reconnects_after_server_drops_connection() {
	let mut server = Server::start().await;
	let (client, mut ui) = start(&server.endpoint, CaptureAdapter::unavailable());

	let mut first = server.accept().await;
	next_json(&mut first).await;
	wait_for_status(&mut ui, LinkStatus::Connected).await;
	drop(first);

	let attempts = wait_for_status(&mut ui, LinkStatus::Connecting).await;
	assert!(attempts >= 1);

	let mut second = server.accept().await;
	assert_eq!(next_json(&mut second).await["type"], "ping");
	assert_eq!(wait_for_status(&mut ui, LinkStatus::Connected).await, 0);
	assert_eq!(client.status().attempt_count, 0);

	client.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_closes_and_never_redials() {
	let mut server = Server::start().await;
	let (client, mut ui) = start(&server.endpoint, CaptureAdapter::unavailable());

	let mut ws = server.accept().await;
	next_json(&mut ws).await;
	wait_for_status(&mut ui, LinkStatus::Connected).await;

	let peer = tokio::spawn(async move {
		// drain until the client's close completes
		while let Some(Ok(_)) = ws.next().await {}
	});
	timeout(WAIT, client.shutdown()).await.unwrap().unwrap();
	peer.await.unwrap();

	tokio::time::sleep(Duration::from_millis(300)).await;
	assert!(server.accepted.try_recv().is_err());
}
