//! Transport layer for the capture link.
//!
//! A [`Connector`] dials an endpoint and hands back [`TransportParts`]: a
//! sender for outbound frames and a receiver for inbound ones. The session
//! driver runs each half in its own task, so the halves never share a lock.
//!
//! [`WebSocketConnector`] is the production implementation; tests plug in
//! in-memory connectors behind the same traits.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::{Error, Result};
use crate::machine::ABNORMAL_CLOSURE;

/// Frame written by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
	Text(String),
	Close { code: u16, reason: String },
}

/// Item read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
	/// One UTF-8 JSON document, from a text or binary frame.
	Frame(Vec<u8>),
	Error(String),
	Closed { code: u16, reason: String },
}

pub trait TransportSender: Send {
	fn send(&mut self, frame: Outbound) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

pub trait TransportReceiver: Send {
	/// Next inbound item, or `None` once the transport is finished.
	fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Inbound>> + Send + '_>>;
}

/// Both halves of an open transport.
pub struct TransportParts {
	pub sender: Box<dyn TransportSender>,
	pub receiver: Box<dyn TransportReceiver>,
}

impl TransportParts {
	pub fn new(
		sender: impl TransportSender + 'static,
		receiver: impl TransportReceiver + 'static,
	) -> Self {
		Self {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
		}
	}
}

/// Opens transports to an endpoint.
pub trait Connector: Send + Sync + 'static {
	fn connect<'a>(
		&'a self,
		endpoint: &'a str,
	) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials `ws://` endpoints with tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
	fn connect<'a>(
		&'a self,
		endpoint: &'a str,
	) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			let (stream, response) =
				connect_async(endpoint)
					.await
					.map_err(|err| Error::ConnectionFailed {
						endpoint: endpoint.to_string(),
						message: err.to_string(),
					})?;
			debug!(
				target = "snaplink.session",
				endpoint,
				status = %response.status(),
				"websocket upgraded"
			);
			let (sink, stream) = stream.split();
			Ok(TransportParts::new(
				WebSocketSender { sink },
				WebSocketReceiver {
					stream,
					finished: false,
				},
			))
		})
	}
}

pub struct WebSocketSender {
	sink: SplitSink<WsStream, WsMessage>,
}

impl TransportSender for WebSocketSender {
	fn send(&mut self, frame: Outbound) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let message = match frame {
				Outbound::Text(text) => WsMessage::Text(text.into()),
				Outbound::Close { code, reason } => WsMessage::Close(Some(CloseFrame {
					code: CloseCode::from(code),
					reason: reason.into(),
				})),
			};
			self.sink.send(message).await?;
			Ok(())
		})
	}
}

pub struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
	finished: bool,
}

impl TransportReceiver for WebSocketReceiver {
	fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Inbound>> + Send + '_>> {
		Box::pin(async move {
			if self.finished {
				return None;
			}
			loop {
				match self.stream.next().await {
					Some(Ok(WsMessage::Text(text))) => {
						return Some(Inbound::Frame(text.as_bytes().to_vec()));
					}
					Some(Ok(WsMessage::Binary(bytes))) => return Some(Inbound::Frame(bytes.to_vec())),
					Some(Ok(WsMessage::Close(frame))) => {
						self.finished = true;
						let (code, reason) = frame
							.map(|frame| (u16::from(frame.code), frame.reason.to_string()))
							.unwrap_or((ABNORMAL_CLOSURE, String::new()));
						return Some(Inbound::Closed { code, reason });
					}
					Some(Ok(_)) => continue,
					Some(Err(err)) => {
						self.finished = true;
						return Some(Inbound::Error(err.to_string()));
					}
					None => {
						self.finished = true;
						return None;
					}
				}
			}
		})
	}
}
