//! Visible-surface capture behind a provider trait.
//!
//! The [`CaptureAdapter`] is what the router talks to. It owns at most one
//! [`CaptureProvider`], never retries, and normalizes "no provider" and
//! "empty image" into [`CaptureError`] variants so every failure reaches the
//! peer as a single `error` result.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use thiserror::Error;

pub const PNG_MIME: &str = "image/png";

/// An encoded still image.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
	pub bytes: Vec<u8>,
	pub mime: String,
}

impl Image {
	pub fn png(bytes: Vec<u8>) -> Self {
		Self {
			bytes,
			mime: PNG_MIME.to_string(),
		}
	}

	/// `data:<mime>;base64,<payload>` as carried on the wire.
	pub fn to_data_url(&self) -> String {
		format!("data:{};base64,{}", self.mime, BASE64_STANDARD.encode(&self.bytes))
	}
}

impl fmt::Debug for Image {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Image")
			.field("mime", &self.mime)
			.field("len", &self.bytes.len())
			.finish()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
	/// No provider, or the provider's backing tool is missing.
	#[error("Screenshot API not available: {0}")]
	Unavailable(String),

	#[error("No screenshot data received")]
	Empty,

	#[error("Screenshot failed: {0}")]
	Platform(String),
}

pub type CaptureFuture<'a> = Pin<Box<dyn Future<Output = Result<Image, CaptureError>> + Send + 'a>>;

pub trait CaptureProvider: Send + Sync {
	fn capture(&self) -> CaptureFuture<'_>;
}

#[derive(Clone, Default)]
pub struct CaptureAdapter {
	provider: Option<Arc<dyn CaptureProvider>>,
}

impl CaptureAdapter {
	pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
		Self {
			provider: Some(provider),
		}
	}

	/// An adapter whose every capture fails with [`CaptureError::Unavailable`].
	pub fn unavailable() -> Self {
		Self::default()
	}

	pub fn is_available(&self) -> bool {
		self.provider.is_some()
	}

	pub async fn capture_visible_surface(&self) -> Result<Image, CaptureError> {
		let provider = self
			.provider
			.as_ref()
			.ok_or_else(|| CaptureError::Unavailable("no capture provider configured".into()))?;
		let image = provider.capture().await?;
		if image.bytes.is_empty() {
			return Err(CaptureError::Empty);
		}
		Ok(image)
	}
}

impl fmt::Debug for CaptureAdapter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CaptureAdapter")
			.field("available", &self.is_available())
			.finish()
	}
}

/// Provider returning a fixed result; useful for wiring and tests.
#[derive(Debug, Clone)]
pub struct StaticCapture(pub Result<Image, CaptureError>);

impl CaptureProvider for StaticCapture {
	fn capture(&self) -> CaptureFuture<'_> {
		let result = self.0.clone();
		Box::pin(async move { result })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn data_url_is_base64_png() {
		let image = Image::png(vec![0x89, b'P', b'N', b'G']);
		assert_eq!(image.to_data_url(), "data:image/png;base64,iVBORw==");
	}

	#[tokio::test]
	async fn missing_provider_is_unavailable() {
		let err = CaptureAdapter::unavailable()
			.capture_visible_surface()
			.await
			.unwrap_err();
		assert!(matches!(err, CaptureError::Unavailable(_)));
	}

	#[tokio::test]
	async fn empty_image_is_rejected() {
		let adapter = CaptureAdapter::new(Arc::new(StaticCapture(Ok(Image::png(Vec::new())))));
		assert_eq!(
			adapter.capture_visible_surface().await,
			Err(CaptureError::Empty)
		);
	}

	#[tokio::test]
	async fn provider_errors_pass_through() {
		let adapter = CaptureAdapter::new(Arc::new(StaticCapture(Err(CaptureError::Platform(
			"compositor refused".into(),
		)))));
		let err = adapter.capture_visible_surface().await.unwrap_err();
		assert_eq!(err.to_string(), "Screenshot failed: compositor refused");
	}
}
