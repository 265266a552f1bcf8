//! Shared test utilities for the batch-expand test suite.
//!
//! Provides synthetic images, intake fixtures and a scripted
//! [`ImageExpander`] that records what it was asked to do.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let expander = MockExpander::new().failing_on(1, ServiceError::NoResponse);
//! let file = accepted_file("dawn.png", 40, 30);
//! // ... run the pipeline against `expander` ...
//! assert_eq!(expander.calls().len(), 2);
//! ```

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::imaging::codec::{decode_bytes, encode_png};
use crate::intake::{AcceptedFile, SourceFile};
use crate::service::{ExpandRequest, ImageExpander, ServiceError};

// =========================================================================
// Synthetic images
// =========================================================================

/// Opaque RGBA image whose pixels encode their own coordinates.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    });
    DynamicImage::ImageRgba8(img)
}

pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    encode_png(img).unwrap()
}

/// Accepted upload of a gradient image, as if it had passed intake.
pub fn accepted_file(name: &str, width: u32, height: u32) -> AcceptedFile {
    let image = gradient_image(width, height);
    AcceptedFile {
        source: SourceFile {
            name: name.to_string(),
            bytes: png_bytes(&image),
        },
        image,
    }
}

// =========================================================================
// Scripted expander
// =========================================================================

/// What the mock saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub prompt: String,
}

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

/// Expander that answers with a solid canvas of the requested size.
///
/// Calls are numbered from zero. Individual calls can be scripted to fail,
/// and a hook can run before each call returns (e.g. to mutate the queue
/// while a job is in flight). Uses Mutex so it is Sync like the real client.
pub struct MockExpander {
    fill: Rgba<u8>,
    failures: Mutex<HashMap<usize, ServiceError>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Option<Duration>,
    on_call: Option<CallHook>,
}

impl MockExpander {
    pub fn new() -> Self {
        Self {
            fill: Rgba([10, 200, 30, 255]),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
            on_call: None,
        }
    }

    pub fn failing_on(self, call: usize, error: ServiceError) -> Self {
        self.failures.lock().unwrap().insert(call, error);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn on_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    pub fn fill(&self) -> Rgba<u8> {
        self.fill
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageExpander for MockExpander {
    async fn expand(&self, request: &ExpandRequest<'_>) -> Result<Vec<u8>, ServiceError> {
        let canvas = decode_bytes(request.image).unwrap();
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecordedCall {
                mime_type: request.mime_type.to_string(),
                width: canvas.width(),
                height: canvas.height(),
                prompt: request.prompt.to_string(),
            });
            calls.len() - 1
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(hook) = &self.on_call {
            hook(index);
        }
        if let Some(err) = self.failures.lock().unwrap().remove(&index) {
            return Err(err);
        }

        let out = RgbaImage::from_pixel(canvas.width(), canvas.height(), self.fill);
        Ok(png_bytes(&DynamicImage::ImageRgba8(out)))
    }
}
