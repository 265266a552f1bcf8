//! # batch-expand
//!
//! Batch canvas expansion for photos. Give it a set of images and a target
//! aspect ratio; it grows each canvas to that ratio, has a generative image
//! model paint the new border, and packages the results for download.
//!
//! # Architecture: One Job, Five Steps
//!
//! Every accepted image becomes a job in an in-memory queue and is driven
//! through the same pipeline:
//!
//! ```text
//! 1. Geometry    original + ratio  →  canvas size + offset
//! 2. Mask        original          →  magenta canvas with the original centred
//! 3. Model       masked PNG        →  full-frame generated image
//! 4. Composite   generated         →  generated with the original pixels on top
//! 5. Export      done jobs         →  zip archive (or separate files)
//! ```
//!
//! Steps 1, 2 and 4 are pure pixel work with no I/O, so they are tested
//! without a network. Step 3 sits behind the
//! [`ImageExpander`](service::ImageExpander) trait so tests swap in a mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Aspect ratio presets and parsing, download formats |
//! | [`imaging`] | Geometry math, mask/composite, decode/encode |
//! | [`service`] | Model request adapter, response classification, Gemini transport |
//! | [`intake`] | Upload validation (size, dimensions, readability) and directory walking |
//! | [`preview`] | Revocable handles to decoded originals |
//! | [`jobs`] | Job queue and per-job state machine |
//! | [`pipeline`] | Steps 1–4 for a single image |
//! | [`batch`] | Sequential, throttled batch runner with a single-run guard |
//! | [`naming`] | Download file names |
//! | [`export`] | Re-encoding and zip packaging |
//! | [`config`] | `config.toml` loading, validation, merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Original Always Wins
//!
//! The model sees a copy of the image and may soften or shift it. The final
//! composite therefore pastes the untouched original back over the model's
//! output at the computed offset: only the new border comes from the model.
//!
//! ## Magenta Sentinel
//!
//! The region to fill is painted solid `#FF00FF` and the prompt names that
//! colour, rather than sending a separate alpha mask. This works with any
//! model that accepts an image and an instruction.
//!
//! ## One Request at a Time
//!
//! Jobs in a batch are processed strictly in order with a configurable pause
//! between requests. A failing job is recorded on the job and the batch moves
//! on; nothing is retried automatically. Re-running picks up failed and
//! still-queued jobs only.
//!
//! ## State in Types
//!
//! A job's output image and its error message live inside its state variant,
//! so a job cannot be done without an image or carry an error while not
//! failed. Preview handles release their registration on drop, so removing a
//! job or resetting the queue cannot leak them.

pub mod batch;
pub mod config;
pub mod export;
pub mod imaging;
pub mod intake;
pub mod jobs;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
