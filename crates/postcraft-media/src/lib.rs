//! Media generation for finalized posts.
//!
//! An image is produced in a single request. A video is a long-running
//! job that is submitted, polled until done, and then downloaded. The
//! [`MediaController`] runs at most one job per kind and records the
//! outcome in the state store.

pub mod controller;
pub mod error;
pub mod generator;
pub mod image;
pub mod video;

pub use controller::{JobOutcome, MediaController, MediaJob, StartOutcome};
pub use error::GenerationError;
pub use generator::MediaGenerator;
pub use image::{GeminiImageBackend, ImageBackend, ImageGenerator, MockImageBackend};
pub use video::{
    GeminiVideoBackend, ScriptedVideoBackend, VideoDownload, VideoGenerator, VideoJobBackend,
    VideoOperation,
};
