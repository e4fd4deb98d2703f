// THEORY:
// This file is the main entry point for the `flowlens` library crate. It defines
// the public API exposed to callers that own a webcam loop (a browser bridge, a
// desktop capture app, the bundled runner).
//
// The high-level interfaces are `FilterPipeline` (synchronous gallery, flow
// tracking and face filters) and `ParallelPipeline` (the same gallery fanned out
// over tokio workers), both configured by an `EngineConfig`. The building blocks
// in `core_modules` stay public so a caller can use a single filter or the flow
// estimator on its own; each is a pure function of caller-owned frames.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod image_helper;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::EngineConfig;
pub use core_modules::frame::frame::{FrameView, PixelBuffer};
pub use error::{Result, VisionError};
