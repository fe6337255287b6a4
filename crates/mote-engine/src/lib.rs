//! Mote Engine -- frame-driven update loop around the Mote ECS.
//!
//! This crate builds on [`mote_ecs`] to provide the simulation driver: an
//! [`Engine`](tick::Engine) that advances a [`Clock`](clock::Clock), runs
//! before-tick hooks, every system and after-tick hooks once per frame, and
//! reschedules itself while running. Frames come from a
//! [`FrameSource`](frame::FrameSource), so the same loop runs headless under
//! test with synthetic timestamps or paced to a wall clock.
//!
//! # Quick Start
//!
//! ```
//! use mote_engine::prelude::*;
//!
//! let config = EngineConfig { seed: Some(7), max_frames: Some(100), ..Default::default() };
//! let mut engine = Engine::new(config).unwrap();
//!
//! engine.world_mut().create_system("example", &[], |_world, _entity, _components| {
//!     // game logic here
//! });
//!
//! engine.run();
//! engine.pump(&mut SyntheticFrames::at_fps(60.0));
//! assert_eq!(engine.frame_count(), 100);
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod frame;
pub mod logging;
pub mod tick;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while setting up an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A configuration value is out of range.
    #[error("invalid engine configuration: {details}")]
    InvalidConfig { details: String },

    /// A configuration document could not be parsed.
    #[error("malformed engine configuration: {details}")]
    MalformedConfig { details: String },

    /// The tracing subscriber could not be installed.
    #[error("failed to initialise logging: {details}")]
    LoggingInit { details: String },
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use mote_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the ECS prelude.
    pub use mote_ecs::prelude::*;

    // Engine-specific exports.
    pub use crate::clock::Clock;
    pub use crate::config::EngineConfig;
    pub use crate::frame::{FrameSource, SyntheticFrames, WallClockFrames};
    pub use crate::logging::init_tracing;
    pub use crate::tick::{Engine, StopHandle, SystemTiming, TickDiagnostics, TickHook};
    pub use crate::EngineError;
}
