//! Frame-driven tick loop.
//!
//! The [`Engine`] owns a [`World`] and drives it one frame at a time. Each
//! tick:
//!
//! 1. The [`Clock`] advances to the frame timestamp.
//! 2. All before-tick hooks run in registration order.
//! 3. Every registered system runs in registration order against the
//!    entities that match it.
//! 4. All after-tick hooks run in registration order.
//! 5. Entities queued with [`World::remove_entity`] are removed.
//! 6. If the engine is still running, the next frame is scheduled.
//!
//! Scheduling is explicit: the engine only records that a frame is pending.
//! A host (or [`Engine::pump`] with a [`FrameSource`]) delivers the
//! timestamp by calling [`Engine::tick`].
//!
//! # Example
//!
//! ```
//! use mote_engine::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig { seed: Some(1), ..Default::default() }).unwrap();
//! engine.world_mut()
//!     .create_component("Counter", ComponentTemplate::new().with("n", 0))
//!     .create_entity_with_alias("c", &["Counter"])
//!     .create_system("Count", &["Counter"], |_world, _entity, components| {
//!         let counter = components.get("Counter").unwrap();
//!         counter.set("n", counter.get_f64("n").unwrap() + 1.0);
//!     });
//!
//! let stop = engine.stop_handle();
//! engine.after_tick(move |_world, clock| {
//!     if clock.time() >= 100.0 {
//!         stop.stop();
//!     }
//! });
//!
//! engine.run();
//! let frames = engine.pump(&mut SyntheticFrames::new(10.0));
//!
//! assert_eq!(frames, 10);
//! assert!(!engine.is_running());
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use mote_ecs::world::World;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::frame::FrameSource;
use crate::EngineError;

/// A before- or after-tick hook.
pub type TickHook = Box<dyn FnMut(&mut World, &Clock)>;

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing of one system within a tick.
#[derive(Debug, Clone)]
pub struct SystemTiming {
    pub name: String,
    /// Entities the system was invoked for.
    pub visited: usize,
    pub elapsed: Duration,
}

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Per system, in execution order.
    pub system_times: Vec<SystemTiming>,
    /// Hooks, systems and removals together.
    pub total_time: Duration,
    /// Entities removed at the end of the tick.
    pub removed: usize,
}

// ---------------------------------------------------------------------------
// StopHandle
// ---------------------------------------------------------------------------

/// A cloneable handle to the engine's running flag.
///
/// Hooks and systems only see the [`World`], so a handle captured by the
/// callback is how they stop the engine mid-tick. Stopping never aborts the
/// current tick; it only prevents the next frame from being scheduled.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Rc<Cell<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The frame-driven update loop around a [`World`].
///
/// The engine is idle until [`run`](Self::run) or
/// [`run_once`](Self::run_once) schedules a frame. Misuse (running twice,
/// running while trace logging is on) is logged and ignored, like the
/// world's own fluent methods.
pub struct Engine {
    world: World,
    clock: Clock,
    running: Rc<Cell<bool>>,
    pending_frames: u32,
    trace_log_enabled: bool,
    before_tick: Vec<TickHook>,
    after_tick: Vec<TickHook>,
    frame_count: u64,
    config: EngineConfig,
    last_diagnostics: TickDiagnostics,
}

impl Engine {
    /// An engine around a fresh world configured by `config`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let world = match config.seed {
            Some(seed) => World::with_seed(seed),
            None => World::new(),
        };
        Self::with_world(world, config)
    }

    /// An engine around an existing world.
    ///
    /// The world's alias length is taken from `config`. If `config.seed` is
    /// set the generator is reseeded, restarting its stream even when the
    /// world already carries that seed.
    pub fn with_world(mut world: World, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        if let Some(seed) = config.seed {
            world.rng_mut().reseed(seed);
        }
        world.set_uid_length(config.uid_length);
        debug!(?config, "engine created");

        Ok(Self {
            world,
            clock: Clock::new(),
            running: Rc::new(Cell::new(false)),
            pending_frames: 0,
            trace_log_enabled: false,
            before_tick: Vec::new(),
            after_tick: Vec::new(),
            frame_count: 0,
            config,
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    // -- state machine ------------------------------------------------------

    /// Start running: schedule a frame and keep rescheduling after every tick.
    pub fn run(&mut self) -> &mut Self {
        trace!("run");
        if self.is_running() {
            warn!("engine is already running");
        } else if self.trace_log_enabled {
            warn!("cannot run while trace logging is enabled");
        } else {
            debug!("running engine");
            self.running.set(true);
            self.pending_frames = self.pending_frames.max(1);
        }
        self
    }

    /// Schedule exactly one more frame without entering the running state.
    ///
    /// Each call queues its own frame, so `run_once().run_once()` ticks twice.
    pub fn run_once(&mut self) -> &mut Self {
        trace!("run_once");
        if self.is_running() {
            warn!("engine is already running");
        } else {
            self.pending_frames = self.pending_frames.saturating_add(1);
            debug!(pending = self.pending_frames, "running engine once");
        }
        self
    }

    /// Leave the running state. An already scheduled frame still ticks once
    /// but does not reschedule.
    pub fn stop(&mut self) -> &mut Self {
        trace!("stop");
        self.running.set(false);
        self
    }

    /// A handle that can stop the engine from inside hooks and systems.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Rc::clone(&self.running),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Whether a frame is scheduled and waiting for [`tick`](Self::tick).
    pub fn frame_pending(&self) -> bool {
        self.pending_frames > 0
    }

    /// Frames scheduled and not yet ticked.
    pub fn pending_frames(&self) -> u32 {
        self.pending_frames
    }

    /// Turn trace logging on or off. Turning it on stops a running engine,
    /// and a traced engine refuses to [`run`](Self::run); use
    /// [`run_once`](Self::run_once) to step it.
    pub fn set_trace_log_enabled(&mut self, enabled: bool) -> &mut Self {
        if enabled && self.is_running() {
            warn!(enabled, "stopping engine while trace logging is enabled");
            self.stop();
        }
        self.trace_log_enabled = enabled;
        self
    }

    pub fn trace_log_enabled(&self) -> bool {
        self.trace_log_enabled
    }

    // -- frames -------------------------------------------------------------

    /// Execute one frame at `timestamp_ms`.
    ///
    /// Consumes one pending frame, if any. A running engine keeps exactly one
    /// frame scheduled. Returns whether another frame is pending.
    pub fn tick(&mut self, timestamp_ms: f64) -> bool {
        let tick_start = Instant::now();
        self.pending_frames = self.pending_frames.saturating_sub(1);
        self.clock.update(timestamp_ms);

        for hook in &mut self.before_tick {
            hook(&mut self.world, &self.clock);
        }

        let names: Vec<String> = self
            .world
            .system_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let mut system_times = Vec::with_capacity(names.len());
        for name in names {
            let sys_start = Instant::now();
            let visited = match self.world.try_run_system(&name) {
                Ok(visited) => visited,
                Err(error) => {
                    warn!(system = %name, error = %error, "system skipped");
                    0
                }
            };
            system_times.push(SystemTiming {
                name,
                visited,
                elapsed: sys_start.elapsed(),
            });
        }

        for hook in &mut self.after_tick {
            hook(&mut self.world, &self.clock);
        }

        let removed = self.world.apply_removals();
        self.frame_count += 1;

        if self.is_running() && self.pending_frames == 0 {
            self.pending_frames = 1;
        }

        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
            removed,
        };
        trace!(
            frame = self.frame_count,
            time = timestamp_ms,
            delta_time = self.clock.delta_time(),
            removed,
            "tick"
        );
        self.frame_pending()
    }

    /// Deliver frames from `source` until none is pending, the source runs
    /// dry or `max_frames` is reached. Returns the frames ticked.
    pub fn pump<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> u64 {
        let mut ticked = 0;
        while self.frame_pending() {
            if self
                .config
                .max_frames
                .is_some_and(|max| self.frame_count >= max)
            {
                debug!(frames = self.frame_count, "frame limit reached");
                self.stop();
                self.pending_frames = 0;
                break;
            }
            let Some(timestamp) = source.next_frame() else {
                debug!("frame source exhausted");
                break;
            };
            self.tick(timestamp);
            ticked += 1;
        }
        ticked
    }

    // -- hooks --------------------------------------------------------------

    /// Run `hook` at the start of every tick, before the systems.
    pub fn before_tick<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&mut World, &Clock) + 'static,
    {
        self.before_tick.push(Box::new(hook));
        self
    }

    /// Run `hook` at the end of every tick, after the systems.
    pub fn after_tick<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&mut World, &Clock) + 'static,
    {
        self.after_tick.push(Box::new(hook));
        self
    }

    /// Run `setup` against the world immediately.
    pub fn on_before_run<F>(&mut self, setup: F) -> &mut Self
    where
        F: FnOnce(&mut World),
    {
        trace!("on_before_run");
        setup(&mut self.world);
        self
    }

    // -- accessors ----------------------------------------------------------

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn into_world(self) -> World {
        self.world
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Frames ticked so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Diagnostics from the last tick (timing per system).
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
