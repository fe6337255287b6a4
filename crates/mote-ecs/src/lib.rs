//! Mote ECS -- a small, dynamically-typed Entity Component System.
//!
//! Components are registered at runtime under string names with a
//! [`ComponentTemplate`](component::ComponentTemplate) of literal and
//! generated fields. Entities are addressed by string aliases and carry
//! shared, mutable [`ComponentInstance`](component::ComponentInstance)s.
//! Systems are callbacks over every entity that carries a required set of
//! components.
//!
//! # Quick Start
//!
//! ```
//! use mote_ecs::prelude::*;
//!
//! let mut world = World::with_seed(7);
//! world
//!     .create_component("Position", ComponentTemplate::new().with("x", 0).with("y", 0))
//!     .create_component("Velocity", ComponentTemplate::new().with("x", 1).with("y", 0))
//!     .create_entity_with_alias("ball", &["Position", "Velocity"])
//!     .create_system("Move", &["Position", "Velocity"], |_world, _entity, components| {
//!         let (Some(position), Some(velocity)) =
//!             (components.get("Position"), components.get("Velocity"))
//!         else {
//!             return;
//!         };
//!         let x = position.get_f64("x").unwrap_or_default();
//!         position.set("x", x + velocity.get_f64("x").unwrap_or_default());
//!     });
//!
//! for _ in 0..3 {
//!     world.run_system("Move");
//! }
//!
//! let ball = world.get_entity("ball").unwrap();
//! assert_eq!(ball.component("Position").unwrap().get_f64("x"), Some(3.0));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod query;
pub mod rng;
pub mod system;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// The fluent [`World`](world::World) methods log these as warnings and carry
/// on; the `try_` methods return them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EcsError {
    /// A component name was registered twice.
    #[error("component '{name}' is already registered")]
    DuplicateComponent { name: String },

    /// A system name was registered twice.
    #[error("system '{name}' is already registered")]
    DuplicateSystem { name: String },

    /// An entity alias is already taken.
    #[error("entity '{alias}' already exists")]
    DuplicateEntity { alias: String },

    /// A component name was referenced that has not been registered.
    #[error("component '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// No entity carries the alias.
    #[error("entity '{alias}' does not exist")]
    UnknownEntity { alias: String },

    #[error("system '{name}' does not exist")]
    UnknownSystem { name: String },

    /// The handle was removed (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// Entity creation named components without a template; nothing was
    /// stored.
    #[error("entity '{alias}' not created, missing components: [{missing}]")]
    IncompleteEntity { alias: String, missing: String },

    /// A system tried to run itself from inside its own callback.
    #[error("system '{name}' is already running")]
    SystemAlreadyRunning { name: String },

    #[error("malformed filter: {details}")]
    MalformedFilter { details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{
        ComponentId, ComponentInstance, ComponentMask, ComponentRegistry, ComponentTemplate,
        FieldValue,
    };
    pub use crate::entity::{Components, Entity, EntityId};
    pub use crate::query::{strict_eq, FieldConstraint, FilterMode, QueryFilter};
    pub use crate::rng::RandomGenerator;
    pub use crate::system::{SystemCallback, SystemId};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
