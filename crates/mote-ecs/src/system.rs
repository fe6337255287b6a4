//! System definitions.
//!
//! A system is a name, the component names an entity must carry to be
//! visited, and a callback. Systems have no enabled state: once registered
//! they run against every matching entity whenever they are invoked.

use std::collections::HashMap;
use std::fmt;

use crate::entity::{Components, Entity};
use crate::world::World;
use crate::EcsError;

/// Identifier assigned to a system at registration, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub(crate) u32);

/// The per-entity callback of a system.
///
/// Receives the world (so it can query other entities, read globals or
/// spawn), the entity being visited and that entity's live component
/// instances.
pub type SystemCallback = Box<dyn FnMut(&mut World, &Entity, &Components)>;

struct SystemEntry {
    name: String,
    required: Vec<String>,
    /// `None` while the callback is executing.
    callback: Option<SystemCallback>,
}

/// Systems in registration order, addressable by name.
#[derive(Default)]
pub struct SystemRegistry {
    by_name: HashMap<String, SystemId>,
    entries: Vec<SystemEntry>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system. Names are never overwritten.
    pub fn register(
        &mut self,
        name: &str,
        required: &[&str],
        callback: SystemCallback,
    ) -> Result<SystemId, EcsError> {
        if self.by_name.contains_key(name) {
            return Err(EcsError::DuplicateSystem {
                name: name.to_owned(),
            });
        }
        let id = SystemId(self.entries.len() as u32);
        self.entries.push(SystemEntry {
            name: name.to_owned(),
            required: required.iter().map(|s| (*s).to_owned()).collect(),
            callback: Some(callback),
        });
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<SystemId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: SystemId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|e| e.name.as_str())
    }

    /// Component names the system requires.
    pub fn required(&self, id: SystemId) -> &[String] {
        self.entries
            .get(id.0 as usize)
            .map(|e| e.required.as_slice())
            .unwrap_or_default()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = SystemId> {
        (0..self.entries.len() as u32).map(SystemId)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take the callback out for execution.
    ///
    /// Fails if the system is already executing further up the stack.
    pub(crate) fn take_callback(&mut self, id: SystemId) -> Result<SystemCallback, EcsError> {
        let entry = &mut self.entries[id.0 as usize];
        entry
            .callback
            .take()
            .ok_or_else(|| EcsError::SystemAlreadyRunning {
                name: entry.name.clone(),
            })
    }

    pub(crate) fn restore_callback(&mut self, id: SystemId, callback: SystemCallback) {
        self.entries[id.0 as usize].callback = Some(callback);
    }
}

impl fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.name, &e.required)))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
