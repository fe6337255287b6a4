//! Entity handles, slot allocation and entity views.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and a slot *index* in the low 32 bits. Entities are addressed
//! by their string alias at the API surface; the id is what the world uses
//! internally to index component columns. The generation is bumped every time
//! a slot is recycled after a removal, so a handle kept across a removal is
//! detected as stale instead of silently pointing at a new entity.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::component::ComponentInstance;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from a slot index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.index() as usize
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles [`EntityId`] slots with generational tracking.
///
/// Free slots are reused in FIFO order so that generations are spread out
/// over time rather than concentrated on a hot slot.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
    alive_count: usize,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle, reusing a freed slot when one is available.
    pub fn allocate(&mut self) -> EntityId {
        self.alive_count += 1;
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on deallocation.
            self.alive[index as usize] = true;
            EntityId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            EntityId::new(index, 0)
        }
    }

    /// Free a handle's slot and bump its generation.
    ///
    /// Returns `false` if the handle was already dead or stale.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.slot();
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        self.alive_count -= 1;
        true
    }

    /// Whether `id` refers to a live slot with a matching generation.
    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.slot();
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }

    /// Number of live handles.
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// An ordered `name -> instance` mapping for one entity.
///
/// This is a snapshot of *which* instances an entity holds; the instances
/// themselves are live shared handles, so mutating a field through
/// [`ComponentInstance::set`] is visible to the world immediately.
#[derive(Clone, Default)]
pub struct Components {
    entries: Vec<(Rc<str>, ComponentInstance)>,
}

impl Components {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// The instance attached under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ComponentInstance> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, instance)| instance)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Component names in attachment order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(n, _)| n.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ComponentInstance)> + '_ {
        self.entries.iter().map(|(n, i)| (n.as_ref(), i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Rc<str>, ComponentInstance)> for Components {
    fn from_iter<I: IntoIterator<Item = (Rc<str>, ComponentInstance)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(n, i)| (n.as_ref(), i)))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A view of one entity: its handle, alias and component instances.
///
/// Views are cheap to clone and are handed out by queries and passed to
/// system callbacks. Holding a view does not keep the entity alive.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub alias: String,
    pub components: Components,
}

impl Entity {
    /// Shorthand for `self.components.get(name)`.
    pub fn component(&self, name: &str) -> Option<&ComponentInstance> {
        self.components.get(name)
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
