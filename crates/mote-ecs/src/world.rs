//! The [`World`] is the registry at the centre of the ECS. It owns the
//! component templates, the systems, every entity and its component
//! instances, the default component set, the global key/value store and the
//! random generator used for aliases and template generators.
//!
//! Entities are stored as generational slots. Each component kind has its own
//! column of instance handles indexed by slot, and each slot records the
//! kinds it carries as a [`ComponentMask`]. Iteration always follows entity
//! insertion order.
//!
//! The authoring API is fluent: misuse (duplicate names, unknown aliases,
//! unregistered components) is logged as a warning and the call returns
//! `&mut Self` unchanged. Every such operation also has a `try_` form that
//! returns the [`EcsError`] instead.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::component::{ComponentId, ComponentInstance, ComponentMask, ComponentRegistry, ComponentTemplate};
use crate::entity::{Components, Entity, EntityAllocator, EntityId};
use crate::query::QueryFilter;
use crate::rng::{RandomGenerator, DEFAULT_UID_LENGTH};
use crate::system::{SystemId, SystemRegistry};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Entity slots
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct EntitySlot {
    id: EntityId,
    alias: String,
    mask: ComponentMask,
    /// Attachment order of the entity's kinds.
    kinds: Vec<ComponentId>,
}

/// Log a skipped registry operation and swallow the error.
fn report<T>(operation: &'static str, result: Result<T, EcsError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(operation, error = %error, "operation skipped");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The registry of component templates, systems, entities and globals.
///
/// Entities are addressed by a string alias and, internally, by a
/// generational [`EntityId`]. Their component instances live in one column
/// per component kind, indexed by slot. Iteration follows insertion order.
///
/// Misuse (duplicate names, unknown aliases, incomplete entities) never
/// panics. The fluent methods log a warning and skip the operation; each has
/// a `try_` twin that returns the [`EcsError`] instead.
pub struct World {
    components: ComponentRegistry,
    systems: SystemRegistry,
    allocator: EntityAllocator,
    slots: Vec<Option<EntitySlot>>,
    /// `columns[kind][slot]`
    columns: Vec<Vec<Option<ComponentInstance>>>,
    order: Vec<EntityId>,
    aliases: HashMap<String, EntityId>,
    default_components: Vec<String>,
    globals: HashMap<String, Value>,
    pending_removals: Vec<EntityId>,
    rng: RandomGenerator,
    uid_length: usize,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("components", &self.components.names())
            .field("systems", &self.systems.names())
            .field("entity_count", &self.order.len())
            .field("default_components", &self.default_components)
            .field("seed", &self.rng.seed())
            .finish()
    }
}

impl World {
    /// An empty world with an entropy-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(RandomGenerator::from_entropy())
    }

    /// An empty world whose aliases and generated fields are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(RandomGenerator::new(seed))
    }

    pub fn with_rng(rng: RandomGenerator) -> Self {
        trace!(seed = rng.seed(), "world created");
        Self {
            components: ComponentRegistry::new(),
            systems: SystemRegistry::new(),
            allocator: EntityAllocator::new(),
            slots: Vec::new(),
            columns: Vec::new(),
            order: Vec::new(),
            aliases: HashMap::new(),
            default_components: Vec::new(),
            globals: HashMap::new(),
            pending_removals: Vec::new(),
            rng,
            uid_length: DEFAULT_UID_LENGTH,
        }
    }

    pub fn rng(&self) -> &RandomGenerator {
        &self.rng
    }

    pub fn rng_mut(&mut self) -> &mut RandomGenerator {
        &mut self.rng
    }

    /// Length of aliases generated by [`create_entity`](Self::create_entity).
    pub fn uid_length(&self) -> usize {
        self.uid_length
    }

    pub fn set_uid_length(&mut self, length: usize) -> &mut Self {
        self.uid_length = length;
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.components
    }

    // -- components ---------------------------------------------------------

    /// Register a component template. Duplicate names are ignored with a
    /// warning.
    pub fn create_component(&mut self, name: &str, template: ComponentTemplate) -> &mut Self {
        report("create_component", self.try_create_component(name, template));
        self
    }

    /// Register a tag component (no fields).
    pub fn create_tag(&mut self, name: &str) -> &mut Self {
        self.create_component(name, ComponentTemplate::new())
    }

    pub fn try_create_component(
        &mut self,
        name: &str,
        template: ComponentTemplate,
    ) -> Result<ComponentId, EcsError> {
        trace!(component = name, fields = template.len(), "create_component");
        let id = self.components.register(name, template)?;
        debug!(component = name, ?id, "created component");
        Ok(id)
    }

    /// Registered component names in registration order.
    pub fn component_names(&self) -> Vec<&str> {
        self.components.names()
    }

    /// The mutable prototype for `name`. Edits affect entities created
    /// afterwards only.
    pub fn component_template_mut(&mut self, name: &str) -> Option<&mut ComponentTemplate> {
        let id = self.components.lookup(name)?;
        self.components.template_mut(id)
    }

    /// Append names to the default component set, keeping first-seen order.
    pub fn include_as_default_components<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            if self.default_components.iter().any(|n| n == name) {
                debug!(component = name, "already a default component");
            } else {
                self.default_components.push(name.to_owned());
                debug!(component = name, "added default component");
            }
        }
        self
    }

    pub fn default_components(&self) -> &[String] {
        &self.default_components
    }

    // -- systems ------------------------------------------------------------

    /// Register a system over entities carrying every name in `components`.
    /// Duplicate names are ignored with a warning.
    ///
    /// ```
    /// use mote_ecs::prelude::*;
    ///
    /// let mut world = World::with_seed(1);
    /// world
    ///     .create_component("Position", ComponentTemplate::new().with("x", 0))
    ///     .create_entity_with_alias("a", &["Position"])
    ///     .create_system("Move", &["Position"], |_world, _entity, components| {
    ///         let position = components.get("Position").unwrap();
    ///         let x = position.get_f64("x").unwrap_or_default();
    ///         position.set("x", x + 1.0);
    ///     })
    ///     .run_system("Move");
    ///
    /// let a = world.get_entity("a").unwrap();
    /// assert_eq!(a.component("Position").unwrap().get_f64("x"), Some(1.0));
    /// ```
    pub fn create_system<F>(&mut self, name: &str, components: &[&str], callback: F) -> &mut Self
    where
        F: FnMut(&mut World, &Entity, &Components) + 'static,
    {
        report("create_system", self.try_create_system(name, components, callback));
        self
    }

    pub fn try_create_system<F>(
        &mut self,
        name: &str,
        components: &[&str],
        callback: F,
    ) -> Result<SystemId, EcsError>
    where
        F: FnMut(&mut World, &Entity, &Components) + 'static,
    {
        trace!(system = name, ?components, "create_system");
        let id = self.systems.register(name, components, Box::new(callback))?;
        debug!(system = name, ?components, "created system");
        Ok(id)
    }

    /// Registered system names in registration order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.names()
    }

    /// Run one system against every matching entity.
    pub fn run_system(&mut self, name: &str) -> &mut Self {
        report("run_system", self.try_run_system(name));
        self
    }

    /// Run one system; returns how many entities it visited.
    pub fn try_run_system(&mut self, name: &str) -> Result<usize, EcsError> {
        let id = self.systems.lookup(name).ok_or_else(|| EcsError::UnknownSystem {
            name: name.to_owned(),
        })?;
        self.run_system_by_id(id)
    }

    /// Run every system once, in registration order.
    ///
    /// Returns `(name, visited)` per system that ran.
    pub fn run_all_systems(&mut self) -> Vec<(String, usize)> {
        let ids: Vec<SystemId> = self.systems.ids().collect();
        ids.into_iter()
            .filter_map(|id| {
                let name = self.systems.name(id)?.to_owned();
                report("run_system", self.run_system_by_id(id)).map(|visited| (name, visited))
            })
            .collect()
    }

    fn run_system_by_id(&mut self, id: SystemId) -> Result<usize, EcsError> {
        let mut callback = self.systems.take_callback(id)?;

        let Some(required) = self.components.resolve_mask(self.systems.required(id)) else {
            // A required kind was never registered, so no entity can match.
            debug!(system = ?self.systems.name(id), "system requires unregistered component");
            self.systems.restore_callback(id, callback);
            return Ok(0);
        };

        // Entities spawned by the callback are visited on the next run.
        let candidates = self.order.clone();
        let mut visited = 0;
        for entity_id in candidates {
            let matches = self
                .slot(entity_id)
                .is_some_and(|slot| slot.mask.is_superset_of(&required));
            if !matches {
                continue;
            }
            if let Some(entity) = self.view(entity_id) {
                callback(self, &entity, &entity.components);
                visited += 1;
            }
        }

        self.systems.restore_callback(id, callback);
        Ok(visited)
    }

    // -- entity creation ----------------------------------------------------

    /// Create an entity named `alias` with the default components plus
    /// `components`.
    ///
    /// The entity is only stored if every component in that set has a
    /// registered template; otherwise nothing is created and a warning is
    /// logged.
    pub fn create_entity_with_alias(&mut self, alias: &str, components: &[&str]) -> &mut Self {
        report(
            "create_entity_with_alias",
            self.try_create_entity_with_alias(alias, components),
        );
        self
    }

    pub fn try_create_entity_with_alias(
        &mut self,
        alias: &str,
        components: &[&str],
    ) -> Result<EntityId, EcsError> {
        trace!(alias, ?components, "create_entity_with_alias");
        let wanted = self.effective_components(components);
        self.build_entity(alias, &wanted)
    }

    /// Instantiate exactly `wanted` under `alias`, committing only if every
    /// template exists.
    fn build_entity(&mut self, alias: &str, wanted: &[String]) -> Result<EntityId, EcsError> {
        if self.aliases.contains_key(alias) {
            return Err(EcsError::DuplicateEntity {
                alias: alias.to_owned(),
            });
        }

        let mut attached = Vec::with_capacity(wanted.len());
        let mut missing = Vec::new();
        for name in wanted {
            let instance = self
                .components
                .lookup(name)
                .and_then(|id| Some((id, self.components.instantiate(id, &mut self.rng)?)));
            match instance {
                Some(pair) => attached.push(pair),
                None => {
                    warn!(alias, component = %name, "missing component");
                    missing.push(name.as_str());
                }
            }
        }

        if attached.len() != wanted.len() {
            return Err(EcsError::IncompleteEntity {
                alias: alias.to_owned(),
                missing: missing.join(", "),
            });
        }

        let id = self.insert_entity(alias.to_owned(), attached);
        debug!(alias, %id, "created entity");
        Ok(id)
    }

    /// Create an entity under a freshly generated alias.
    pub fn create_entity(&mut self, components: &[&str]) -> &mut Self {
        report("create_entity", self.try_create_entity(components));
        self
    }

    pub fn try_create_entity(&mut self, components: &[&str]) -> Result<EntityId, EcsError> {
        let alias = self.rng.uid(self.uid_length);
        self.try_create_entity_with_alias(&alias, components)
    }

    /// Create `count` entities with the same requested components. Each one
    /// evaluates the templates independently.
    pub fn create_entities(&mut self, count: usize, components: &[&str]) -> &mut Self {
        trace!(count, ?components, "create_entities");
        for _ in 0..count {
            self.create_entity(components);
        }
        self
    }

    /// Default set first, then requested names, duplicates removed.
    fn effective_components(&self, requested: &[&str]) -> Vec<String> {
        let mut seen = HashSet::new();
        self.default_components
            .iter()
            .map(String::as_str)
            .chain(requested.iter().copied())
            .filter(|name| seen.insert(*name))
            .map(str::to_owned)
            .collect()
    }

    fn insert_entity(
        &mut self,
        alias: String,
        attached: Vec<(ComponentId, ComponentInstance)>,
    ) -> EntityId {
        let id = self.allocator.allocate();
        let mut mask = ComponentMask::new();
        let mut kinds = Vec::with_capacity(attached.len());
        for (kind, instance) in attached {
            mask.insert(kind);
            kinds.push(kind);
            *self.cell_mut(kind, id) = Some(instance);
        }

        if self.slots.len() <= id.slot() {
            self.slots.resize_with(id.slot() + 1, || None);
        }
        self.slots[id.slot()] = Some(EntitySlot {
            id,
            alias: alias.clone(),
            mask,
            kinds,
        });
        self.aliases.insert(alias, id);
        self.order.push(id);
        id
    }

    fn cell_mut(&mut self, kind: ComponentId, id: EntityId) -> &mut Option<ComponentInstance> {
        if self.columns.len() <= kind.index() {
            self.columns.resize_with(kind.index() + 1, Vec::new);
        }
        let column = &mut self.columns[kind.index()];
        if column.len() <= id.slot() {
            column.resize_with(id.slot() + 1, || None);
        }
        &mut column[id.slot()]
    }

    // -- entity lookup ------------------------------------------------------

    fn slot(&self, id: EntityId) -> Option<&EntitySlot> {
        self.slots
            .get(id.slot())?
            .as_ref()
            .filter(|slot| slot.id == id)
    }

    fn view(&self, id: EntityId) -> Option<Entity> {
        let slot = self.slot(id)?;
        let components = slot
            .kinds
            .iter()
            .filter_map(|&kind| {
                let instance = self.columns.get(kind.index())?.get(id.slot())?.clone()?;
                Some((self.components.shared_name(kind)?, instance))
            })
            .collect();
        Some(Entity {
            id,
            alias: slot.alias.clone(),
            components,
        })
    }

    /// The entity named `alias`, or `None`.
    pub fn get_entity(&self, alias: &str) -> Option<Entity> {
        trace!(alias, "get_entity");
        self.view(*self.aliases.get(alias)?)
    }

    pub fn entity_by_id(&self, id: EntityId) -> Option<Entity> {
        self.view(id)
    }

    pub fn entity_id(&self, alias: &str) -> Option<EntityId> {
        self.aliases.get(alias).copied()
    }

    pub fn alias_of(&self, id: EntityId) -> Option<&str> {
        self.slot(id).map(|slot| slot.alias.as_str())
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id)
    }

    /// Every entity, in insertion order.
    pub fn entities(&self) -> Vec<Entity> {
        self.order.iter().filter_map(|&id| self.view(id)).collect()
    }

    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Entities carrying every name in `components`, in insertion order.
    pub fn entities_with_components(&self, components: &[&str]) -> Vec<Entity> {
        self.matching(components).filter_map(|id| self.view(id)).collect()
    }

    /// Entities carrying every name in `components` that satisfy `filter`.
    ///
    /// Under [`FilterMode::Any`](crate::query::FilterMode::Any) an entity
    /// appears once per constraint it satisfies.
    pub fn get_entities_with_components(
        &self,
        components: &[&str],
        filter: &QueryFilter,
    ) -> Vec<Entity> {
        let mut result = Vec::new();
        for entity in self.matching(components).filter_map(|id| self.view(id)) {
            let count = filter.match_count(&entity.components);
            result.extend(std::iter::repeat(entity).take(count));
        }
        result
    }

    fn matching<'a>(&'a self, components: &[&str]) -> impl Iterator<Item = EntityId> + 'a {
        let required = self.components.resolve_mask(components);
        self.order.iter().copied().filter(move |&id| {
            required.as_ref().is_some_and(|required| {
                self.slot(id)
                    .is_some_and(|slot| slot.mask.is_superset_of(required))
            })
        })
    }

    /// Call `callback` once per entity, in insertion order.
    pub fn on_all_entities_now<F>(&mut self, mut callback: F) -> &mut Self
    where
        F: FnMut(&mut World, &Entity),
    {
        trace!(entities = self.order.len(), "on_all_entities_now");
        for id in self.order.clone() {
            if let Some(entity) = self.view(id) {
                callback(self, &entity);
            }
        }
        self
    }

    // -- entity mutation ----------------------------------------------------

    /// Attach the shared instance of `component` to the entity `alias`.
    ///
    /// The shared instance is evaluated from the template the first time it
    /// is needed; every entity that receives the component this way holds
    /// the same instance.
    pub fn add_component(&mut self, alias: &str, component: &str) -> &mut Self {
        report("add_component", self.try_add_component(alias, component));
        self
    }

    pub fn try_add_component(&mut self, alias: &str, component: &str) -> Result<(), EcsError> {
        trace!(alias, component, "add_component");
        let id = self.require_entity(alias)?;
        let kind = self.components.require(component)?;
        let instance = self
            .components
            .shared_instance(kind, &mut self.rng)
            .ok_or_else(|| EcsError::UnknownComponent {
                name: component.to_owned(),
                registered: self.components.names().join(", "),
            })?;
        self.attach(id, kind, instance);
        debug!(alias, component, "added component");
        Ok(())
    }

    /// Replace (or attach) the instance of `component` on `alias`.
    pub fn set_component(
        &mut self,
        alias: &str,
        component: &str,
        instance: ComponentInstance,
    ) -> &mut Self {
        report("set_component", self.try_set_component(alias, component, instance));
        self
    }

    pub fn try_set_component(
        &mut self,
        alias: &str,
        component: &str,
        instance: ComponentInstance,
    ) -> Result<(), EcsError> {
        trace!(alias, component, "set_component");
        let id = self.require_entity(alias)?;
        let kind = self.components.require(component)?;
        self.attach(id, kind, instance);
        Ok(())
    }

    fn attach(&mut self, id: EntityId, kind: ComponentId, instance: ComponentInstance) {
        *self.cell_mut(kind, id) = Some(instance);
        if let Some(slot) = self.slots.get_mut(id.slot()).and_then(Option::as_mut) {
            if !slot.mask.contains(kind) {
                slot.mask.insert(kind);
                slot.kinds.push(kind);
            }
        }
    }

    fn require_entity(&self, alias: &str) -> Result<EntityId, EcsError> {
        self.entity_id(alias).ok_or_else(|| EcsError::UnknownEntity {
            alias: alias.to_owned(),
        })
    }

    /// Create `count` copies of `alias`.
    ///
    /// A shallow copy re-instantiates exactly the source's component names,
    /// so generator fields are drawn again. The default set is not applied a
    /// second time. A deep copy shares the source's
    /// instances: a write through any of them is seen by all.
    pub fn duplicate_entity(&mut self, alias: &str, count: usize, deep: bool) -> &mut Self {
        report("duplicate_entity", self.try_duplicate_entity(alias, count, deep));
        self
    }

    pub fn try_duplicate_entity(
        &mut self,
        alias: &str,
        count: usize,
        deep: bool,
    ) -> Result<Vec<EntityId>, EcsError> {
        trace!(alias, count, deep, "duplicate_entity");
        let source = self
            .get_entity(alias)
            .ok_or_else(|| EcsError::UnknownEntity {
                alias: alias.to_owned(),
            })?;

        let mut created = Vec::with_capacity(count);
        if deep {
            let shared: Vec<(ComponentId, ComponentInstance)> = source
                .components
                .iter()
                .filter_map(|(name, instance)| Some((self.components.lookup(name)?, instance.clone())))
                .collect();
            for _ in 0..count {
                let copy_alias = self.rng.uid(self.uid_length);
                if self.aliases.contains_key(&copy_alias) {
                    return Err(EcsError::DuplicateEntity { alias: copy_alias });
                }
                created.push(self.insert_entity(copy_alias, shared.clone()));
            }
        } else {
            let names: Vec<String> = source.components.names().map(str::to_owned).collect();
            for _ in 0..count {
                let copy_alias = self.rng.uid(self.uid_length);
                created.push(self.build_entity(&copy_alias, &names)?);
            }
        }

        debug!(alias, copies = created.len(), deep, "duplicated entity");
        Ok(created)
    }

    // -- entity removal -----------------------------------------------------

    /// Queue `alias` for removal.
    ///
    /// The entity stays visible until [`apply_removals`](Self::apply_removals)
    /// runs; the engine applies the queue at the end of every tick.
    pub fn remove_entity(&mut self, alias: &str) -> &mut Self {
        report("remove_entity", self.try_remove_entity(alias));
        self
    }

    pub fn try_remove_entity(&mut self, alias: &str) -> Result<EntityId, EcsError> {
        let id = self.require_entity(alias)?;
        if !self.pending_removals.contains(&id) {
            self.pending_removals.push(id);
        }
        Ok(id)
    }

    /// Entities queued for removal.
    pub fn pending_removals(&self) -> &[EntityId] {
        &self.pending_removals
    }

    /// Remove every queued entity; returns how many were removed.
    pub fn apply_removals(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_removals);
        pending
            .into_iter()
            .filter(|&id| report("apply_removals", self.despawn(id)).is_some())
            .count()
    }

    fn despawn(&mut self, id: EntityId) -> Result<(), EcsError> {
        if self.slot(id).is_none() || !self.allocator.deallocate(id) {
            return Err(EcsError::StaleEntity { entity: id });
        }
        let Some(slot) = self.slots[id.slot()].take() else {
            return Err(EcsError::StaleEntity { entity: id });
        };
        for kind in &slot.kinds {
            if let Some(cell) = self
                .columns
                .get_mut(kind.index())
                .and_then(|column| column.get_mut(id.slot()))
            {
                *cell = None;
            }
        }
        self.aliases.remove(&slot.alias);
        self.order.retain(|&e| e != id);
        debug!(alias = %slot.alias, %id, "removed entity");
        Ok(())
    }

    // -- globals ------------------------------------------------------------

    pub fn get_global(&self, key: &str) -> Option<&Value> {
        trace!(key, "get_global");
        self.globals.get(key)
    }

    pub fn set_global(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        trace!(key, %value, "set_global");
        self.globals.insert(key.to_owned(), value);
        self
    }

    pub fn remove_global(&mut self, key: &str) -> Option<Value> {
        self.globals.remove(key)
    }

    // -- determinism --------------------------------------------------------

    /// BLAKE3 hex digest of every entity's alias and component data, in
    /// insertion order.
    ///
    /// Two worlds built by the same calls from the same seed hash equal.
    pub fn state_hash(&self) -> String {
        #[derive(Serialize)]
        struct HashableEntity<'a> {
            alias: &'a str,
            components: Vec<(&'a str, Value)>,
        }

        let views = self.entities();
        let hashable: Vec<HashableEntity<'_>> = views
            .iter()
            .map(|entity| HashableEntity {
                alias: &entity.alias,
                components: entity
                    .components
                    .iter()
                    .map(|(name, instance)| (name, instance.to_value()))
                    .collect(),
            })
            .collect();

        // Plain JSON values with string keys always serialize.
        let bytes = serde_json::to_vec(&hashable).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
