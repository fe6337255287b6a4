//! Component templates, shared instances and the name registry.
//!
//! A component kind is registered once under a string name together with a
//! [`ComponentTemplate`]. Registration resolves the name to a small integer
//! [`ComponentId`]; entities record which kinds they carry in a
//! [`ComponentMask`], so matching an entity against a system is a word-wise
//! subset test rather than a walk over component names.
//!
//! Instantiating a template evaluates every field. Literal fields are cloned
//! into the new instance, so no two instances share a literal's storage.
//! Generator fields are invoked once, with the world's [`RandomGenerator`],
//! to produce a fresh value per entity.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::rng::RandomGenerator;
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentId
// ---------------------------------------------------------------------------

/// Opaque identifier for a registered component kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentMask
// ---------------------------------------------------------------------------

/// A growable bit set of [`ComponentId`]s.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ComponentMask {
    words: Vec<u64>,
}

impl ComponentMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ComponentId) {
        let (word, bit) = Self::locate(id);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= bit;
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        let (word, bit) = Self::locate(id);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// Whether every kind in `other` is also in `self`.
    pub fn is_superset_of(&self, other: &ComponentMask) -> bool {
        other.words.iter().enumerate().all(|(i, &required)| {
            let held = self.words.get(i).copied().unwrap_or(0);
            held & required == required
        })
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    #[inline]
    fn locate(id: ComponentId) -> (usize, u64) {
        (id.index() / 64, 1u64 << (id.index() % 64))
    }
}

impl FromIterator<ComponentId> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        let mut mask = ComponentMask::new();
        for id in iter {
            mask.insert(id);
        }
        mask
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = self.words.iter().enumerate().flat_map(|(w, &bits)| {
            (0..64).filter(move |b| bits & (1u64 << b) != 0).map(move |b| w * 64 + b)
        });
        f.debug_set().entries(ids).finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentTemplate
// ---------------------------------------------------------------------------

/// A per-entity field generator.
pub type FieldGenerator = Box<dyn FnMut(&mut RandomGenerator) -> Value>;

/// One template field: a literal default or a generator.
pub enum FieldValue {
    Literal(Value),
    Generated(FieldGenerator),
}

impl FieldValue {
    fn evaluate(&mut self, rng: &mut RandomGenerator) -> Value {
        match self {
            FieldValue::Literal(value) => value.clone(),
            FieldValue::Generated(generator) => generator(rng),
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            FieldValue::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

/// The prototype a component kind is instantiated from.
///
/// An empty template describes a tag (marker) component.
///
/// ```
/// use mote_ecs::component::ComponentTemplate;
///
/// let velocity = ComponentTemplate::new()
///     .with_generator("x", |rng| (rng.random_float() * 4.0 - 2.0).into())
///     .with_generator("y", |rng| (rng.random_float() * 4.0 - 2.0).into())
///     .with("speed", 32);
/// assert_eq!(velocity.field_names().collect::<Vec<_>>(), vec!["x", "y", "speed"]);
/// ```
#[derive(Debug, Default)]
pub struct ComponentTemplate {
    fields: Vec<(String, FieldValue)>,
}

impl ComponentTemplate {
    /// An empty template (tag component).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a literal field.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set_field(field, FieldValue::Literal(value.into()));
        self
    }

    /// Add (or replace) a field whose value is drawn fresh for every entity.
    pub fn with_generator<F>(mut self, field: &str, generator: F) -> Self
    where
        F: FnMut(&mut RandomGenerator) -> Value + 'static,
    {
        self.set_field(field, FieldValue::Generated(Box::new(generator)));
        self
    }

    /// Build a template of literal fields from a JSON object.
    ///
    /// Returns `None` if `value` is neither an object nor `null`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::new()),
            Value::Object(map) => Some(map.into()),
            _ => None,
        }
    }

    /// Add or replace a field in place.
    pub fn set_field(&mut self, field: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((field.to_owned(), value)),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Evaluate every field into a fresh instance.
    pub fn instantiate(&mut self, rng: &mut RandomGenerator) -> ComponentInstance {
        let fields = self
            .fields
            .iter_mut()
            .map(|(name, value)| (name.clone(), value.evaluate(rng)))
            .collect();
        ComponentInstance::new(fields)
    }
}

impl From<Map<String, Value>> for ComponentTemplate {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            fields: map
                .into_iter()
                .map(|(name, value)| (name, FieldValue::Literal(value)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentInstance
// ---------------------------------------------------------------------------

/// A shared, mutable component instance.
///
/// Cloning the handle shares the underlying fields: every clone observes
/// every write. The world hands out clones to system callbacks and query
/// results, so updating entity state is done by writing through the handle.
#[derive(Clone, Default)]
pub struct ComponentInstance(Rc<RefCell<Map<String, Value>>>);

impl ComponentInstance {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(Rc::new(RefCell::new(fields)))
    }

    /// Wrap a JSON object. Non-object values yield an empty instance.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Self::default(),
        }
    }

    /// A copy of one field's value.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.0.borrow().get(field).cloned()
    }

    /// A numeric field as `f64`.
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.0.borrow().get(field).and_then(Value::as_f64)
    }

    pub fn get_str(&self, field: &str) -> Option<String> {
        self.0.borrow().get(field).and_then(Value::as_str).map(str::to_owned)
    }

    /// Overwrite (or add) one field.
    pub fn set(&self, field: &str, value: impl Into<Value>) {
        self.0.borrow_mut().insert(field.to_owned(), value.into());
    }

    /// Borrow all fields.
    ///
    /// # Panics
    ///
    /// Panics if the instance is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Map<String, Value>> {
        self.0.borrow()
    }

    /// Mutably borrow all fields.
    ///
    /// # Panics
    ///
    /// Panics if the instance is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Map<String, Value>> {
        self.0.borrow_mut()
    }

    /// Whether both handles point at the same instance.
    pub fn shares_with(&self, other: &ComponentInstance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A detached copy of the fields as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.borrow().clone())
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(fields) => fmt::Debug::fmt(&*fields, f),
            Err(_) => f.write_str("ComponentInstance(<borrowed>)"),
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ComponentEntry {
    name: Rc<str>,
    template: ComponentTemplate,
    /// Built on the first `add_component` for this kind, then shared.
    shared: Option<ComponentInstance>,
}

/// Maps component names to ids and owns their templates.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_name: HashMap<Rc<str>, ComponentId>,
    entries: Vec<ComponentEntry>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `template` under `name`.
    ///
    /// A name can only be registered once; the first template is kept.
    pub fn register(
        &mut self,
        name: &str,
        template: ComponentTemplate,
    ) -> Result<ComponentId, EcsError> {
        if self.by_name.contains_key(name) {
            return Err(EcsError::DuplicateComponent {
                name: name.to_owned(),
            });
        }
        let id = ComponentId(self.entries.len() as u32);
        let name: Rc<str> = Rc::from(name);
        self.entries.push(ComponentEntry {
            name: Rc::clone(&name),
            template,
            shared: None,
        });
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// Like [`lookup`](Self::lookup), with an error naming what is registered.
    pub fn require(&self, name: &str) -> Result<ComponentId, EcsError> {
        self.lookup(name).ok_or_else(|| EcsError::UnknownComponent {
            name: name.to_owned(),
            registered: self.names().join(", "),
        })
    }

    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.entries.get(id.index()).map(|e| e.name.as_ref())
    }

    pub(crate) fn shared_name(&self, id: ComponentId) -> Option<Rc<str>> {
        self.entries.get(id.index()).map(|e| Rc::clone(&e.name))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_ref()).collect()
    }

    pub fn template(&self, id: ComponentId) -> Option<&ComponentTemplate> {
        self.entries.get(id.index()).map(|e| &e.template)
    }

    pub fn template_mut(&mut self, id: ComponentId) -> Option<&mut ComponentTemplate> {
        self.entries.get_mut(id.index()).map(|e| &mut e.template)
    }

    /// Evaluate the template for `id` into a fresh instance.
    pub fn instantiate(
        &mut self,
        id: ComponentId,
        rng: &mut RandomGenerator,
    ) -> Option<ComponentInstance> {
        self.entries
            .get_mut(id.index())
            .map(|e| e.template.instantiate(rng))
    }

    /// The kind's shared instance, evaluating the template on first use.
    pub fn shared_instance(
        &mut self,
        id: ComponentId,
        rng: &mut RandomGenerator,
    ) -> Option<ComponentInstance> {
        let entry = self.entries.get_mut(id.index())?;
        if entry.shared.is_none() {
            entry.shared = Some(entry.template.instantiate(rng));
        }
        entry.shared.clone()
    }

    /// Resolve names to a mask. `None` if any name is unregistered.
    pub fn resolve_mask<S: AsRef<str>>(&self, names: &[S]) -> Option<ComponentMask> {
        names.iter().map(|n| self.lookup(n.as_ref())).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn position() -> ComponentTemplate {
        ComponentTemplate::new().with("x", 0).with("y", 0)
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register("Position", position()).unwrap();
        assert_eq!(reg.lookup("Position"), Some(id));
        assert_eq!(reg.name(id), Some("Position"));
        assert_eq!(reg.lookup("Velocity"), None);
    }

    #[test]
    fn duplicate_name_keeps_first_template() {
        let mut reg = ComponentRegistry::new();
        reg.register("Position", position()).unwrap();
        let err = reg
            .register("Position", ComponentTemplate::new().with("z", 9))
            .unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { .. }));
        assert_eq!(reg.len(), 1);

        let id = reg.lookup("Position").unwrap();
        let names: Vec<_> = reg.template(id).unwrap().field_names().collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn require_lists_registered_names() {
        let mut reg = ComponentRegistry::new();
        reg.register("Position", position()).unwrap();
        reg.register("Boundary", ComponentTemplate::new()).unwrap();
        let err = reg.require("Velocity").unwrap_err();
        assert_eq!(
            err.to_string(),
            "component 'Velocity' not registered. Registered components: [Position, Boundary]"
        );
    }

    #[test]
    fn generators_run_once_per_instance() {
        let mut rng = RandomGenerator::new(7);
        let mut template = ComponentTemplate::new()
            .with_generator("x", |rng| rng.random_float().into())
            .with("size", 2);

        let a = template.instantiate(&mut rng);
        let b = template.instantiate(&mut rng);
        assert_ne!(a.get("x"), b.get("x"));
        assert_eq!(a.get("size"), Some(json!(2)));
        assert!(!a.shares_with(&b));
    }

    #[test]
    fn shared_instance_is_built_once() {
        let mut rng = RandomGenerator::new(1);
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register(
                "Attraction",
                ComponentTemplate::new().with_generator("seed", |rng| rng.random_int().into()),
            )
            .unwrap();
        let first = reg.shared_instance(id, &mut rng).unwrap();
        let second = reg.shared_instance(id, &mut rng).unwrap();
        assert!(first.shares_with(&second));
    }

    #[test]
    fn template_from_json_object() {
        let template = ComponentTemplate::from_json(json!({"type": "normal", "size": 2})).unwrap();
        assert_eq!(template.len(), 2);
        assert!(ComponentTemplate::from_json(json!(null)).unwrap().is_empty());
        assert!(ComponentTemplate::from_json(json!([1, 2])).is_none());
    }

    #[test]
    fn set_field_replaces_existing() {
        let mut template = position().with("x", 5);
        let mut rng = RandomGenerator::new(0);
        assert_eq!(template.len(), 2);
        assert_eq!(template.instantiate(&mut rng).get("x"), Some(json!(5)));
    }

    #[test]
    fn mask_subset_matching() {
        let a = ComponentId(0);
        let b = ComponentId(3);
        let far = ComponentId(130);

        let entity: ComponentMask = [a, b, far].into_iter().collect();
        let required: ComponentMask = [a, far].into_iter().collect();
        let missing: ComponentMask = [ComponentId(1)].into_iter().collect();

        assert!(entity.is_superset_of(&required));
        assert!(entity.is_superset_of(&ComponentMask::new()));
        assert!(!entity.is_superset_of(&missing));
        assert!(!required.is_superset_of(&entity));
        assert_eq!(entity.len(), 3);
        assert!(entity.contains(far));
    }

    #[test]
    fn resolve_mask_fails_on_unknown_name() {
        let mut reg = ComponentRegistry::new();
        reg.register("Position", position()).unwrap();
        assert!(reg.resolve_mask(&["Position"]).is_some());
        assert!(reg.resolve_mask(&["Position", "Ghost"]).is_none());
        assert!(reg.resolve_mask::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn instance_writes_are_shared_between_handles() {
        let a = ComponentInstance::from_value(json!({"x": 0}));
        let b = a.clone();
        b.set("x", 3);
        assert_eq!(a.get_f64("x"), Some(3.0));

        let c = ComponentInstance::from_value(a.to_value());
        c.set("x", 10);
        assert_eq!(a.get_f64("x"), Some(3.0));
    }

    #[test]
    fn literal_fields_are_copied_per_instance() {
        let mut rng = RandomGenerator::new(3);
        let mut template = ComponentTemplate::new().with("tags", json!(["a"]));
        let first = template.instantiate(&mut rng);
        let second = template.instantiate(&mut rng);

        if let Some(Value::Array(tags)) = first.borrow_mut().get_mut("tags") {
            tags.push(json!("b"));
        }
        assert_eq!(first.get("tags"), Some(json!(["a", "b"])));
        assert_eq!(second.get("tags"), Some(json!(["a"])));
        assert_eq!(template.instantiate(&mut rng).get("tags"), Some(json!(["a"])));
    }
}
