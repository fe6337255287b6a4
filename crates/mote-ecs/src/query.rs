//! Field-value filters for entity queries.
//!
//! A [`QueryFilter`] is a list of `(component, field, expected)` constraints.
//! How the constraints combine is explicit in its [`FilterMode`]:
//!
//! - [`FilterMode::Any`] emits an entity once for *every* constraint it
//!   satisfies, so an entity matching two constraints appears twice and an
//!   empty filter matches nothing. This is the historical behaviour and the
//!   default.
//! - [`FilterMode::All`] emits an entity once iff it satisfies every
//!   constraint; an empty filter matches everything.
//!
//! Values are compared with [`strict_eq`].

use serde_json::Value;

use crate::entity::Components;
use crate::EcsError;

/// How the constraints of a [`QueryFilter`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// One result per satisfied constraint.
    #[default]
    Any,
    /// One result iff every constraint is satisfied.
    All,
}

/// `component.field == expected`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConstraint {
    pub component: String,
    pub field: String,
    pub expected: Value,
}

impl FieldConstraint {
    /// Whether `components` holds `component` with a `field` equal to
    /// `expected`. A missing component or field never matches.
    pub fn matches(&self, components: &Components) -> bool {
        components
            .get(&self.component)
            .and_then(|instance| instance.get(&self.field))
            .is_some_and(|actual| strict_eq(&actual, &self.expected))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    mode: FilterMode,
    constraints: Vec<FieldConstraint>,
}

impl QueryFilter {
    /// An empty filter in [`FilterMode::Any`].
    pub fn any() -> Self {
        Self::default()
    }

    /// An empty filter in [`FilterMode::All`].
    pub fn all() -> Self {
        Self {
            mode: FilterMode::All,
            constraints: Vec::new(),
        }
    }

    /// Add a `component.field == expected` constraint.
    pub fn field(mut self, component: &str, field: &str, expected: impl Into<Value>) -> Self {
        self.constraints.push(FieldConstraint {
            component: component.to_owned(),
            field: field.to_owned(),
            expected: expected.into(),
        });
        self
    }

    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse `{"Component": {"field": value, ...}, ...}` into an
    /// [`FilterMode::Any`] filter.
    ///
    /// ```
    /// use mote_ecs::query::QueryFilter;
    ///
    /// let filter = QueryFilter::from_json(&serde_json::json!({"Attributes": {"type": "normal"}})).unwrap();
    /// assert_eq!(filter.constraints().len(), 1);
    /// ```
    pub fn from_json(value: &Value) -> Result<Self, EcsError> {
        let components = value.as_object().ok_or_else(|| EcsError::MalformedFilter {
            details: format!("expected an object of components, got {value}"),
        })?;

        let mut filter = Self::any();
        for (component, fields) in components {
            let fields = fields.as_object().ok_or_else(|| EcsError::MalformedFilter {
                details: format!("expected an object of fields for '{component}', got {fields}"),
            })?;
            for (field, expected) in fields {
                filter = filter.field(component, field, expected.clone());
            }
        }
        Ok(filter)
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn constraints(&self) -> &[FieldConstraint] {
        &self.constraints
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// How many times an entity with `components` appears in a result.
    pub fn match_count(&self, components: &Components) -> usize {
        match self.mode {
            FilterMode::Any => self
                .constraints
                .iter()
                .filter(|c| c.matches(components))
                .count(),
            FilterMode::All => usize::from(self.constraints.iter().all(|c| c.matches(components))),
        }
    }
}

/// Strict equality between JSON values.
///
/// Numbers compare by numeric value, so `5` equals `5.0`; every other value
/// compares structurally.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentInstance;
    use serde_json::json;
    use std::rc::Rc;

    fn components(position: Value, attributes: Value) -> Components {
        [
            (Rc::from("Position"), ComponentInstance::from_value(position)),
            (Rc::from("Attributes"), ComponentInstance::from_value(attributes)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn strict_eq_compares_numbers_by_value() {
        assert!(strict_eq(&json!(5), &json!(5.0)));
        assert!(strict_eq(&json!(-3), &json!(-3)));
        assert!(!strict_eq(&json!(5), &json!("5")));
        assert!(strict_eq(&json!("lime"), &json!("lime")));
        assert!(!strict_eq(&json!(null), &json!(0)));
    }

    #[test]
    fn any_mode_counts_each_matching_constraint() {
        let c = components(json!({"x": 5, "y": 5}), json!({"type": "normal"}));
        let filter = QueryFilter::any()
            .field("Position", "x", 5)
            .field("Position", "y", 5)
            .field("Attributes", "type", "special");
        assert_eq!(filter.match_count(&c), 2);
    }

    #[test]
    fn all_mode_requires_every_constraint() {
        let c = components(json!({"x": 5, "y": 1}), json!({"type": "normal"}));
        let both = QueryFilter::all()
            .field("Position", "x", 5)
            .field("Attributes", "type", "normal");
        let one_off = both.clone().field("Position", "y", 2);
        assert_eq!(both.match_count(&c), 1);
        assert_eq!(one_off.match_count(&c), 0);
    }

    #[test]
    fn empty_filters_follow_their_mode() {
        let c = components(json!({}), json!({}));
        assert_eq!(QueryFilter::any().match_count(&c), 0);
        assert_eq!(QueryFilter::all().match_count(&c), 1);
    }

    #[test]
    fn missing_component_or_field_never_matches() {
        let c = components(json!({"x": 1}), json!({}));
        let filter = QueryFilter::any()
            .field("Velocity", "x", 1)
            .field("Position", "z", 1);
        assert_eq!(filter.match_count(&c), 0);
    }

    #[test]
    fn from_json_rejects_malformed_filters() {
        assert!(matches!(
            QueryFilter::from_json(&json!(["Position"])),
            Err(EcsError::MalformedFilter { .. })
        ));
        assert!(matches!(
            QueryFilter::from_json(&json!({"Position": 5})),
            Err(EcsError::MalformedFilter { .. })
        ));

        let filter = QueryFilter::from_json(&json!({"Position": {"x": 5, "y": 0}})).unwrap();
        assert_eq!(filter.mode(), FilterMode::Any);
        assert_eq!(filter.constraints().len(), 2);
    }
}
