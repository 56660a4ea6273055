//! Query by example: turn a probe entity and matching rules into a condition
//! over the root node plus the parameters it references.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use strand_core::schema::{EntityDescriptor, MappingContext};
use strand_core::{EntityRef, Properties, Result};

use crate::condition::{Condition, Expression};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullHandler {
    /// Absent values are left out of the condition.
    #[default]
    Ignore,
    /// Absent values must be absent on the node, too.
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringMatcher {
    /// Same as `Exact`.
    #[default]
    Default,
    Exact,
    Containing,
    Starting,
    Ending,
    Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct PropertySpecifier {
    string_matcher: Option<StringMatcher>,
    ignore_case: Option<bool>,
}

/// Rules for matching a probe. Paths are field names of the probe type.
#[derive(Debug, Clone, Default)]
pub struct ExampleMatcher {
    null_handler: NullHandler,
    match_mode: MatchMode,
    default_string_matcher: StringMatcher,
    ignore_case: bool,
    ignored_paths: BTreeSet<String>,
    specifiers: BTreeMap<String, PropertySpecifier>,
}

impl ExampleMatcher {
    /// Match all present values exactly, ignoring absent ones.
    pub fn matching_all() -> Self {
        Self::default()
    }

    pub fn matching_any() -> Self {
        Self {
            match_mode: MatchMode::Any,
            ..Self::default()
        }
    }

    pub fn with_ignore_paths(mut self, paths: &[&str]) -> Self {
        self.ignored_paths
            .extend(paths.iter().map(|p| p.to_string()));
        self
    }

    pub fn with_null_handler(mut self, null_handler: NullHandler) -> Self {
        self.null_handler = null_handler;
        self
    }

    pub fn with_include_null_values(self) -> Self {
        self.with_null_handler(NullHandler::Include)
    }

    pub fn with_ignore_null_values(self) -> Self {
        self.with_null_handler(NullHandler::Ignore)
    }

    pub fn with_string_matcher(mut self, matcher: StringMatcher) -> Self {
        self.default_string_matcher = matcher;
        self
    }

    pub fn with_ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Override string matching for one path.
    pub fn with_matcher(mut self, path: &str, matcher: StringMatcher) -> Self {
        self.specifiers
            .entry(path.to_string())
            .or_default()
            .string_matcher = Some(matcher);
        self
    }

    /// Override case sensitivity for one path.
    pub fn with_path_ignore_case(mut self, path: &str, ignore_case: bool) -> Self {
        self.specifiers
            .entry(path.to_string())
            .or_default()
            .ignore_case = Some(ignore_case);
        self
    }

    pub fn null_handler(&self) -> NullHandler {
        self.null_handler
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub fn is_ignored_path(&self, path: &str) -> bool {
        self.ignored_paths.contains(path)
    }

    fn string_matcher_for(&self, path: &str) -> StringMatcher {
        self.specifiers
            .get(path)
            .and_then(|s| s.string_matcher)
            .unwrap_or(self.default_string_matcher)
    }

    fn ignore_case_for(&self, path: &str) -> bool {
        self.specifiers
            .get(path)
            .and_then(|s| s.ignore_case)
            .unwrap_or(self.ignore_case)
    }
}

/// A probe entity together with its matcher.
#[derive(Debug, Clone)]
pub struct Example {
    probe: EntityRef,
    matcher: ExampleMatcher,
}

impl Example {
    pub fn of(probe: EntityRef) -> Self {
        Self::with_matcher(probe, ExampleMatcher::matching_all())
    }

    pub fn with_matcher(probe: EntityRef, matcher: ExampleMatcher) -> Self {
        Self { probe, matcher }
    }

    pub fn probe(&self) -> &EntityRef {
        &self.probe
    }

    pub fn matcher(&self) -> &ExampleMatcher {
        &self.matcher
    }
}

/// The condition and parameters derived from an [`Example`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    condition: Option<Condition>,
    parameters: Properties,
}

impl Predicate {
    pub fn create(context: &MappingContext, example: &Example) -> Result<Predicate> {
        let descriptor = context.descriptor_for(example.probe())?;
        Ok(Self::for_descriptor(&descriptor, example))
    }

    fn for_descriptor(descriptor: &EntityDescriptor, example: &Example) -> Predicate {
        let probe = example.probe();
        let matcher = example.matcher();
        let mut predicate = Predicate::default();
        let mut conditions = Vec::new();

        // Internal ids are not stored properties and never take IS NULL checks.
        if !matcher.is_ignored_path(&descriptor.id.field_name) {
            let value = descriptor.id_value(probe);
            match descriptor.id_property_name() {
                None => {
                    if let Some(value) = value {
                        let parameter = descriptor.id.field_name.clone();
                        conditions.push(
                            Expression::InternalId.is_equal_to(Expression::Parameter(parameter.clone())),
                        );
                        predicate.parameters.insert(parameter, value);
                    }
                }
                Some(property) => {
                    let path = descriptor.id.field_name.clone();
                    predicate.add(&mut conditions, matcher, &path, property, value);
                }
            }
        }

        for property in descriptor.properties.iter().chain(descriptor.version.iter()) {
            if matcher.is_ignored_path(&property.field_name) {
                continue;
            }
            let value = probe.get(&property.field_name);
            predicate.add(
                &mut conditions,
                matcher,
                &property.field_name,
                &property.property_name,
                value,
            );
        }

        for field in probe.association_fields() {
            if matcher.is_ignored_path(&field) || probe.association(&field).is_empty() {
                continue;
            }
            tracing::error!(
                type_name = %descriptor.type_name,
                path = %field,
                "Querying by example does not support traversing of relationships; the path is ignored"
            );
        }

        predicate.condition = combine(conditions, matcher.match_mode());
        predicate
    }

    fn add(
        &mut self,
        conditions: &mut Vec<Condition>,
        matcher: &ExampleMatcher,
        path: &str,
        property_name: &str,
        value: Option<Value>,
    ) {
        let property = Expression::property(property_name);
        let Some(value) = value else {
            if matcher.null_handler() == NullHandler::Include {
                conditions.push(property.is_null());
            }
            return;
        };

        let parameter = property_name.to_string();
        let condition = match &value {
            Value::String(text) => {
                let ignore_case = matcher.ignore_case_for(path);
                let string_matcher = matcher.string_matcher_for(path);
                if string_matcher == StringMatcher::Regex {
                    let pattern = if ignore_case {
                        format!("(?i){text}")
                    } else {
                        text.clone()
                    };
                    self.parameters.insert(parameter.clone(), Value::String(pattern));
                    conditions.push(property.matches(Expression::Parameter(parameter)));
                    return;
                }

                let (left, right) = if ignore_case {
                    (property.to_lower(), Expression::Parameter(parameter.clone()).to_lower())
                } else {
                    (property, Expression::Parameter(parameter.clone()))
                };
                match string_matcher {
                    StringMatcher::Default | StringMatcher::Exact | StringMatcher::Regex => {
                        left.is_equal_to(right)
                    }
                    StringMatcher::Containing => left.contains(right),
                    StringMatcher::Starting => left.starts_with(right),
                    StringMatcher::Ending => left.ends_with(right),
                }
            }
            _ => property.is_equal_to(Expression::Parameter(parameter.clone())),
        };
        self.parameters.insert(parameter, value);
        conditions.push(condition);
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn parameters(&self) -> &Properties {
        &self.parameters
    }

    pub fn into_parts(self) -> (Option<Condition>, Properties) {
        (self.condition, self.parameters)
    }
}

fn combine(mut conditions: Vec<Condition>, mode: MatchMode) -> Option<Condition> {
    match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(match mode {
            MatchMode::All => Condition::And(conditions),
            MatchMode::Any => Condition::Or(conditions),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strand_core::schema::{AssociationSchema, EntitySchema, IdStrategy};
    use strand_core::{AssociationValue, PropertyKind};

    fn context() -> MappingContext {
        let ctx = MappingContext::new();
        ctx.register(
            EntitySchema::new("Person")
                .id("id", IdStrategy::Internal)
                .property("name", PropertyKind::String)
                .property("age", PropertyKind::Integer)
                .association(AssociationSchema::outgoing("friends", "KNOWS", "Person")),
        )
        .unwrap();
        ctx.register(
            EntitySchema::new("Book")
                .id("isbn", IdStrategy::Assigned)
                .property_named("title", "bookTitle", PropertyKind::String),
        )
        .unwrap();
        ctx
    }

    fn alice() -> EntityRef {
        EntityRef::new("Person").with("name", "Alice").with("age", Value::Null)
    }

    #[test]
    fn ignores_absent_values_by_default() {
        let ctx = context();
        let predicate = Predicate::create(&ctx, &Example::of(alice())).unwrap();
        assert_eq!(predicate.condition().unwrap().render(), "n.name = $name");
        assert_eq!(predicate.parameters().get("name"), Some(&json!("Alice")));
        assert_eq!(predicate.parameters().len(), 1);
    }

    #[test]
    fn includes_absent_values_as_null_checks() {
        let ctx = context();
        let matcher = ExampleMatcher::matching_all().with_include_null_values();
        let predicate = Predicate::create(&ctx, &Example::with_matcher(alice(), matcher)).unwrap();
        assert_eq!(
            predicate.condition().unwrap().render(),
            "n.name = $name AND n.age IS NULL"
        );
    }

    #[test]
    fn internal_ids_compare_against_the_id_function() {
        let ctx = context();
        let probe = EntityRef::new("Person").with("id", 42);
        let matcher = ExampleMatcher::matching_all().with_include_null_values();
        let predicate = Predicate::create(&ctx, &Example::with_matcher(probe, matcher)).unwrap();
        assert_eq!(
            predicate.condition().unwrap().render(),
            "id(n) = $id AND n.name IS NULL AND n.age IS NULL"
        );
        assert_eq!(predicate.parameters().get("id"), Some(&json!(42)));
    }

    #[test]
    fn match_any_uses_or() {
        let ctx = context();
        let probe = EntityRef::new("Person").with("name", "Alice").with("age", 30);
        let predicate =
            Predicate::create(&ctx, &Example::with_matcher(probe, ExampleMatcher::matching_any()))
                .unwrap();
        assert_eq!(predicate.condition().unwrap().render(), "n.name = $name OR n.age = $age");
    }

    #[test]
    fn string_matchers_and_case_insensitivity() {
        let ctx = context();
        let probe = EntityRef::new("Book").with("title", "Rust");
        let matcher = ExampleMatcher::matching_all()
            .with_string_matcher(StringMatcher::Containing)
            .with_ignore_case();
        let predicate = Predicate::create(&ctx, &Example::with_matcher(probe, matcher)).unwrap();
        assert_eq!(
            predicate.condition().unwrap().render(),
            "toLower(n.bookTitle) CONTAINS toLower($bookTitle)"
        );
    }

    #[test]
    fn per_path_matchers_override_defaults() {
        let ctx = context();
        let probe = EntityRef::new("Book").with("isbn", "978").with("title", "^Ru.*");
        let matcher = ExampleMatcher::matching_all()
            .with_string_matcher(StringMatcher::Starting)
            .with_matcher("title", StringMatcher::Regex)
            .with_path_ignore_case("title", true);
        let predicate = Predicate::create(&ctx, &Example::with_matcher(probe, matcher)).unwrap();
        assert_eq!(
            predicate.condition().unwrap().render(),
            "n.isbn STARTS WITH $isbn AND n.bookTitle =~ $bookTitle"
        );
        assert_eq!(predicate.parameters().get("bookTitle"), Some(&json!("(?i)^Ru.*")));
    }

    #[test]
    fn ignored_paths_and_associations_are_skipped() {
        let ctx = context();
        let probe = alice().with_association(
            "friends",
            AssociationValue::Many(vec![EntityRef::new("Person").with("name", "Bob")]),
        );
        let matcher = ExampleMatcher::matching_all()
            .with_include_null_values()
            .with_ignore_paths(&["age"]);
        let predicate = Predicate::create(&ctx, &Example::with_matcher(probe, matcher)).unwrap();
        assert_eq!(predicate.condition().unwrap().render(), "n.name = $name");
    }

    #[test]
    fn empty_probe_matches_everything() {
        let ctx = context();
        let predicate = Predicate::create(&ctx, &Example::of(EntityRef::new("Book"))).unwrap();
        assert!(predicate.condition().is_none());
        assert!(predicate.parameters().is_empty());
    }
}
