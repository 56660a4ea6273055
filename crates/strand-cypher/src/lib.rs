//! strand-cypher: statement generation for Strand.
//!
//! - [`CypherGenerator`] renders parameterized statements from entity descriptors
//! - [`Predicate`] derives a filter condition from a probe entity (query by example)
//! - [`Condition`] / [`Expression`] form the condition tree both of them emit

pub mod condition;
pub mod generator;
pub mod predicate;
pub mod sort;
pub mod statement;

pub use condition::{escape_name, Condition, Expression, Operator};
pub use generator::{id_expression, CypherGenerator};
pub use predicate::{Example, ExampleMatcher, MatchMode, NullHandler, Predicate, StringMatcher};
pub use sort::{Order, Pageable, Sort, SortDirection};
pub use statement::{DynamicLabels, NodeKey, Operation, Projection, Statement};

// ── Reserved names ───────────────────────────────────────────────

/// Variable bound to the node being matched, saved or deleted.
pub const NAME_OF_ROOT_NODE: &str = "n";
/// Result column holding the engine id of a node.
pub const NAME_OF_INTERNAL_ID: &str = "__internal_id__";
/// Result column holding node labels.
pub const NAME_OF_LABELS: &str = "__labels__";
/// Result column of count and delete statements.
pub const NAME_OF_COUNT: &str = "count";

pub const NAME_OF_ID: &str = "__id__";
pub const NAME_OF_IDS: &str = "__ids__";
pub const NAME_OF_VERSION_PARAM: &str = "__version__";
pub const NAME_OF_PROPERTIES_PARAM: &str = "__properties__";
pub const NAME_OF_ENTITY_LIST_PARAM: &str = "__entities__";
pub const NAME_OF_STATIC_LABELS_PARAM: &str = "__staticLabels__";
pub const NAME_OF_SKIP: &str = "__skip__";
pub const NAME_OF_LIMIT: &str = "__limit__";
pub const FROM_ID_PARAMETER_NAME: &str = "fromId";
pub const TO_ID_PARAMETER_NAME: &str = "toId";
