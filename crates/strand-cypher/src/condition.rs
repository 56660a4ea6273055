//! A small expression and condition tree covering what the generator and the
//! predicate builder emit. Values never appear in the tree; they are always
//! referenced through parameters.

use std::fmt::Write as _;

use crate::NAME_OF_ROOT_NODE;

/// Something that evaluates to a value for the root node `n`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A stored property of the root node.
    Property(String),
    /// The engine-assigned id of the root node, `id(n)`.
    InternalId,
    Parameter(String),
    ToLower(Box<Expression>),
}

impl Expression {
    pub fn property(name: &str) -> Self {
        Expression::Property(name.to_string())
    }

    pub fn parameter(name: &str) -> Self {
        Expression::Parameter(name.to_string())
    }

    pub fn to_lower(self) -> Self {
        Expression::ToLower(Box::new(self))
    }

    pub fn is_equal_to(self, other: Expression) -> Condition {
        self.compare(Operator::Equals, other)
    }

    pub fn contains(self, other: Expression) -> Condition {
        self.compare(Operator::Contains, other)
    }

    pub fn starts_with(self, other: Expression) -> Condition {
        self.compare(Operator::StartsWith, other)
    }

    pub fn ends_with(self, other: Expression) -> Condition {
        self.compare(Operator::EndsWith, other)
    }

    pub fn matches(self, other: Expression) -> Condition {
        self.compare(Operator::Matches, other)
    }

    pub fn is_in(self, other: Expression) -> Condition {
        self.compare(Operator::In, other)
    }

    pub fn is_null(self) -> Condition {
        Condition::IsNull(self)
    }

    fn compare(self, operator: Operator, right: Expression) -> Condition {
        Condition::Comparison {
            left: self,
            operator,
            right,
        }
    }

    fn render_into(&self, node: &str, out: &mut String) {
        match self {
            Expression::Property(name) => {
                let _ = write!(out, "{node}.{}", escape_name(name));
            }
            Expression::InternalId => {
                let _ = write!(out, "id({node})");
            }
            Expression::Parameter(name) => {
                let _ = write!(out, "${}", escape_name(name));
            }
            Expression::ToLower(inner) => {
                out.push_str("toLower(");
                inner.render_into(node, out);
                out.push(')');
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    /// Regular expression match, `=~`.
    Matches,
    In,
}

impl Operator {
    fn as_cypher(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STARTS WITH",
            Operator::EndsWith => "ENDS WITH",
            Operator::Matches => "=~",
            Operator::In => "IN",
        }
    }
}

/// A boolean condition over the root node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        left: Expression,
        operator: Operator,
        right: Expression,
    },
    IsNull(Expression),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::And(mut left), Condition::And(right)) => {
                left.extend(right);
                Condition::And(left)
            }
            (Condition::And(mut left), right) => {
                left.push(right);
                Condition::And(left)
            }
            (left, right) => Condition::And(vec![left, right]),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn or(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::Or(mut left), Condition::Or(right)) => {
                left.extend(right);
                Condition::Or(left)
            }
            (Condition::Or(mut left), right) => {
                left.push(right);
                Condition::Or(left)
            }
            (left, right) => Condition::Or(vec![left, right]),
        }
    }

    pub fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }

    /// Render against the root node `n`.
    pub fn render(&self) -> String {
        self.render_for(NAME_OF_ROOT_NODE)
    }

    /// Render against the node bound to `node`.
    pub fn render_for(&self, node: &str) -> String {
        let mut out = String::new();
        self.render_into(node, &mut out, false);
        out
    }

    /// Names of all parameters referenced by this condition.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_parameters(&mut names);
        names
    }

    fn collect_parameters(&self, names: &mut Vec<String>) {
        fn from_expression(expression: &Expression, names: &mut Vec<String>) {
            match expression {
                Expression::Parameter(name) => names.push(name.clone()),
                Expression::ToLower(inner) => from_expression(inner, names),
                Expression::Property(_) | Expression::InternalId => {}
            }
        }
        match self {
            Condition::Comparison { left, right, .. } => {
                from_expression(left, names);
                from_expression(right, names);
            }
            Condition::IsNull(expression) => from_expression(expression, names),
            Condition::And(parts) | Condition::Or(parts) => {
                parts.iter().for_each(|c| c.collect_parameters(names));
            }
            Condition::Not(inner) => inner.collect_parameters(names),
        }
    }

    fn render_into(&self, node: &str, out: &mut String, nested: bool) {
        match self {
            Condition::Comparison {
                left,
                operator,
                right,
            } => {
                left.render_into(node, out);
                let _ = write!(out, " {} ", operator.as_cypher());
                right.render_into(node, out);
            }
            Condition::IsNull(expression) => {
                expression.render_into(node, out);
                out.push_str(" IS NULL");
            }
            Condition::And(parts) | Condition::Or(parts) => {
                let joiner = if matches!(self, Condition::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                let parenthesize = nested && parts.len() > 1;
                if parenthesize {
                    out.push('(');
                }
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push_str(joiner);
                    }
                    part.render_into(node, out, true);
                }
                if parenthesize {
                    out.push(')');
                }
            }
            Condition::Not(inner) => {
                out.push_str("NOT (");
                inner.render_into(node, out, false);
                out.push(')');
            }
        }
    }
}

/// Quote a label, relationship type or property name for interpolation.
///
/// Plain identifiers are left alone; anything else is wrapped in backticks
/// with embedded backticks doubled.
pub fn escape_name(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}
