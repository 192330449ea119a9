//! Structured filter expressions.
//!
//! The Storage Layer is only ever queried through an [`Expression`]: a tree of
//! `And`/`Or` nodes whose leaves compare a whitelisted field against a JSON
//! value. Raw query strings are never accepted, so an expression can be
//! validated against the target table's field list before it reaches an engine.
//!
//! # Example
//!
//! ```
//! use hcm_core::{Expression, Rule};
//!
//! let filter = Expression::and(vec![
//!     Rule::eq("vendor", "aws"),
//!     Rule::eq("region", "us-east-1"),
//!     Rule::in_("cloud_id", ["vpc-1", "vpc-2"]),
//! ]);
//! assert!(filter.validate(&["vendor", "region", "cloud_id"]).is_ok());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HcmError, Result};

/// How the rules of an expression are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOp {
    /// Every rule must match. An empty `And` matches everything.
    And,
    /// At least one rule must match. An empty `Or` matches nothing.
    Or,
}

/// Comparison operator of an atomic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Field equals the value.
    Eq,
    /// Field differs from the value.
    Neq,
    /// Field is one of the values (value must be an array).
    In,
    /// Field is none of the values (value must be an array).
    NotIn,
}

/// A single rule: either a field comparison or a nested expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    /// Compare one field against a value.
    Atom {
        /// Field name; must be whitelisted by the target table.
        field: String,
        /// Comparison operator.
        op: Op,
        /// Right-hand side.
        value: Value,
    },
    /// A nested sub-expression.
    Nested(Expression),
}

impl Rule {
    /// `field = value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Atom {
            field: field.into(),
            op: Op::Eq,
            value: value.into(),
        }
    }

    /// `field != value`.
    pub fn neq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Atom {
            field: field.into(),
            op: Op::Neq,
            value: value.into(),
        }
    }

    /// `field IN (values)`.
    pub fn in_<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Atom {
            field: field.into(),
            op: Op::In,
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }

    /// `field NOT IN (values)`.
    pub fn not_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Atom {
            field: field.into(),
            op: Op::NotIn,
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }

    fn validate(&self, fields: &[&str]) -> Result<()> {
        match self {
            Self::Atom { field, op, value } => {
                if !fields.contains(&field.as_str()) {
                    return Err(HcmError::invalid_parameter(format!(
                        "filter field not allowed: {field}"
                    )));
                }
                if matches!(op, Op::In | Op::NotIn) && !value.is_array() {
                    return Err(HcmError::invalid_parameter(format!(
                        "filter field {field}: in/not_in requires an array value"
                    )));
                }
                Ok(())
            }
            Self::Nested(expr) => expr.validate(fields),
        }
    }

    fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::Atom { field, op, value } => {
                let actual = doc.get(field).unwrap_or(&Value::Null);
                match op {
                    Op::Eq => actual == value,
                    Op::Neq => actual != value,
                    Op::In => value.as_array().is_some_and(|vs| vs.contains(actual)),
                    Op::NotIn => value.as_array().is_some_and(|vs| !vs.contains(actual)),
                }
            }
            Self::Nested(expr) => expr.matches(doc),
        }
    }
}

/// A filter expression over the fields of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// How `rules` combine.
    pub op: LogicOp,
    /// The rules.
    pub rules: Vec<Rule>,
}

impl Expression {
    /// Conjunction of rules.
    #[must_use]
    pub fn and(rules: Vec<Rule>) -> Self {
        Self {
            op: LogicOp::And,
            rules,
        }
    }

    /// Disjunction of rules.
    #[must_use]
    pub fn or(rules: Vec<Rule>) -> Self {
        Self {
            op: LogicOp::Or,
            rules,
        }
    }

    /// The expression that matches every row.
    #[must_use]
    pub fn all() -> Self {
        Self::and(Vec::new())
    }

    /// Append a rule, returning the extended expression.
    #[must_use]
    pub fn with(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Whether the expression has no rules at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check every referenced field against the table's whitelist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an unknown field or a malformed
    /// `in`/`not_in` operand.
    pub fn validate(&self, fields: &[&str]) -> Result<()> {
        self.rules.iter().try_for_each(|r| r.validate(fields))
    }

    /// Evaluate the expression against a JSON document.
    ///
    /// A missing field compares as `null`.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        match self.op {
            LogicOp::And => self.rules.iter().all(|r| r.matches(doc)),
            LogicOp::Or => self.rules.iter().any(|r| r.matches(doc)),
        }
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "vendor": "aws",
            "region": "us-east-1",
            "cloud_id": "vpc-1",
            "bill_day": 7
        })
    }

    #[test]
    fn and_requires_every_rule() {
        let expr = Expression::and(vec![Rule::eq("vendor", "aws"), Rule::eq("bill_day", 7)]);
        assert!(expr.matches(&doc()));

        let expr = expr.with(Rule::eq("region", "eu-west-1"));
        assert!(!expr.matches(&doc()));
    }

    #[test]
    fn or_requires_any_rule() {
        let expr = Expression::or(vec![Rule::eq("vendor", "gcp"), Rule::neq("region", "x")]);
        assert!(expr.matches(&doc()));
        assert!(!Expression::or(Vec::new()).matches(&doc()));
    }

    #[test]
    fn in_and_not_in() {
        assert!(Expression::and(vec![Rule::in_("cloud_id", ["vpc-1", "vpc-2"])]).matches(&doc()));
        assert!(!Expression::and(vec![Rule::not_in("cloud_id", ["vpc-1"])]).matches(&doc()));
    }

    #[test]
    fn nested_expressions() {
        let expr = Expression::and(vec![
            Rule::eq("vendor", "aws"),
            Rule::Nested(Expression::or(vec![
                Rule::eq("cloud_id", "vpc-9"),
                Rule::eq("cloud_id", "vpc-1"),
            ])),
        ]);
        assert!(expr.matches(&doc()));
    }

    #[test]
    fn missing_field_compares_as_null() {
        let expr = Expression::and(vec![Rule::eq("zone", Value::Null)]);
        assert!(expr.matches(&doc()));
    }

    #[test]
    fn validate_rejects_unknown_fields() {
        let expr = Expression::and(vec![Rule::eq("password", "x")]);
        assert!(expr.validate(&["vendor"]).is_err());

        let nested = Expression::and(vec![Rule::Nested(expr)]);
        assert!(nested.validate(&["vendor"]).is_err());
    }

    #[test]
    fn validate_rejects_scalar_in_operand() {
        let expr = Expression::and(vec![Rule::Atom {
            field: "vendor".into(),
            op: Op::In,
            value: json!("aws"),
        }]);
        assert!(expr.validate(&["vendor"]).is_err());
    }

    #[test]
    fn serde_shape_is_stable() {
        let expr = Expression::and(vec![Rule::eq("vendor", "aws")]);
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(
            json,
            json!({"op": "and", "rules": [{"field": "vendor", "op": "eq", "value": "aws"}]})
        );
        let back: Expression = serde_json::from_value(json).unwrap();
        assert_eq!(back, expr);
    }
}
