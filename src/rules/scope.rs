//! Instance scopes: which occurrences of a repeating field a rule targets.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bundle::navigation::{collect_values, is_present};
use crate::error::{FhirRulesError, Result};

/// Occurrence selector attached to a rule.
///
/// Equality is structural: two `FilteredInstances` scopes are equal only when
/// their condition text is identical, character for character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum InstanceScope {
    #[serde(rename = "all")]
    AllInstances,
    #[serde(rename = "first")]
    FirstInstance,
    #[serde(rename = "filtered")]
    FilteredInstances {
        #[serde(rename = "conditionExpression")]
        condition_expression: String,
    },
}

impl InstanceScope {
    pub fn filtered(condition_expression: impl Into<String>) -> Self {
        InstanceScope::FilteredInstances {
            condition_expression: condition_expression.into(),
        }
    }

    /// Token used inside identity keys
    pub fn identity_token(&self) -> String {
        match self {
            InstanceScope::AllInstances => "all".to_string(),
            InstanceScope::FirstInstance => "first".to_string(),
            InstanceScope::FilteredInstances {
                condition_expression,
            } => format!("filter:{condition_expression}"),
        }
    }
}

/// Scope equality where `None` means "no scope specified".
pub fn instance_scope_equals(a: Option<&InstanceScope>, b: Option<&InstanceScope>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Pick the occurrences of a repeating field a scope applies to.
///
/// Returned pairs keep the index of each occurrence in `instances`. A missing
/// scope selects every occurrence.
pub fn select_instances<'a>(
    scope: Option<&InstanceScope>,
    instances: &'a [Value],
) -> Result<Vec<(usize, &'a Value)>> {
    match scope {
        None | Some(InstanceScope::AllInstances) => Ok(instances.iter().enumerate().collect()),
        Some(InstanceScope::FirstInstance) => Ok(instances.iter().enumerate().take(1).collect()),
        Some(InstanceScope::FilteredInstances {
            condition_expression,
        }) => {
            let condition = InstanceCondition::parse(condition_expression)?;
            Ok(instances
                .iter()
                .enumerate()
                .filter(|(_, instance)| condition.matches(instance))
                .collect())
        }
    }
}

static EXISTENCE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][\w-]*(?:\.[A-Za-z_][\w-]*(?:\[x\])?)*)\.(exists|empty)\(\)$")
        .expect("valid existence clause pattern")
});

static COMPARISON_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][\w-]*(?:\[x\])?(?:\.[A-Za-z_][\w-]*(?:\[x\])?)*)\s*(!=|=)\s*(.+)$")
        .expect("valid comparison clause pattern")
});

/// A parsed path-predicate expression, evaluated against one field occurrence.
///
/// Clauses are joined with `and`:
///
/// ```text
/// code='X'
/// system = 'http://loinc.org' and code != '1234-5'
/// period.end.exists()
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceCondition {
    clauses: Vec<ConditionClause>,
}

#[derive(Debug, Clone, PartialEq)]
enum ConditionClause {
    Equals { path: String, literal: Value },
    NotEquals { path: String, literal: Value },
    Exists { path: String },
    Empty { path: String },
}

impl InstanceCondition {
    pub fn parse(expression: &str) -> Result<Self> {
        let parts = split_conjunction(expression);
        if parts.iter().all(|part| part.is_empty()) {
            return Err(FhirRulesError::invalid_condition(
                expression,
                "expression is empty",
            ));
        }

        let clauses = parts
            .into_iter()
            .map(|part| parse_clause(expression, part))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { clauses })
    }

    /// True if every clause holds for `instance`.
    pub fn matches(&self, instance: &Value) -> bool {
        self.clauses.iter().all(|clause| clause.holds(instance))
    }
}

impl ConditionClause {
    fn holds(&self, instance: &Value) -> bool {
        match self {
            ConditionClause::Equals { path, literal } => collect_values(instance, path)
                .into_iter()
                .any(|value| value == literal),
            ConditionClause::NotEquals { path, literal } => collect_values(instance, path)
                .into_iter()
                .all(|value| value != literal),
            ConditionClause::Exists { path } => collect_values(instance, path)
                .into_iter()
                .any(is_present),
            ConditionClause::Empty { path } => !collect_values(instance, path)
                .into_iter()
                .any(is_present),
        }
    }
}

fn parse_clause(expression: &str, clause: &str) -> Result<ConditionClause> {
    if let Some(captures) = EXISTENCE_CLAUSE.captures(clause) {
        let path = captures[1].to_string();
        return Ok(match &captures[2] {
            "exists" => ConditionClause::Exists { path },
            _ => ConditionClause::Empty { path },
        });
    }

    if let Some(captures) = COMPARISON_CLAUSE.captures(clause) {
        let path = captures[1].to_string();
        let literal = parse_literal(captures[3].trim()).ok_or_else(|| {
            FhirRulesError::invalid_condition(
                expression.to_string(),
                format!("unsupported literal in clause '{clause}'"),
            )
        })?;
        return Ok(match &captures[2] {
            "=" => ConditionClause::Equals { path, literal },
            _ => ConditionClause::NotEquals { path, literal },
        });
    }

    Err(FhirRulesError::invalid_condition(
        expression.to_string(),
        format!("cannot parse clause '{clause}'"),
    ))
}

fn parse_literal(raw: &str) -> Option<Value> {
    if let Some(inner) = raw
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Some(Value::String(inner.replace("\\'", "'")));
    }

    match serde_json::from_str::<Value>(raw).ok()? {
        value @ (Value::Bool(_) | Value::Number(_)) => Some(value),
        _ => None,
    }
}

/// Split on the `and` keyword outside of quoted literals.
fn split_conjunction(expression: &str) -> Vec<&str> {
    let bytes = expression.as_bytes();
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quote => i += 1,
            b'\'' => in_quote = !in_quote,
            b' ' if !in_quote && expression[i..].starts_with(" and ") => {
                parts.push(expression[start..i].trim());
                i += " and ".len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    parts.push(expression[start..].trim());
    parts
}
