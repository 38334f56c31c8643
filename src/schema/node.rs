//! Resolved field-schema trees.

use serde::{Deserialize, Serialize};

use crate::bundle::navigation::is_choice_variant;

/// Upper cardinality bound of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MaxRepr", into = "String")]
pub enum MaxCardinality {
    Bounded(u32),
    Unbounded,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaxRepr {
    Number(u32),
    Text(String),
}

impl MaxCardinality {
    /// Parses "*", "unbounded" or a non-negative integer.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "*" | "unbounded" => Some(MaxCardinality::Unbounded),
            other => other.parse().ok().map(MaxCardinality::Bounded),
        }
    }

    pub fn allows_many(&self) -> bool {
        match self {
            MaxCardinality::Bounded(max) => *max > 1,
            MaxCardinality::Unbounded => true,
        }
    }
}

impl Default for MaxCardinality {
    fn default() -> Self {
        MaxCardinality::Bounded(1)
    }
}

impl TryFrom<MaxRepr> for MaxCardinality {
    type Error = String;

    fn try_from(repr: MaxRepr) -> Result<Self, Self::Error> {
        match repr {
            MaxRepr::Number(max) => Ok(MaxCardinality::Bounded(max)),
            MaxRepr::Text(text) => {
                MaxCardinality::parse(&text).ok_or_else(|| format!("invalid max cardinality: {text}"))
            }
        }
    }
}

impl From<MaxCardinality> for String {
    fn from(max: MaxCardinality) -> Self {
        max.to_string()
    }
}

impl std::fmt::Display for MaxCardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxCardinality::Bounded(max) => write!(f, "{max}"),
            MaxCardinality::Unbounded => write!(f, "*"),
        }
    }
}

/// Why a composite node was left without children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpansionStop {
    /// The declared type is already being expanded further up the path
    Cycle,
    /// The configured maximum depth was reached
    DepthLimit,
}

/// One node of a resolved type's field tree.
///
/// Children keep the declaration order of the source definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchemaNode {
    pub element_name: String,
    /// Dotted path from the type root, e.g. `Patient.name.family`
    pub path: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub min: u32,
    pub max: MaxCardinality,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldSchemaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped: Option<ExpansionStop>,
}

impl FieldSchemaNode {
    pub fn is_required(&self) -> bool {
        self.min >= 1
    }

    pub fn is_array(&self) -> bool {
        self.max.allows_many()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Direct child by element name. Typed choice names (`valueQuantity`)
    /// match a `value[x]` child.
    pub fn child(&self, name: &str) -> Option<&FieldSchemaNode> {
        self.children
            .iter()
            .find(|child| child.element_name == name)
            .or_else(|| {
                self.children.iter().find(|child| {
                    child
                        .element_name
                        .strip_suffix("[x]")
                        .is_some_and(|base| is_choice_variant(base, name))
                })
            })
    }

    /// Descendant at a dotted path relative to this node. A leading segment
    /// equal to this node's type name is skipped, so both `name.family` and
    /// `Patient.name.family` work from the `Patient` root.
    pub fn find(&self, path: &str) -> Option<&FieldSchemaNode> {
        let mut segments = path.split('.').filter(|s| !s.is_empty()).peekable();
        if segments.peek() == Some(&self.type_name.as_str()) {
            segments.next();
        }

        let mut current = self;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Pre-order traversal.
    pub fn walk<F: FnMut(&FieldSchemaNode)>(&self, visit: &mut F) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    pub fn required_children(&self) -> impl Iterator<Item = &FieldSchemaNode> {
        self.children.iter().filter(|child| child.is_required())
    }
}
