// Status tree
//
// Server → host → service nodes built from a parsed `Document`. Children are
// owned through `Arc`; the parent link is a `Weak` so dropping the root frees
// the whole tree at once.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::document::{BodyFormat, Document, Element};
use crate::error::Error;

// ── Node kinds ──────────────────────────────────────────────────────

/// Which level of the status hierarchy a node sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum NodeKind {
    Server,
    Host,
    Service,
}

impl NodeKind {
    /// Element (XML) or key (JSON) that holds a node of this kind.
    pub fn element_name(self, format: BodyFormat) -> &'static str {
        match (self, format) {
            (Self::Server, BodyFormat::Xml) => "data",
            (Self::Server, BodyFormat::Json) => "service",
            (Self::Host, _) => "list",
            (Self::Service, _) => "services",
        }
    }

    /// Kind of the nodes nested under this one. Services are leaves.
    pub fn child_kind(self) -> Option<Self> {
        match self {
            Self::Server => Some(Self::Host),
            Self::Host => Some(Self::Service),
            Self::Service => None,
        }
    }
}

// ── Attribute values ────────────────────────────────────────────────

/// An attribute value: an integer when the raw text parses as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Text(String),
}

impl AttrValue {
    /// Base-10 integer if possible, the unchanged text otherwise.
    pub fn coerce(raw: &str) -> Self {
        raw.parse::<i64>()
            .map_or_else(|_| Self::Text(raw.to_owned()), Self::Int)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ── Nodes ───────────────────────────────────────────────────────────

/// One server, host or service entry from a status response.
#[derive(Debug)]
pub struct StatusNode {
    kind: NodeKind,
    attributes: IndexMap<String, AttrValue>,
    parent: Weak<StatusNode>,
    children: Vec<Arc<StatusNode>>,
}

impl StatusNode {
    /// Parse a raw response body into a tree rooted at a `kind` node.
    pub fn parse(body: &str, kind: NodeKind) -> Result<Arc<Self>, Error> {
        let document = Document::parse(body)?;
        Self::from_document(&document, kind)
    }

    /// Build a tree from an already parsed document.
    ///
    /// The root element is used when its name matches `kind`, otherwise the
    /// first matching descendant. Children are collected from the whole
    /// subtree of the matched element, not only its direct children.
    pub fn from_document(document: &Document, kind: NodeKind) -> Result<Arc<Self>, Error> {
        let expected = kind.element_name(document.format);
        let element = document
            .find_element(expected)
            .ok_or_else(|| Error::Schema {
                expected: expected.to_owned(),
            })?;
        let node = Self::build(element, kind, document.format, Weak::new());
        debug!(%kind, children = node.children.len(), "status tree parsed");
        Ok(node)
    }

    fn build(element: &Element, kind: NodeKind, format: BodyFormat, parent: Weak<Self>) -> Arc<Self> {
        Arc::new_cyclic(|me| {
            let children = kind
                .child_kind()
                .map(|child_kind| {
                    element
                        .find_all(child_kind.element_name(format))
                        .map(|child| Self::build(child, child_kind, format, me.clone()))
                        .collect()
                })
                .unwrap_or_default();

            Self {
                kind,
                attributes: element
                    .attributes
                    .iter()
                    .map(|(key, value)| (key.clone(), AttrValue::coerce(value)))
                    .collect(),
                parent,
                children,
            }
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attributes(&self) -> &IndexMap<String, AttrValue> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// The `name` attribute rendered as text.
    pub fn name(&self) -> Option<String> {
        self.get("name").map(ToString::to_string)
    }

    /// `None` for tree roots, and once the owning tree has been dropped.
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.upgrade()
    }

    pub fn children(&self) -> &[Arc<Self>] {
        &self.children
    }

    /// Child whose name matches case-insensitively.
    pub fn child(&self, name: &str) -> Option<&Arc<Self>> {
        let wanted = name.to_lowercase();
        self.children
            .iter()
            .find(|child| child.name().is_some_and(|n| n.to_lowercase() == wanted))
    }

    /// Alerting means the final check attempt has been reached.
    pub fn is_alerting(&self) -> bool {
        match (
            self.get("current_check_attempt").and_then(AttrValue::as_int),
            self.get("max_check_attempts").and_then(AttrValue::as_int),
        ) {
            (Some(current), Some(max)) => current == max,
            _ => false,
        }
    }
}

impl fmt::Display for StatusNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({name})", self.kind),
            None => write!(f, "{}()", self.kind),
        }
    }
}
