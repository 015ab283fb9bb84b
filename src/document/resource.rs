//! JSON:API document model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// `{type, id}` pair identifying one resource.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource identifier.
    pub id: String,
}

impl ResourceIdentifier {
    /// Creates an identifier.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

/// Resource linkage of one relationship.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Linkage {
    /// To-one linkage; serializes as `null` when empty.
    ToOne(Option<ResourceIdentifier>),
    /// To-many linkage.
    ToMany(Vec<ResourceIdentifier>),
}

/// Relationship object carrying linkage.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RelationshipObject {
    /// Resource linkage.
    pub data: Linkage,
}

/// Projected resource object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceNode {
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource identifier.
    pub id: String,
    /// Visible attributes, in name order.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Json>,
    /// Relationships with linkage, in name order.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipObject>,
}

impl ResourceNode {
    /// Node with no attributes or relationships.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    /// Identifier of this node.
    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(&self.resource_type, &self.id)
    }
}

/// Top-level `data` member.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrimaryData {
    /// Single resource, or `null` when not found.
    Single(Option<Box<ResourceNode>>),
    /// Resource collection.
    Collection(Vec<ResourceNode>),
}

impl PrimaryData {
    /// Primary nodes in order.
    pub fn nodes(&self) -> Vec<&ResourceNode> {
        match self {
            PrimaryData::Single(node) => node.iter().map(|boxed| &**boxed).collect(),
            PrimaryData::Collection(nodes) => nodes.iter().collect(),
        }
    }
}

/// Compound document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Document {
    /// Primary data.
    pub data: PrimaryData,
    /// Related resources, unique by `(type, id)`, in discovery order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceNode>,
    /// Top-level links.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    /// Top-level meta.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Json>,
}

impl Document {
    /// Document with primary data only.
    pub fn new(data: PrimaryData) -> Self {
        Self {
            data,
            included: Vec::new(),
            links: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Adds one `meta` member.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Merges top-level links.
    pub fn with_links(mut self, links: BTreeMap<String, String>) -> Self {
        self.links.extend(links);
        self
    }

    /// Finds an included node by identity.
    pub fn find_included(&self, resource_type: &str, id: &str) -> Option<&ResourceNode> {
        self.included
            .iter()
            .find(|node| node.resource_type == resource_type && node.id == id)
    }

    /// Serializes the document to a JSON value.
    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).unwrap_or(Json::Null)
    }
}
