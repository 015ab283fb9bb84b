//! Compound-document assembly and rendering.

use serde::{Deserialize, Serialize};

pub mod assembler;
pub mod errors;
pub mod links;
pub mod resource;

pub use assembler::{AssemblyError, DocumentAssembler};
pub use errors::{ErrorDocument, ErrorObject};
pub use resource::{
    Document, Linkage, PrimaryData, RelationshipObject, ResourceIdentifier, ResourceNode,
};

/// When resource objects carry relationship linkage.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkagePolicy {
    /// Never emit linkage.
    Never,
    /// Emit linkage for relationships requested via `include` at the
    /// resource's position in the include tree.
    #[default]
    WhenIncluded,
    /// Emit linkage for every visible relationship.
    Always,
}
