//! Document assembler: primary objects + include tree → compound document.
//!
//! Related objects are discovered breadth-first. Each `(type, id)` is
//! projected and stored once; primary resources occupy their identity slot
//! first, so they never reappear in `included`. A node is expanded at most
//! once per include-tree position, which bounds the walk on cyclic graphs
//! while still honouring every requested path.

use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, trace};

use crate::document::{
    resource::{Document, Linkage, PrimaryData, RelationshipObject, ResourceIdentifier, ResourceNode},
    LinkagePolicy,
};
use crate::query::{
    metadata::{RelationshipMeta, ResourceMetadata},
    spec::{IncludeTree, QuerySpecification},
};
use crate::repository::{AccessorError, ObjectReader, Related, RelationshipAccessor};

/// Fatal errors raised while assembling a document.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The relationship accessor failed.
    #[error("failed to resolve relationship '{relationship}' of {resource_type}/{id}: {source}")]
    Accessor {
        /// Type of the object being expanded.
        resource_type: String,
        /// Identifier of the object being expanded.
        id: String,
        /// Relationship being resolved.
        relationship: String,
        /// Collaborator error.
        source: AccessorError,
    },
    /// Metadata has no entry for a type reached during assembly.
    #[error("unknown resource type '{0}'")]
    UnknownResourceType(String),
    /// Include tree names a relationship metadata does not declare.
    #[error("'{relationship}' is not a relationship of '{resource_type}'")]
    UnknownRelationship {
        /// Resource type.
        resource_type: String,
        /// Relationship name.
        relationship: String,
    },
}

impl AssemblyError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            AssemblyError::Accessor { .. } => "RelationshipAccessorFailed",
            AssemblyError::UnknownResourceType(_) => "UnknownResourceType",
            AssemblyError::UnknownRelationship { .. } => "UnknownRelationship",
        }
    }
}

/// Projects domain objects into a compound document.
pub struct DocumentAssembler<'a, O> {
    metadata: &'a dyn ResourceMetadata,
    reader: &'a dyn ObjectReader<O>,
    accessor: &'a dyn RelationshipAccessor<O>,
    linkage: LinkagePolicy,
}

impl<'a, O: Clone> DocumentAssembler<'a, O> {
    /// Creates an assembler with the default linkage policy.
    pub fn new(
        metadata: &'a dyn ResourceMetadata,
        reader: &'a dyn ObjectReader<O>,
        accessor: &'a dyn RelationshipAccessor<O>,
    ) -> Self {
        Self {
            metadata,
            reader,
            accessor,
            linkage: LinkagePolicy::default(),
        }
    }

    /// Overrides the linkage policy.
    pub fn with_linkage(mut self, linkage: LinkagePolicy) -> Self {
        self.linkage = linkage;
        self
    }

    /// Builds a single-resource document; `None` renders `"data": null`.
    pub fn assemble_one(
        &self,
        spec: &QuerySpecification,
        primary: Option<&O>,
    ) -> Result<Document, AssemblyError> {
        let objects: Vec<O> = primary.into_iter().cloned().collect();
        let (mut nodes, included) = self.run(spec, &objects)?;
        let data = PrimaryData::Single(nodes.pop().map(Box::new));
        Ok(Document {
            included,
            ..Document::new(data)
        })
    }

    /// Builds a collection document.
    pub fn assemble_collection(
        &self,
        spec: &QuerySpecification,
        primary: &[O],
    ) -> Result<Document, AssemblyError> {
        let (nodes, included) = self.run(spec, primary)?;
        Ok(Document {
            included,
            ..Document::new(PrimaryData::Collection(nodes))
        })
    }

    fn run(
        &self,
        spec: &QuerySpecification,
        primary: &[O],
    ) -> Result<(Vec<ResourceNode>, Vec<ResourceNode>), AssemblyError> {
        let mut assembly = Assembly {
            assembler: self,
            spec,
            plans: FxHashMap::default(),
            primary: Vec::with_capacity(primary.len()),
            included: Vec::new(),
            slots: FxHashMap::default(),
            expanded: FxHashSet::default(),
            queue: VecDeque::new(),
        };
        for object in primary {
            assembly.add_primary(&spec.resource_type, object)?;
        }
        while let Some(pending) = assembly.queue.pop_front() {
            assembly.expand(pending)?;
        }
        debug!(
            resource_type = %spec.resource_type,
            primary = assembly.primary.len(),
            included = assembly.included.len(),
            "assembled document"
        );
        Ok((assembly.primary, assembly.included))
    }
}

#[derive(Clone, Copy, Debug)]
enum Slot {
    Primary(usize),
    Included(usize),
}

/// Per-type attribute and relationship lists after sparse-fieldset filtering.
struct ProjectionPlan {
    attributes: Vec<String>,
    relationships: Vec<(String, RelationshipMeta)>,
}

struct Pending<'t, O> {
    resource_type: String,
    object: O,
    slot: Slot,
    tree: &'t IncludeTree,
    prefix: String,
}

struct Assembly<'s, 'a, O> {
    assembler: &'s DocumentAssembler<'a, O>,
    spec: &'s QuerySpecification,
    plans: FxHashMap<String, Rc<ProjectionPlan>>,
    primary: Vec<ResourceNode>,
    included: Vec<ResourceNode>,
    slots: FxHashMap<ResourceIdentifier, Slot>,
    expanded: FxHashSet<(ResourceIdentifier, String)>,
    queue: VecDeque<Pending<'s, O>>,
}

impl<'s, 'a, O: Clone> Assembly<'s, 'a, O> {
    fn add_primary(&mut self, resource_type: &str, object: &O) -> Result<(), AssemblyError> {
        let node = self.project(resource_type, object)?;
        let identity = node.identifier();
        self.primary.push(node);
        if self.slots.contains_key(&identity) {
            return Ok(());
        }
        let slot = Slot::Primary(self.primary.len() - 1);
        self.slots.insert(identity.clone(), slot);
        let spec = self.spec;
        let tree = &spec.include;
        if !tree.is_empty() && self.expanded.insert((identity, String::new())) {
            self.queue.push_back(Pending {
                resource_type: resource_type.to_owned(),
                object: object.clone(),
                slot,
                tree,
                prefix: String::new(),
            });
        }
        Ok(())
    }

    fn expand(&mut self, pending: Pending<'s, O>) -> Result<(), AssemblyError> {
        let assembler = self.assembler;
        for (name, subtree) in pending.tree.children() {
            let meta = assembler
                .metadata
                .relationship(&pending.resource_type, name)
                .cloned()
                .ok_or_else(|| AssemblyError::UnknownRelationship {
                    resource_type: pending.resource_type.clone(),
                    relationship: name.to_owned(),
                })?;
            let related = self.resolve(&pending.resource_type, &pending.object, pending.slot, name)?;
            let prefix = if pending.prefix.is_empty() {
                name.to_owned()
            } else {
                format!("{}.{name}", pending.prefix)
            };

            let mut identities = Vec::new();
            for object in related.iter() {
                let identity = ResourceIdentifier::new(
                    &meta.target,
                    assembler.reader.identifier_of(&meta.target, object),
                );
                let slot = match self.slots.get(&identity) {
                    Some(slot) => *slot,
                    None => {
                        let node = self.project(&meta.target, object)?;
                        self.included.push(node);
                        let slot = Slot::Included(self.included.len() - 1);
                        self.slots.insert(identity.clone(), slot);
                        trace!(
                            resource_type = %identity.resource_type,
                            id = %identity.id,
                            path = %prefix,
                            "included resource"
                        );
                        slot
                    }
                };
                if !subtree.is_empty() && self.expanded.insert((identity.clone(), prefix.clone())) {
                    self.queue.push_back(Pending {
                        resource_type: meta.target.clone(),
                        object: object.clone(),
                        slot,
                        tree: subtree,
                        prefix: prefix.clone(),
                    });
                }
                identities.push(identity);
            }

            let visible = self.spec.fields.allows(&pending.resource_type, name);
            if assembler.linkage != LinkagePolicy::Never && visible {
                let data = linkage_for(meta.to_many, identities);
                self.node_mut(pending.slot)
                    .relationships
                    .insert(name.to_owned(), RelationshipObject { data });
            }
        }
        Ok(())
    }

    fn resolve(
        &self,
        resource_type: &str,
        object: &O,
        slot: Slot,
        relationship: &str,
    ) -> Result<Related<O>, AssemblyError> {
        self.assembler
            .accessor
            .resolve(resource_type, object, relationship)
            .map_err(|source| AssemblyError::Accessor {
                resource_type: resource_type.to_owned(),
                id: self.node(slot).id.clone(),
                relationship: relationship.to_owned(),
                source,
            })
    }

    fn project(&mut self, resource_type: &str, object: &O) -> Result<ResourceNode, AssemblyError> {
        let plan = self.plan(resource_type)?;
        let reader = self.assembler.reader;
        let mut node = ResourceNode::new(resource_type, reader.identifier_of(resource_type, object));
        for attribute in &plan.attributes {
            if let Some(value) = reader.attribute_of(resource_type, object, attribute) {
                node.attributes.insert(attribute.clone(), value);
            }
        }
        if self.assembler.linkage == LinkagePolicy::Always {
            for (name, meta) in &plan.relationships {
                let related = self
                    .assembler
                    .accessor
                    .resolve(resource_type, object, name)
                    .map_err(|source| AssemblyError::Accessor {
                        resource_type: resource_type.to_owned(),
                        id: node.id.clone(),
                        relationship: name.clone(),
                        source,
                    })?;
                let identities = related
                    .iter()
                    .map(|o| {
                        ResourceIdentifier::new(&meta.target, reader.identifier_of(&meta.target, o))
                    })
                    .collect();
                let data = linkage_for(meta.to_many, identities);
                node.relationships
                    .insert(name.clone(), RelationshipObject { data });
            }
        }
        Ok(node)
    }

    fn plan(&mut self, resource_type: &str) -> Result<Rc<ProjectionPlan>, AssemblyError> {
        if let Some(plan) = self.plans.get(resource_type) {
            return Ok(Rc::clone(plan));
        }
        let metadata = self.assembler.metadata;
        let fields = &self.spec.fields;
        let attributes = metadata
            .attributes_of(resource_type)
            .ok_or_else(|| AssemblyError::UnknownResourceType(resource_type.to_owned()))?
            .iter()
            .filter(|name| fields.allows(resource_type, name))
            .cloned()
            .collect();
        let relationships = metadata
            .relationships_of(resource_type)
            .into_iter()
            .flatten()
            .filter(|(name, _)| fields.allows(resource_type, name))
            .map(|(name, meta)| (name.clone(), meta.clone()))
            .collect();
        let plan = Rc::new(ProjectionPlan {
            attributes,
            relationships,
        });
        self.plans
            .insert(resource_type.to_owned(), Rc::clone(&plan));
        Ok(plan)
    }

    fn node(&self, slot: Slot) -> &ResourceNode {
        match slot {
            Slot::Primary(idx) => &self.primary[idx],
            Slot::Included(idx) => &self.included[idx],
        }
    }

    fn node_mut(&mut self, slot: Slot) -> &mut ResourceNode {
        match slot {
            Slot::Primary(idx) => &mut self.primary[idx],
            Slot::Included(idx) => &mut self.included[idx],
        }
    }
}

/// Linkage shaped by the declared cardinality, whatever the accessor returned.
fn linkage_for(to_many: bool, identities: Vec<ResourceIdentifier>) -> Linkage {
    if to_many {
        Linkage::ToMany(identities)
    } else {
        Linkage::ToOne(identities.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::query::{
        builder::QuerySpecBuilder,
        metadata::{InMemoryMetadata, RelationshipMeta},
        operators::OperatorRegistry,
    };
    use crate::repository::memory::{MemoryStore, StoredRef};
    use serde_json::json;

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_type("articles", ["title", "body"])
            .with_type("people", ["name"])
            .with_type("comments", ["text"])
            .with_type("orgs", ["name"])
            .with_relationship("articles", "author", RelationshipMeta::to_one("people"))
            .with_relationship("articles", "comments", RelationshipMeta::to_many("comments"))
            .with_relationship("comments", "author", RelationshipMeta::to_one("people"))
            .with_relationship("people", "articles", RelationshipMeta::to_many("articles"))
            .with_relationship("people", "affiliation", RelationshipMeta::to_one("orgs"))
    }

    fn store(meta: &InMemoryMetadata) -> MemoryStore {
        MemoryStore::from_value(
            json!({
                "articles": [
                    {"id": "1", "attributes": {"title": "Dune", "body": "..."},
                     "relationships": {"author": "9", "comments": ["c1"]}},
                    {"id": "2", "attributes": {"title": "Children of Dune", "body": "..."},
                     "relationships": {"author": "9"}}
                ],
                "comments": [{"id": "c1", "attributes": {"text": "great"}, "relationships": {"author": "9"}}],
                "people": [{"id": "9", "attributes": {"name": "Frank"},
                            "relationships": {"articles": ["1", "2"], "affiliation": "o1"}}],
                "orgs": [{"id": "o1", "attributes": {"name": "Chilton"}}]
            }),
            meta,
        )
        .expect("fixture loads")
    }

    fn spec(meta: &InMemoryMetadata, query: &str) -> QuerySpecification {
        let operators = OperatorRegistry::with_builtins();
        let config = QueryConfig::default();
        QuerySpecBuilder::new(meta, &operators, &config)
            .build_from_query_string("articles", query)
            .expect("valid query")
    }

    fn assembler<'a>(
        meta: &'a InMemoryMetadata,
        store: &'a MemoryStore,
    ) -> DocumentAssembler<'a, StoredRef> {
        DocumentAssembler::new(meta, store, store)
    }

    fn all_articles(store: &MemoryStore) -> Vec<StoredRef> {
        vec![
            StoredRef::clone(store.get("articles", "1").unwrap()),
            StoredRef::clone(store.get("articles", "2").unwrap()),
        ]
    }

    fn included_ids(doc: &Document) -> Vec<String> {
        doc.included
            .iter()
            .map(|n| format!("{}/{}", n.resource_type, n.id))
            .collect()
    }

    #[test]
    fn shared_author_is_included_once() {
        let meta = metadata();
        let store = store(&meta);
        let doc = assembler(&meta, &store)
            .assemble_collection(&spec(&meta, "include=author"), &all_articles(&store))
            .unwrap();
        assert_eq!(included_ids(&doc), vec!["people/9"]);
        for node in doc.data.nodes() {
            assert_eq!(
                node.relationships["author"].data,
                Linkage::ToOne(Some(ResourceIdentifier::new("people", "9")))
            );
            assert!(!node.relationships.contains_key("comments"));
        }
    }

    #[test]
    fn cycles_terminate_without_duplicating_primary() {
        let meta = metadata();
        let store = store(&meta);
        let doc = assembler(&meta, &store)
            .assemble_collection(
                &spec(&meta, "include=author.articles.author"),
                &all_articles(&store)[..1],
            )
            .unwrap();
        assert_eq!(included_ids(&doc), vec!["people/9", "articles/2"]);
        let author = doc.find_included("people", "9").unwrap();
        assert_eq!(
            author.relationships["articles"].data,
            Linkage::ToMany(vec![
                ResourceIdentifier::new("articles", "1"),
                ResourceIdentifier::new("articles", "2"),
            ])
        );
    }

    #[test]
    fn deeper_paths_expand_already_included_nodes() {
        let meta = metadata();
        let store = store(&meta);
        let doc = assembler(&meta, &store)
            .assemble_collection(
                &spec(&meta, "include=author,comments.author.affiliation"),
                &all_articles(&store)[..1],
            )
            .unwrap();
        assert_eq!(
            included_ids(&doc),
            vec!["people/9", "comments/c1", "orgs/o1"]
        );
        let author = doc.find_included("people", "9").unwrap();
        assert!(author.relationships.contains_key("affiliation"));
    }

    #[test]
    fn sparse_fields_restrict_attributes_and_linkage() {
        let meta = metadata();
        let store = store(&meta);
        let doc = assembler(&meta, &store)
            .assemble_collection(
                &spec(&meta, "include=author&fields[articles]=title&fields[people]="),
                &all_articles(&store),
            )
            .unwrap();
        for node in doc.data.nodes() {
            assert_eq!(node.attributes.keys().collect::<Vec<_>>(), vec!["title"]);
            assert!(node.relationships.is_empty());
        }
        assert!(doc.included[0].attributes.is_empty());
    }

    #[test]
    fn linkage_policies() {
        let meta = metadata();
        let store = store(&meta);
        let plain = spec(&meta, "");
        let article = StoredRef::clone(store.get("articles", "1").unwrap());

        let always = assembler(&meta, &store)
            .with_linkage(LinkagePolicy::Always)
            .assemble_one(&plain, Some(&article))
            .unwrap();
        let node = always.data.nodes()[0];
        assert_eq!(node.relationships.len(), 2);
        assert!(always.included.is_empty());

        let with_include = spec(&meta, "include=author");
        let never = assembler(&meta, &store)
            .with_linkage(LinkagePolicy::Never)
            .assemble_one(&with_include, Some(&article))
            .unwrap();
        assert!(never.data.nodes()[0].relationships.is_empty());
        assert_eq!(never.included.len(), 1);
    }

    #[test]
    fn missing_primary_renders_null() {
        let meta = metadata();
        let store = store(&meta);
        let doc = assembler(&meta, &store)
            .assemble_one(&spec(&meta, "include=author"), None)
            .unwrap();
        assert_eq!(doc.to_json(), json!({"data": null}));
    }

    struct FailingAccessor;

    impl RelationshipAccessor<StoredRef> for FailingAccessor {
        fn resolve(
            &self,
            _resource_type: &str,
            _object: &StoredRef,
            _relationship: &str,
        ) -> Result<Related<StoredRef>, AccessorError> {
            Err("backend unavailable".into())
        }
    }

    struct SingleAccessor<'a>(&'a MemoryStore);

    impl RelationshipAccessor<StoredRef> for SingleAccessor<'_> {
        fn resolve(
            &self,
            resource_type: &str,
            object: &StoredRef,
            relationship: &str,
        ) -> Result<Related<StoredRef>, AccessorError> {
            let related = self.0.resolve(resource_type, object, relationship)?;
            let first = related.iter().next().cloned();
            Ok(Related::ToOne(first))
        }
    }

    #[test]
    fn linkage_shape_follows_declared_cardinality() {
        let meta = metadata();
        let store = store(&meta);
        let accessor = SingleAccessor(&store);
        let article = vec![StoredRef::clone(store.get("articles", "1").unwrap())];
        let doc = DocumentAssembler::<StoredRef>::new(&meta, &store, &accessor)
            .assemble_collection(&spec(&meta, "include=comments"), &article)
            .unwrap();
        assert_eq!(
            doc.data.nodes()[0].relationships["comments"].data,
            Linkage::ToMany(vec![ResourceIdentifier::new("comments", "c1")])
        );

        let doc = DocumentAssembler::<StoredRef>::new(&meta, &store, &accessor)
            .with_linkage(LinkagePolicy::Always)
            .assemble_collection(&spec(&meta, ""), &article)
            .unwrap();
        assert_eq!(
            doc.data.nodes()[0].relationships["comments"].data,
            Linkage::ToMany(vec![ResourceIdentifier::new("comments", "c1")])
        );
    }

    #[test]
    fn accessor_failure_is_fatal() {
        let meta = metadata();
        let store = store(&meta);
        let err = DocumentAssembler::<StoredRef>::new(&meta, &store, &FailingAccessor)
            .assemble_collection(&spec(&meta, "include=author"), &all_articles(&store))
            .unwrap_err();
        assert_eq!(err.code(), "RelationshipAccessorFailed");
        assert_eq!(
            err.to_string(),
            "failed to resolve relationship 'author' of articles/1: backend unavailable"
        );
    }
}
