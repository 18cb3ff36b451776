//! Arena-backed binary field tree.
//!
//! Every node lives in a slot of [`FieldTree`] and is addressed by a
//! [`NodeId`]. Parent links, child lists and the sibling dependency graph are
//! all expressed as handles, so a tree can be cloned wholesale and every
//! handle stays valid in the copy.
//!
//! A node encodes as `prefix + (override or structural encoding) + suffix`.
//! Derived nodes (length fields) recompute from their sibling dependencies
//! whenever one of those siblings changes, unless they have been detached.

use crate::codec::{self, CodecError};
use crate::fields::FieldKind;
use crate::mutation::{MutationWeights, WeightError};
use slog::{Logger, debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Stable handle to a node inside one [`FieldTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised while building or editing a field tree.
///
/// These indicate a bug in how a test case is put together rather than an
/// intentionally malformed encoding, so they are surfaced immediately.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("node {0} does not exist in this tree")]
    UnknownNode(NodeId),

    #[error("node {0} is already attached to a parent")]
    AlreadyAttached(NodeId),

    #[error("node {parent} already has a child named {key:?}")]
    DuplicateKey { parent: NodeId, key: String },

    #[error("node {parent} has no child named {key:?}")]
    MissingChild { parent: NodeId, key: String },

    #[error("dependency {dependent:?} -> {dependency:?} would create a cycle")]
    DependencyCycle {
        dependent: String,
        dependency: String,
    },

    #[error("list of {expected:?} cannot hold a {found:?}")]
    ElementMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("bit field expects {expected} bits, got {found}")]
    BitWidth { expected: usize, found: usize },

    #[error("{op} does not apply to {type_name:?} ({kind} node)")]
    KindMismatch {
        op: &'static str,
        type_name: &'static str,
        kind: &'static str,
    },

    #[error("invalid IP prefix {0:?}")]
    InvalidPrefix(String),

    #[error("mutation operator {index} out of range, {type_name:?} registers {count}")]
    UnknownOperator {
        type_name: &'static str,
        index: usize,
        count: usize,
    },

    #[error("mutation {op} received arguments of the wrong shape")]
    ArgumentMismatch { op: &'static str },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Weights(#[from] WeightError),
}

/// Which part of a node's state a setter touches. Determines what the
/// setter protocol clears before running the setter body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetterKind {
    Raw,
    Wrapper,
    Domain,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) type_name: &'static str,
    pub(crate) kind: FieldKind,
    pub(crate) children: Vec<(String, NodeId)>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) dependencies: Vec<NodeId>,
    pub(crate) dependents: Vec<NodeId>,
    pub(crate) detached: bool,
    pub(crate) override_bytes: Option<Vec<u8>>,
    pub(crate) prefix: Vec<u8>,
    pub(crate) suffix: Vec<u8>,
    pub(crate) weights: MutationWeights,
    // Encoding seen by the last recompute; only used for change detection.
    snapshot: Vec<u8>,
}

impl Node {
    pub(crate) fn new(type_name: &'static str, kind: FieldKind) -> Self {
        let weights = MutationWeights::uniform(kind.operators().len());
        Self {
            type_name,
            kind,
            children: Vec::new(),
            parent: None,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            detached: false,
            override_bytes: None,
            prefix: Vec::new(),
            suffix: Vec::new(),
            weights,
            snapshot: Vec::new(),
        }
    }
}

/// Owning arena for a forest of field nodes.
#[derive(Debug, Clone)]
pub struct FieldTree {
    nodes: Vec<Option<Node>>,
    log: Logger,
}

impl FieldTree {
    pub fn new(log: Logger) -> Self {
        Self {
            nodes: Vec::new(),
            log,
        }
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    pub(crate) fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(node));
        let encoded = self.encode_live(id);
        if let Some(Some(node)) = self.nodes.get_mut(id.0) {
            node.snapshot = encoded;
        }
        id
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, FieldError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(FieldError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, FieldError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(FieldError::UnknownNode(id))
    }

    // Encoding

    /// Bytes this node puts on the wire.
    pub fn encode(&self, id: NodeId) -> Result<Vec<u8>, FieldError> {
        self.node(id)?;
        Ok(self.encode_live(id))
    }

    pub fn byte_length(&self, id: NodeId) -> Result<usize, FieldError> {
        Ok(self.encode(id)?.len())
    }

    /// The node's own encoding, ignoring any override and wrappers.
    pub fn structural_encoding(&self, id: NodeId) -> Result<Vec<u8>, FieldError> {
        let node = self.node(id)?;
        let mut out = Vec::new();
        self.structural_into(node, &mut out);
        Ok(out)
    }

    fn encode_live(&self, id: NodeId) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(id, &mut out);
        out
    }

    fn encode_into(&self, id: NodeId, out: &mut Vec<u8>) {
        let Ok(node) = self.node(id) else {
            return;
        };
        out.extend_from_slice(&node.prefix);
        match &node.override_bytes {
            Some(bytes) => out.extend_from_slice(bytes),
            None => self.structural_into(node, out),
        }
        out.extend_from_slice(&node.suffix);
    }

    fn structural_into(&self, node: &Node, out: &mut Vec<u8>) {
        match node.kind.leaf_encoding() {
            Some(bytes) => out.extend_from_slice(&bytes),
            None => {
                for (_, child) in &node.children {
                    self.encode_into(*child, out);
                }
            }
        }
    }

    // Navigation

    pub fn type_name(&self, id: NodeId) -> Result<&'static str, FieldError> {
        Ok(self.node(id)?.type_name)
    }

    pub fn kind(&self, id: NodeId) -> Result<&FieldKind, FieldError> {
        Ok(&self.node(id)?.kind)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, FieldError> {
        Ok(self.node(id)?.parent)
    }

    /// Children in wire order, with their keys.
    pub fn children(&self, id: NodeId) -> Result<Vec<(&str, NodeId)>, FieldError> {
        Ok(self
            .node(id)?
            .children
            .iter()
            .map(|(key, child)| (key.as_str(), *child))
            .collect())
    }

    pub fn child(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.node(parent)
            .ok()?
            .children
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| *id)
    }

    /// Walks a `/`-separated path of child keys starting at `root`.
    pub fn resolve(&self, root: NodeId, path: &str) -> Result<NodeId, FieldError> {
        let mut current = root;
        self.node(current)?;
        for key in path.split('/').filter(|k| !k.is_empty()) {
            current = self
                .child(current, key)
                .ok_or_else(|| FieldError::MissingChild {
                    parent: current,
                    key: key.to_string(),
                })?;
        }
        Ok(current)
    }

    pub fn dependencies(&self, id: NodeId) -> Result<&[NodeId], FieldError> {
        Ok(&self.node(id)?.dependencies)
    }

    pub fn dependents(&self, id: NodeId) -> Result<&[NodeId], FieldError> {
        Ok(&self.node(id)?.dependents)
    }

    pub fn is_detached(&self, id: NodeId) -> Result<bool, FieldError> {
        Ok(self.node(id)?.detached)
    }

    pub fn prefix(&self, id: NodeId) -> Result<&[u8], FieldError> {
        Ok(&self.node(id)?.prefix)
    }

    pub fn suffix(&self, id: NodeId) -> Result<&[u8], FieldError> {
        Ok(&self.node(id)?.suffix)
    }

    pub fn override_bytes(&self, id: NodeId) -> Result<Option<&[u8]>, FieldError> {
        Ok(self.node(id)?.override_bytes.as_deref())
    }

    /// `root` and everything below it, in pre-order.
    pub fn descendants(&self, root: NodeId) -> Result<Vec<NodeId>, FieldError> {
        self.node(root)?;
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Ok(node) = self.node(id) {
                stack.extend(node.children.iter().rev().map(|(_, c)| *c));
            }
        }
        Ok(order)
    }

    // Structure

    /// Adopts `child` under an auto-generated key `<type-name>_<n>`, using the
    /// smallest `n` not already taken among the parent's children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<String, FieldError> {
        let key = self.next_key(parent, self.type_name(child)?)?;
        self.insert_child(parent, &key, child)?;
        Ok(key)
    }

    /// Adopts `child` under an explicit key, after the existing children.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        key: &str,
        child: NodeId,
    ) -> Result<(), FieldError> {
        let position = self.node(parent)?.children.len();
        self.link_child(parent, position, key, child)?;
        if self.node(child)?.detached {
            self.detach(parent)?;
        }
        self.update(parent)
    }

    pub(crate) fn next_key(
        &self,
        parent: NodeId,
        type_name: &str,
    ) -> Result<String, FieldError> {
        let taken: HashSet<&str> = self
            .node(parent)?
            .children
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        let key = (0..)
            .map(|n| format!("{type_name}_{n}"))
            .find(|k| !taken.contains(k.as_str()))
            .unwrap_or_else(|| type_name.to_string());
        Ok(key)
    }

    /// Wires `child` under `parent` at `position` without recomputing anything.
    pub(crate) fn link_child(
        &mut self,
        parent: NodeId,
        position: usize,
        key: &str,
        child: NodeId,
    ) -> Result<(), FieldError> {
        let child_node = self.node(child)?;
        if child_node.parent.is_some() || child == parent || self.root_of(parent)? == child {
            return Err(FieldError::AlreadyAttached(child));
        }
        let found = child_node.type_name;
        let parent_node = self.node(parent)?;
        match &parent_node.kind {
            FieldKind::List {
                element: Some(expected),
            } if *expected != found => {
                return Err(FieldError::ElementMismatch {
                    expected: *expected,
                    found,
                });
            }
            FieldKind::List { .. } | FieldKind::Composite => {}
            other => {
                return Err(FieldError::KindMismatch {
                    op: "insert_child",
                    type_name: parent_node.type_name,
                    kind: other.name(),
                });
            }
        }
        if parent_node.children.iter().any(|(k, _)| k == key) {
            return Err(FieldError::DuplicateKey {
                parent,
                key: key.to_string(),
            });
        }

        self.node_mut(child)?.parent = Some(parent);
        let children = &mut self.node_mut(parent)?.children;
        let position = position.min(children.len());
        children.insert(position, (key.to_string(), child));
        Ok(())
    }

    /// Undoes a failed construction: every child already linked under `id`
    /// becomes an orphan again, and the slot of `id` is freed.
    pub(crate) fn release_unfinished(&mut self, id: NodeId) -> Result<(), FieldError> {
        let children: Vec<NodeId> = self.node(id)?.children.iter().map(|(_, c)| *c).collect();
        for child in children {
            let node = self.node_mut(child)?;
            node.parent = None;
            node.dependencies.clear();
            node.dependents.clear();
        }
        self.nodes[id.0] = None;
        Ok(())
    }

    fn root_of(&self, id: NodeId) -> Result<NodeId, FieldError> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Drops the child stored under `key` together with its subtree.
    ///
    /// A missing key is logged and ignored.
    pub fn remove_child(&mut self, parent: NodeId, key: &str) -> Result<(), FieldError> {
        let position = self.node(parent)?.children.iter().position(|(k, _)| k == key);
        let Some(position) = position else {
            warn!(self.log, "no child to remove";
                "parent" => %parent,
                "key" => key,
            );
            return Ok(());
        };
        let orphaned = self.unlink_child_at(parent, position)?;
        for dependent in orphaned {
            self.update(dependent)?;
        }
        self.update(parent)
    }

    /// Unhooks the child at `position`, frees its subtree and returns the
    /// siblings that depended on it.
    pub(crate) fn unlink_child_at(
        &mut self,
        parent: NodeId,
        position: usize,
    ) -> Result<Vec<NodeId>, FieldError> {
        let (_, removed) = self.node_mut(parent)?.children.remove(position);
        let (dependencies, dependents) = {
            let node = self.node(removed)?;
            (node.dependencies.clone(), node.dependents.clone())
        };
        for dependency in &dependencies {
            self.node_mut(*dependency)?.dependents.retain(|d| *d != removed);
        }
        for dependent in &dependents {
            self.node_mut(*dependent)?.dependencies.retain(|d| *d != removed);
        }
        for id in self.descendants(removed)? {
            self.nodes[id.0] = None;
        }
        Ok(dependents)
    }

    /// Deep-copies the subtree at `id` into fresh slots. The copy is an
    /// orphan without sibling edges; edges inside the subtree are remapped.
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId, FieldError> {
        let originals = self.descendants(id)?;
        let mut remap = HashMap::new();
        for old in &originals {
            let copy = self.node(*old)?.clone();
            let new = NodeId(self.nodes.len());
            self.nodes.push(Some(copy));
            remap.insert(*old, new);
        }
        for old in &originals {
            let new = remap[old];
            let node = self.node_mut(new)?;
            node.children = node
                .children
                .iter()
                .map(|(k, c)| (k.clone(), remap[c]))
                .collect();
            if *old == id {
                node.parent = None;
                node.dependencies.clear();
                node.dependents.clear();
            } else {
                node.parent = node.parent.map(|p| remap[&p]);
                node.dependencies.retain(|d| remap.contains_key(d));
                node.dependencies.iter_mut().for_each(|d| *d = remap[&*d]);
                node.dependents.retain(|d| remap.contains_key(d));
                node.dependents.iter_mut().for_each(|d| *d = remap[&*d]);
            }
        }
        Ok(remap[&id])
    }

    // Dependencies

    /// Records that child `dependent_key` of `parent` derives its value from
    /// child `dependency_key`. Edges that would close a cycle are refused.
    pub fn declare_dependency(
        &mut self,
        parent: NodeId,
        dependent_key: &str,
        dependency_key: &str,
    ) -> Result<(), FieldError> {
        self.link_dependency(parent, dependent_key, dependency_key)?;
        let dependent = self.resolve(parent, dependent_key)?;
        self.update(dependent)
    }

    pub(crate) fn link_dependency(
        &mut self,
        parent: NodeId,
        dependent_key: &str,
        dependency_key: &str,
    ) -> Result<(), FieldError> {
        let lookup = |key: &str| {
            self.child(parent, key)
                .ok_or_else(|| FieldError::MissingChild {
                    parent,
                    key: key.to_string(),
                })
        };
        let dependent = lookup(dependent_key)?;
        let dependency = lookup(dependency_key)?;

        if self.node(dependent)?.dependencies.contains(&dependency) {
            return Ok(());
        }
        if dependent == dependency || self.depends_on(dependency, dependent)? {
            return Err(FieldError::DependencyCycle {
                dependent: dependent_key.to_string(),
                dependency: dependency_key.to_string(),
            });
        }
        self.node_mut(dependent)?.dependencies.push(dependency);
        self.node_mut(dependency)?.dependents.push(dependent);
        Ok(())
    }

    /// Removes a previously declared edge; unknown keys or edges are logged
    /// and ignored.
    pub fn remove_dependency(
        &mut self,
        parent: NodeId,
        dependent_key: &str,
        dependency_key: &str,
    ) -> Result<(), FieldError> {
        self.node(parent)?;
        let edge = self
            .child(parent, dependent_key)
            .zip(self.child(parent, dependency_key))
            .filter(|(dependent, dependency)| {
                self.node(*dependent)
                    .map(|n| n.dependencies.contains(dependency))
                    .unwrap_or(false)
            });
        let Some((dependent, dependency)) = edge else {
            warn!(self.log, "no dependency to remove";
                "parent" => %parent,
                "dependent" => dependent_key,
                "dependency" => dependency_key,
            );
            return Ok(());
        };
        self.node_mut(dependent)?.dependencies.retain(|d| *d != dependency);
        self.node_mut(dependency)?.dependents.retain(|d| *d != dependent);
        self.update(dependent)
    }

    /// Whether `from` transitively depends on `target`.
    fn depends_on(&self, from: NodeId, target: NodeId) -> Result<bool, FieldError> {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return Ok(true);
            }
            if seen.insert(id) {
                stack.extend(self.node(id)?.dependencies.iter().copied());
            }
        }
        Ok(false)
    }

    /// Children of `parent` ordered so every node follows its dependencies.
    fn dependency_order(&self, parent: NodeId) -> Result<Vec<NodeId>, FieldError> {
        let children: Vec<NodeId> = self.node(parent)?.children.iter().map(|(_, c)| *c).collect();
        let mut placed = HashSet::new();
        let mut order = Vec::with_capacity(children.len());
        while order.len() < children.len() {
            let before = order.len();
            for child in &children {
                if placed.contains(child) {
                    continue;
                }
                let ready = self
                    .node(*child)?
                    .dependencies
                    .iter()
                    .all(|d| placed.contains(d) || !children.contains(d));
                if ready {
                    placed.insert(*child);
                    order.push(*child);
                }
            }
            if order.len() == before {
                // Unreachable while declare_dependency refuses cycles.
                order.extend(children.iter().filter(|c| !placed.contains(*c)));
                break;
            }
        }
        Ok(order)
    }

    // Detach / attach

    /// Freezes `id` and every ancestor against automatic recomputation.
    pub fn detach(&mut self, id: NodeId) -> Result<(), FieldError> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node_mut(node_id)?;
            node.detached = true;
            current = node.parent;
        }
        Ok(())
    }

    /// Releases the freeze on `id` alone and recomputes it. Descendants keep
    /// whatever overrides they carry.
    pub fn attach(&mut self, id: NodeId) -> Result<(), FieldError> {
        self.node_mut(id)?.detached = false;
        self.update(id)
    }

    /// Marks `id` detached when any of its children already is.
    pub fn detach_according_to_children(&mut self, id: NodeId) -> Result<(), FieldError> {
        let any_detached = self
            .node(id)?
            .children
            .iter()
            .any(|(_, c)| self.node(*c).map(|n| n.detached).unwrap_or(false));
        if any_detached {
            self.node_mut(id)?.detached = true;
        }
        Ok(())
    }

    // Propagation

    /// Recomputes `id` and, if its encoding changed, ripples the change to its
    /// dependents and then to its parent.
    pub fn update(&mut self, id: NodeId) -> Result<(), FieldError> {
        if !self.recompute(id)? {
            return Ok(());
        }
        let (dependents, parent) = {
            let node = self.node(id)?;
            (node.dependents.clone(), node.parent)
        };
        trace!(self.log, "field changed";
            "node" => %id,
            "dependents" => dependents.len(),
        );
        for dependent in dependents {
            self.update(dependent)?;
        }
        if let Some(parent) = parent {
            self.update(parent)?;
        }
        Ok(())
    }

    /// Brings one node up to date and reports whether its encoding differs
    /// from the last one observed.
    ///
    /// Detached nodes keep their state untouched; only their change snapshot
    /// is refreshed, so ancestors above a frozen node still see changes.
    fn recompute(&mut self, id: NodeId) -> Result<bool, FieldError> {
        if !self.node(id)?.detached {
            let node = self.node_mut(id)?;
            node.prefix.clear();
            node.suffix.clear();
            node.override_bytes = None;
            self.recompute_from_dependencies(id)?;
        }
        let fresh = self.encode_live(id);
        let node = self.node_mut(id)?;
        let changed = fresh != node.snapshot;
        node.snapshot = fresh;
        Ok(changed)
    }

    fn recompute_from_dependencies(&mut self, id: NodeId) -> Result<(), FieldError> {
        let node = self.node(id)?;
        let FieldKind::Length(length) = node.kind else {
            return Ok(());
        };
        if node.dependencies.is_empty() {
            return Ok(());
        }
        let mut total = node
            .dependencies
            .iter()
            .map(|d| self.encode_live(*d).len() as u128)
            .sum::<u128>();
        if length.count_self {
            total += length.width as u128;
        }
        let (value, overflowed) = codec::wrap_uint(total, length.width);
        if overflowed {
            warn!(self.log, "derived length wrapped to field width";
                "node" => %id,
                "length" => %total,
                "width" => length.width,
            );
        }
        if let FieldKind::Length(length) = &mut self.node_mut(id)?.kind {
            length.value = value;
        }
        Ok(())
    }

    /// Bottom-up construction pass: every node under `id` is brought in line
    /// with its dependencies, siblings in dependency order.
    pub(crate) fn finalize(&mut self, id: NodeId) -> Result<(), FieldError> {
        let children: Vec<NodeId> = self.node(id)?.children.iter().map(|(_, c)| *c).collect();
        for child in children {
            self.finalize(child)?;
        }
        for child in self.dependency_order(id)? {
            self.recompute(child)?;
        }
        self.recompute(id)?;
        Ok(())
    }

    // Setters

    /// Uniform wrapper around every state-changing operation: freeze the node
    /// and its ancestors, clear what the setter kind supersedes, run the body,
    /// then ripple the change outward.
    pub(crate) fn run_setter<F>(
        &mut self,
        id: NodeId,
        kind: SetterKind,
        body: F,
    ) -> Result<(), FieldError>
    where
        F: FnOnce(&mut Self) -> Result<(), FieldError>,
    {
        self.detach(id)?;
        let node = self.node_mut(id)?;
        if kind != SetterKind::Wrapper {
            node.override_bytes = None;
        }
        if kind == SetterKind::Raw {
            node.prefix.clear();
            node.suffix.clear();
        }
        body(self)?;
        debug!(self.log, "field set"; "node" => %id, "setter" => ?kind);
        self.update(id)
    }

    /// Replaces the node's structural encoding with `bytes`.
    pub fn set_raw(&mut self, id: NodeId, bytes: Vec<u8>) -> Result<(), FieldError> {
        self.run_setter(id, SetterKind::Raw, |tree| {
            tree.node_mut(id)?.override_bytes = Some(bytes);
            Ok(())
        })
    }

    pub fn set_prefix(&mut self, id: NodeId, bytes: Vec<u8>) -> Result<(), FieldError> {
        self.run_setter(id, SetterKind::Wrapper, |tree| {
            tree.node_mut(id)?.prefix = bytes;
            Ok(())
        })
    }

    pub fn set_suffix(&mut self, id: NodeId, bytes: Vec<u8>) -> Result<(), FieldError> {
        self.run_setter(id, SetterKind::Wrapper, |tree| {
            tree.node_mut(id)?.suffix = bytes;
            Ok(())
        })
    }
}
