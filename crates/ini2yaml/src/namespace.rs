//! Collection of addressable values
//!
//! Every dotted path defined in a file (`globalVars.inst.a = ...`, `SiteID = ...`) gets a slot
//! in an arena. A [Tree] keyed by path segments maps paths to slot [Handle]s.
//!
//! References are resolved to the handle of their target, never to a copy:
//!
//! ```text
//! globalVars.inst.a = [1, 2, 3]          slot #0, tree: globalVars.inst.a -> #0
//! globalVars.inst.b = globalVars.inst.a  no new slot, tree: globalVars.inst.b -> #0
//! globalVars.inst.c = [globalVars.inst.a, 4]
//!                                        slot #1 = [Shared(#0), 4]
//! ```
//!
//! Slots that are the target of at least one reference are marked as shared so the writer can
//! emit them once and alias them everywhere else.
use crate::path::{Path, MAX_DEPTH};
use crate::value::{Handle, Value};
use crate::visit::{VisitMut, VisitValuesMut};
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct Namespace {
    slots: Vec<Slot>,
    tree: Tree,
}

#[derive(Debug)]
pub struct Slot {
    /// path of the first definition
    pub path: Path,
    pub value: Value,
    pub shared: bool,
}

#[derive(Debug, PartialEq)]
pub enum DefineError {
    TooDeep,
    /// the path is an interior node or passes through a leaf
    Collision,
}

#[derive(Debug, PartialEq)]
pub struct Defined {
    pub handle: Handle,
    /// an earlier leaf with the same path was replaced
    pub replaced: bool,
}

impl Namespace {
    /// Bind `path` to `value`
    ///
    /// A [Value::Shared] is bound by handle, so both paths address the same slot afterwards.
    pub fn define(&mut self, path: Path, value: Value) -> Result<Defined, DefineError> {
        if path.depth() > MAX_DEPTH || path.depth() == 0 {
            return Err(DefineError::TooDeep);
        }

        let next_index = self.slots.len();
        let node = self
            .tree
            .get_or_insert(path.segments())
            .ok_or(DefineError::Collision)?;
        if !node.children.is_empty() {
            return Err(DefineError::Collision);
        }

        let replaced = node.value.is_some();
        let handle = match value {
            Value::Shared(handle) => handle,
            value => {
                self.slots.push(Slot {
                    path: path.clone(),
                    value,
                    shared: false,
                });
                Handle(next_index)
            }
        };
        node.value = Some(handle);

        tracing::trace!(%path, ?handle, replaced, "defined");
        Ok(Defined { handle, replaced })
    }

    pub fn lookup(&self, path: &Path) -> Option<Handle> {
        self.tree.get(path.segments())
    }

    /// Unique leaf under the same root whose last segment matches
    pub fn guess(&self, path: &Path) -> Option<(Path, Handle)> {
        let (root, last) = (path.root()?, path.last()?);
        let mut candidates = self
            .leaves()
            .into_iter()
            .filter(|(candidate, _)| candidate.root() == Some(root) && candidate.last() == Some(last));

        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    pub fn get(&self, handle: Handle) -> &Value {
        &self.slots[handle.0].value
    }

    pub fn get_mut(&mut self, handle: Handle) -> &mut Value {
        &mut self.slots[handle.0].value
    }

    pub fn slot(&self, handle: Handle) -> &Slot {
        &self.slots[handle.0]
    }

    pub fn is_shared(&self, handle: Handle) -> bool {
        self.slots[handle.0].shared
    }

    fn mark_shared(&mut self, handle: Handle) {
        self.slots[handle.0].shared = true;
    }

    /// Children of a root segment (`globalVars`, `Metadata`)
    pub fn root(&self, name: &str) -> Option<&Node> {
        self.tree.root.get(name)
    }

    /// All bound paths in definition order
    pub fn leaves(&self) -> Vec<(Path, Handle)> {
        let mut out = vec![];
        for (segment, node) in &self.tree.root {
            node.collect_leaves(vec![segment.clone()], &mut out);
        }
        out
    }

    /// Replace references with shared handles
    ///
    /// Returns the paths that could not be resolved, those stay [Value::Reference]s.
    pub(crate) fn resolve<V: VisitValuesMut>(&mut self, value: &mut V) -> Resolution {
        let mut resolver = ReferenceResolver::new(self);
        value.visit_references_mut(&mut resolver);
        resolver.resolution
    }

    /// Deep copy with every shared handle replaced by its target value
    pub fn materialize(&self, value: &Value) -> Value {
        let mut value = value.clone();
        value.visit_shared_mut(&mut SharedInliner::new(self));
        value
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Resolution {
    pub unresolved: Vec<Path>,
    /// (written, used instead)
    pub guessed: Vec<(Path, Path)>,
}

#[derive(derive_new::new)]
struct ReferenceResolver<'n> {
    namespace: &'n mut Namespace,
    #[new(default)]
    resolution: Resolution,
}

impl VisitMut<Value> for ReferenceResolver<'_> {
    fn visit_mut(&mut self, value: &mut Value) {
        let Value::Reference(path) = value else {
            return;
        };

        let handle = match self.namespace.lookup(path) {
            Some(handle) => handle,
            None => match self.namespace.guess(path) {
                Some((target, handle)) => {
                    self.resolution.guessed.push((path.clone(), target));
                    handle
                }
                None => {
                    self.resolution.unresolved.push(path.clone());
                    return;
                }
            },
        };

        self.namespace.mark_shared(handle);
        *value = Value::Shared(handle);
    }
}

#[derive(derive_new::new)]
struct SharedInliner<'n> {
    namespace: &'n Namespace,
}

impl VisitMut<Value> for SharedInliner<'_> {
    fn visit_mut(&mut self, value: &mut Value) {
        let Value::Shared(handle) = value else {
            return;
        };

        *value = self.namespace.get(*handle).clone();
        value.visit_shared_mut(self);
    }
}

#[derive(Debug, Default)]
pub struct Tree {
    pub root: IndexMap<String, Node>,
}

impl Tree {
    fn get(&self, key_path: &[String]) -> Option<Handle> {
        let (first, rest) = key_path.split_first()?;
        self.root.get(first).and_then(|child| child.get(rest))
    }

    /// `None` if the path passes through a leaf
    fn get_or_insert(&mut self, key_path: &[String]) -> Option<&mut Node> {
        let (first, rest) = key_path.split_first()?;
        self.root
            .entry(first.clone())
            .or_default()
            .get_or_insert(rest)
    }
}

#[derive(Debug, Default)]
pub struct Node {
    pub value: Option<Handle>,
    pub children: IndexMap<String, Node>,
}

impl Node {
    fn get(&self, key_path: &[String]) -> Option<Handle> {
        match key_path.split_first() {
            None => self.value,
            Some((first, rest)) => self.children.get(first).and_then(|child| child.get(rest)),
        }
    }

    fn get_or_insert(&mut self, key_path: &[String]) -> Option<&mut Node> {
        let Some((first, rest)) = key_path.split_first() else {
            return Some(self);
        };

        if self.value.is_some() {
            return None;
        }

        self.children
            .entry(first.clone())
            .or_default()
            .get_or_insert(rest)
    }

    fn collect_leaves(&self, path: Vec<String>, out: &mut Vec<(Path, Handle)>) {
        if let Some(handle) = self.value {
            out.push((Path::new(path.clone()), handle));
        }
        for (segment, child) in &self.children {
            let mut child_path = path.clone();
            child_path.push(segment.clone());
            child.collect_leaves(child_path, out);
        }
    }
}
