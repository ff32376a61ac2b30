//! Request context chain.
//!
//! # Data Flow
//! ```text
//! Context::root()                  RootContext { id }
//!     → Router pushes              UriRouterContext { matched, remaining, vars }
//!     → VersionRouter pushes       ApiVersionRouterContext { version }
//!     → handler reads ctx.get::<UriRouterContext>()  (leaf → root walk)
//! ```
//!
//! # Design Decisions
//! - Each node is immutable and shared through `Arc`; pushing never
//!   touches the parent
//! - Lookup is by `TypeId`, nearest node wins
//! - A chain lives for one request; nothing is global

mod types;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use types::{
    AcceptApiVersionContext, ApiVersionRouterContext, RootContext, SecurityContext,
    UriRouterContext,
};

/// A value that can be stored in a context node.
pub trait ContextValue: Any + Send + Sync {
    /// Short name of the context kind, used in logs.
    const KIND: &'static str;
}

struct Node {
    kind: &'static str,
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Context>,
}

/// Handle to one node of a context chain. Cloning is cheap.
#[derive(Clone)]
pub struct Context {
    node: Arc<Node>,
}

impl Context {
    /// A new chain rooted at a [`RootContext`] with a fresh id.
    pub fn root() -> Self {
        Self::new_root(RootContext::new())
    }

    /// A new chain rooted at an arbitrary value.
    pub fn new_root<T: ContextValue>(value: T) -> Self {
        Self {
            node: Arc::new(Node {
                kind: T::KIND,
                value: Box::new(value),
                parent: None,
            }),
        }
    }

    /// A child of this node holding `value`.
    pub fn push<T: ContextValue>(&self, value: T) -> Self {
        Self {
            node: Arc::new(Node {
                kind: T::KIND,
                value: Box::new(value),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Nearest value of type `T`, walking from this node to the root.
    pub fn get<T: ContextValue>(&self) -> Option<&T> {
        self.ancestors()
            .find_map(|ctx| ctx.node.value.downcast_ref::<T>())
    }

    /// Every value of type `T`, leaf first.
    pub fn get_all<T: ContextValue>(&self) -> impl Iterator<Item = &T> {
        self.ancestors()
            .filter_map(|ctx| ctx.node.value.downcast_ref::<T>())
    }

    pub fn contains<T: ContextValue>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Value held by this node, if it has type `T`.
    pub fn value<T: ContextValue>(&self) -> Option<&T> {
        self.node.value.downcast_ref::<T>()
    }

    pub fn parent(&self) -> Option<&Context> {
        self.node.parent.as_ref()
    }

    pub fn kind(&self) -> &'static str {
        self.node.kind
    }

    /// Request id of the root context, if the chain has one.
    pub fn id(&self) -> Option<&str> {
        self.get::<RootContext>().map(|root| root.id.as_str())
    }

    /// This node followed by its parents.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.ancestors().map(|ctx| ctx.kind()))
            .finish()
    }
}

/// Iterator over a context and its parents.
pub struct Ancestors<'a> {
    next: Option<&'a Context>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Context;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(u32);

    impl ContextValue for Marker {
        const KIND: &'static str = "marker";
    }

    #[test]
    fn test_lookup_walks_to_root() {
        let root = Context::root();
        let id = root.id().unwrap().to_string();
        let child = root.push(Marker(1));
        let grandchild = child.push(UriRouterContext::new("users", "42", Default::default()));

        assert_eq!(grandchild.get::<Marker>().unwrap().0, 1);
        assert_eq!(grandchild.id(), Some(id.as_str()));
        assert!(root.get::<Marker>().is_none());
        assert_eq!(grandchild.kind(), "router");
    }

    #[test]
    fn test_nearest_value_wins() {
        let ctx = Context::root().push(Marker(1)).push(Marker(2));
        assert_eq!(ctx.get::<Marker>().unwrap().0, 2);
        let all: Vec<u32> = ctx.get_all::<Marker>().map(|m| m.0).collect();
        assert_eq!(all, vec![2, 1]);
    }

    #[test]
    fn test_push_leaves_parent_untouched() {
        let parent = Context::root();
        let _child = parent.push(Marker(7));
        assert!(!parent.contains::<Marker>());
        assert_eq!(format!("{parent:?}"), "[\"root\"]");
    }

    #[test]
    fn test_root_ids_are_unique() {
        assert_ne!(Context::root().id(), Context::root().id());
    }
}
