//! Segment tree for HTTP route matching
//!
//! Paths are split on `/` into segments (empty segments are dropped, so
//! `"/a//b/"` and `"a/b"` address the same node). Each node owns:
//!
//! - static children keyed by the literal segment text
//! - at most one dynamic child, entered for any segment when no static child
//!   matches, which records the captured segment under its parameter name
//! - the handlers registered at that exact path, keyed by HTTP method
//!
//! Insert and lookup are O(k) in the number of path segments; each step is a
//! single hash lookup.
//!
//! ## Dynamic child naming
//!
//! A node never has more than one dynamic child. Inserting `/users/:id` and
//! then `/users/:slug/posts` reuses the child created for `:id`, and every
//! match through it captures the segment as `id`. The name recorded is the one
//! from the insertion that created the child.
//!
//! ## Precedence
//!
//! A static child always wins over the dynamic child for the same segment and
//! the walk never backtracks: with `/users/me` and `/users/:id/posts`
//! registered, `/users/me/posts` does not match.
//!
//! ```rust
//! use http::Method;
//! use wren::router::PathTree;
//!
//! let mut tree = PathTree::new();
//! tree.insert(Method::GET, "/users/:id", "get_user");
//! tree.insert(Method::GET, "/users/me", "get_me");
//!
//! let found = tree.find(&Method::GET, "/users/42");
//! assert_eq!(found.handler, Some(&"get_user"));
//! assert_eq!(found.param("id"), Some("42"));
//!
//! let found = tree.find(&Method::GET, "/users/me");
//! assert_eq!(found.handler, Some(&"get_me"));
//! assert!(found.params.is_empty());
//! ```

use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

use super::core::ParamVec;

/// Leading character that marks a path segment as dynamic (`:id`).
pub const PARAM_MARKER: char = ':';

/// Split a path into its non-empty `/`-separated segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form of a path pattern: `/` followed by its segments.
pub(crate) fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments(path) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// The single dynamic child of a node plus the parameter name it captures.
struct DynamicChild<H> {
    param_name: Arc<str>,
    node: Box<TreeNode<H>>,
}

struct TreeNode<H> {
    children: HashMap<Box<str>, TreeNode<H>>,
    dynamic: Option<DynamicChild<H>>,
    handlers: HashMap<Method, H>,
}

impl<H> TreeNode<H> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            dynamic: None,
            handlers: HashMap::new(),
        }
    }

    fn static_child(&mut self, segment: &str) -> &mut TreeNode<H> {
        self.children
            .entry(Box::from(segment))
            .or_insert_with(TreeNode::new)
    }

    fn dynamic_child(&mut self, param_name: &str) -> &mut TreeNode<H> {
        let dynamic = self.dynamic.get_or_insert_with(|| DynamicChild {
            param_name: Arc::from(param_name),
            node: Box::new(TreeNode::new()),
        });
        &mut dynamic.node
    }
}

/// Result of a tree lookup.
///
/// `handler` is `None` both when no node matches the path and when the node
/// exists but has nothing registered for the method; callers treat the two
/// the same way. `params` is always empty when `handler` is `None`.
#[derive(Debug)]
pub struct TreeMatch<'a, H> {
    /// The handler registered for the method at the matched node
    pub handler: Option<&'a H>,
    /// Captured dynamic segments in path order
    pub params: ParamVec,
}

impl<H> TreeMatch<'_, H> {
    fn miss() -> Self {
        Self {
            handler: None,
            params: ParamVec::new(),
        }
    }

    /// Get a captured parameter by name (last capture wins).
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Prefix tree mapping `(method, path)` to a handler.
///
/// Built by insertion during setup and read-only afterwards. There is no
/// deletion and no internal locking: mutation needs `&mut self`, so a tree
/// shared behind an `Arc` for serving cannot be changed.
pub struct PathTree<H> {
    root: TreeNode<H>,
    len: usize,
}

impl<H> Default for PathTree<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> PathTree<H> {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: TreeNode::new(),
            len: 0,
        }
    }

    /// Number of distinct `(method, path)` registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `handler` for `method` at `pattern`.
    ///
    /// Segments starting with [`PARAM_MARKER`] descend into the node's
    /// dynamic child. Registering the same method and pattern again silently
    /// replaces the earlier handler, which is returned.
    pub fn insert(&mut self, method: Method, pattern: &str, handler: H) -> Option<H> {
        let mut node = &mut self.root;
        for segment in segments(pattern) {
            node = match segment.strip_prefix(PARAM_MARKER) {
                Some(param_name) => node.dynamic_child(param_name),
                None => node.static_child(segment),
            };
        }
        let previous = node.handlers.insert(method, handler);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Resolve `path` for `method`.
    ///
    /// Walks one segment at a time, preferring a static child and falling back
    /// to the dynamic child. The first segment with neither ends the walk with
    /// no handler and no params.
    #[must_use]
    pub fn find(&self, method: &Method, path: &str) -> TreeMatch<'_, H> {
        let mut node = &self.root;
        let mut params = ParamVec::new();

        for segment in segments(path) {
            if let Some(child) = node.children.get(segment) {
                node = child;
                continue;
            }
            match &node.dynamic {
                Some(dynamic) => {
                    // A bare `:` registers an unnamed dynamic segment: it
                    // matches but captures nothing.
                    if !dynamic.param_name.is_empty() {
                        params.push((Arc::clone(&dynamic.param_name), segment.to_string()));
                    }
                    node = &dynamic.node;
                }
                None => return TreeMatch::miss(),
            }
        }

        match node.handlers.get(method) {
            Some(handler) => TreeMatch {
                handler: Some(handler),
                params,
            },
            None => TreeMatch::miss(),
        }
    }
}
