//! Assembles flat, path-keyed items into parent/child trees.
//!
//! Items record their parent as a path rather than holding it, so a child may be added before its
//! parent. Trees are materialized in one pass once every item is known. Items whose recorded
//! parent never becomes reachable from a root are dropped from the trees and reported as
//! [ImportError::Orphaned].
use std::collections::HashMap;

use crate::{error::ImportError, paths::PathKey};

/// A tree node that owns its children.
pub trait Nested: Sized {
    fn children_mut(&mut self) -> &mut Vec<Self>;
}

#[derive(Debug)]
pub struct Assembled<T> {
    pub roots: Vec<T>,
    pub orphans: Vec<ImportError>,
}

/// Builds trees from `items`. `order` fixes the sibling order (and the root order); `parent_of`
/// returns the recorded parent of a path. Paths listed in `order` but missing from `items` are
/// skipped.
pub fn assemble<T, F>(
    order: &[PathKey],
    mut items: HashMap<PathKey, T>,
    parent_of: F,
) -> Assembled<T>
where
    T: Nested,
    F: Fn(&PathKey) -> Option<PathKey>,
{
    let mut children: HashMap<PathKey, Vec<PathKey>> = HashMap::new();
    let mut root_paths = Vec::new();
    for path in order {
        match parent_of(path) {
            Some(parent) => children.entry(parent).or_default().push(path.clone()),
            None => root_paths.push(path.clone()),
        }
    }

    let roots = root_paths
        .iter()
        .filter_map(|path| take(path, &mut items, &children))
        .collect();

    let mut orphans = Vec::new();
    for path in order {
        if items.remove(path).is_some() {
            let parent = parent_of(path).map(|p| p.to_string()).unwrap_or_default();
            tracing::warn!("[hierarchy::assemble] Dropping orphaned item {path} (parent {parent})");
            orphans.push(ImportError::Orphaned {
                path: path.to_string(),
                parent,
            });
        }
    }
    Assembled { roots, orphans }
}

fn take<T: Nested>(
    path: &PathKey,
    items: &mut HashMap<PathKey, T>,
    children: &HashMap<PathKey, Vec<PathKey>>,
) -> Option<T> {
    let mut node = items.remove(path)?;
    if let Some(kids) = children.get(path) {
        for kid in kids {
            if let Some(child) = take(kid, items, children) {
                node.children_mut().push(child);
            }
        }
    }
    Some(node)
}
