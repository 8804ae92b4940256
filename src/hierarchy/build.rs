use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// A row as stored: optional parent reference plus a sibling ordering key.
/// `payload` carries the entity-specific columns through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode<P> {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub sort_order: i32,
    pub name: String,
    pub payload: P,
}

/// Client-facing projection of a FlatNode with its resolved children.
/// Leaves serialize `children` as an empty array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuNode<P> {
    pub id: i32,
    pub name: String,
    #[serde(flatten)]
    pub payload: P,
    pub sort_order: i32,
    pub children: Vec<MenuNode<P>>,
}

/// Deepest level `build_tree` assembles. Rows below it are returned with
/// the orphans.
pub const MAX_TREE_DEPTH: usize = 128;

/// Result of assembling a flat collection.
///
/// `orphans` holds every input node that was not placed in the tree: nodes
/// whose parent is missing from the input, members of parent cycles, rows
/// below `MAX_TREE_DEPTH`, and the descendants of all of these.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest<P> {
    pub roots: Vec<MenuNode<P>>,
    pub orphans: Vec<FlatNode<P>>,
}

impl<P> Forest<P> {
    /// Total number of nodes placed in the tree (orphans excluded)
    pub fn node_count(&self) -> usize {
        let mut stack: Vec<&MenuNode<P>> = self.roots.iter().collect();
        let mut count = 0;
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Surface orphans as extra roots appended after the real ones.
    ///
    /// Orphans whose parent is not itself an orphan become roots of their
    /// own subtrees, repeatedly, until none are left. When only cycles
    /// remain, each cycle is broken at its smallest id and rebuilt from
    /// there, so descendants keep their structure.
    pub fn into_roots_with_orphans(self) -> Vec<MenuNode<P>> {
        let Forest { mut roots, orphans } = self;
        let mut pending = orphans;

        while !pending.is_empty() {
            let pending_ids: HashSet<i32> = pending.iter().map(|n| n.id).collect();
            let mut detached = 0;
            for node in pending.iter_mut() {
                if matches!(node.parent_id, Some(parent) if !pending_ids.contains(&parent)) {
                    node.parent_id = None;
                    detached += 1;
                }
            }

            if detached == 0 {
                let heads = cycle_heads(&pending);
                for node in pending.iter_mut().filter(|n| heads.contains(&n.id)) {
                    node.parent_id = None;
                }
            }

            let rest = build_tree(pending);
            roots.extend(rest.roots);
            pending = rest.orphans;
        }

        roots
    }
}

/// Smallest id of every parent cycle in `nodes`
fn cycle_heads<P>(nodes: &[FlatNode<P>]) -> HashSet<i32> {
    let parents: HashMap<i32, i32> = nodes
        .iter()
        .filter_map(|n| n.parent_id.map(|parent| (n.id, parent)))
        .collect();
    let mut heads = HashSet::new();
    let mut visited: HashSet<i32> = HashSet::new();

    for node in nodes {
        let mut path: Vec<i32> = Vec::new();
        let mut on_path: HashMap<i32, usize> = HashMap::new();
        let mut current = Some(node.id);

        while let Some(id) = current {
            if visited.contains(&id) {
                break;
            }
            if let Some(&start) = on_path.get(&id) {
                if let Some(&head) = path[start..].iter().min() {
                    heads.insert(head);
                }
                break;
            }
            on_path.insert(id, path.len());
            path.push(id);
            current = parents.get(&id).copied();
        }

        visited.extend(path);
    }

    heads
}

/// Reassemble flat parent-referencing rows into an ordered forest.
///
/// Siblings are ordered by `sort_order` ascending; equal keys keep their
/// relative input order. Never fails: rows that cannot be placed end up in
/// `Forest::orphans` instead of the tree.
pub fn build_tree<P>(nodes: Vec<FlatNode<P>>) -> Forest<P> {
    let mut roots = Vec::new();
    let mut groups: HashMap<i32, Vec<FlatNode<P>>> = HashMap::new();

    for node in nodes {
        match node.parent_id {
            None => roots.push(node),
            Some(parent_id) => groups.entry(parent_id).or_default().push(node),
        }
    }

    roots.sort_by_key(|n| n.sort_order);
    let roots = assemble(roots, &mut groups);

    // Anything still grouped was never claimed by a visited parent
    let mut orphans: Vec<FlatNode<P>> = groups.into_values().flatten().collect();
    orphans.sort_by_key(|n| n.id);

    Forest { roots, orphans }
}

/// A node whose children are still being assembled
struct Frame<P> {
    node: FlatNode<P>,
    pending: std::vec::IntoIter<FlatNode<P>>,
    children: Vec<MenuNode<P>>,
}

impl<P> Frame<P> {
    fn open(node: FlatNode<P>, depth: usize, groups: &mut HashMap<i32, Vec<FlatNode<P>>>) -> Self {
        let mut pending = if depth < MAX_TREE_DEPTH {
            groups.remove(&node.id).unwrap_or_default()
        } else {
            Vec::new()
        };
        pending.sort_by_key(|n| n.sort_order);

        Self {
            node,
            children: Vec::with_capacity(pending.len()),
            pending: pending.into_iter(),
        }
    }

    fn close(self) -> MenuNode<P> {
        MenuNode {
            id: self.node.id,
            name: self.node.name,
            payload: self.node.payload,
            sort_order: self.node.sort_order,
            children: self.children,
        }
    }
}

/// Depth-first assembly over an explicit stack of frames
fn assemble<P>(roots: Vec<FlatNode<P>>, groups: &mut HashMap<i32, Vec<FlatNode<P>>>) -> Vec<MenuNode<P>> {
    let mut built = Vec::with_capacity(roots.len());

    for root in roots {
        let mut stack = vec![Frame::open(root, 1, groups)];

        while let Some(top) = stack.last_mut() {
            if let Some(child) = top.pending.next() {
                let depth = stack.len() + 1;
                stack.push(Frame::open(child, depth, groups));
            } else if let Some(frame) = stack.pop() {
                let node = frame.close();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => built.push(node),
                }
            }
        }
    }

    built
}

/// Snapshot of id → parent_id for every live row of a table, used to check
/// a write against the stored shape.
#[derive(Debug, Clone, Default)]
pub struct ParentLinks {
    parents: HashMap<i32, Option<i32>>,
}

impl FromIterator<(i32, Option<i32>)> for ParentLinks {
    fn from_iter<I: IntoIterator<Item = (i32, Option<i32>)>>(links: I) -> Self {
        Self {
            parents: links.into_iter().collect(),
        }
    }
}

impl ParentLinks {
    /// Would making `new_parent` the parent of `id` close a loop?
    ///
    /// Walks up from `new_parent`. A walk that revisits a node without
    /// meeting `id` hits a pre-existing cycle elsewhere and is not reported.
    pub fn creates_cycle(&self, id: i32, new_parent: i32) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(new_parent);

        while let Some(node) = current {
            if node == id {
                return true;
            }
            if !seen.insert(node) {
                return false;
            }
            current = self.parents.get(&node).copied().flatten();
        }
        false
    }

    /// Level of `id`, 1 for a root. The walk stops at a missing parent or a
    /// repeated node; an unknown id has depth 0.
    pub fn depth(&self, id: i32) -> usize {
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(node) = current {
            if !self.parents.contains_key(&node) || !seen.insert(node) {
                break;
            }
            current = self.parents.get(&node).copied().flatten();
        }
        seen.len()
    }

    /// Number of levels in the subtree rooted at `id`, 1 for a leaf
    pub fn height(&self, id: i32) -> usize {
        let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
        for (&child, parent) in &self.parents {
            if let Some(parent) = parent {
                children.entry(*parent).or_default().push(child);
            }
        }

        let mut seen = HashSet::from([id]);
        let mut level = vec![id];
        let mut height = 0;
        while !level.is_empty() {
            height += 1;
            level = level
                .iter()
                .filter_map(|node| children.get(node))
                .flatten()
                .copied()
                .filter(|child| seen.insert(*child))
                .collect();
        }
        height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: i32, parent_id: Option<i32>, sort_order: i32) -> FlatNode<()> {
        FlatNode {
            id,
            parent_id,
            sort_order,
            name: format!("node-{}", id),
            payload: (),
        }
    }

    fn ids<P>(nodes: &[MenuNode<P>]) -> Vec<i32> {
        nodes.iter().map(|n| n.id).collect()
    }

    fn flatten_ids<P>(nodes: &[MenuNode<P>], out: &mut Vec<i32>) {
        for n in nodes {
            out.push(n.id);
            flatten_ids(&n.children, out);
        }
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        let forest = build_tree::<()>(vec![]);
        assert!(forest.roots.is_empty());
        assert!(forest.orphans.is_empty());
    }

    #[test]
    fn flat_list_becomes_sorted_roots() {
        let forest = build_tree(vec![node(1, None, 2), node(2, None, 1)]);
        assert_eq!(ids(&forest.roots), vec![2, 1]);
        assert!(forest.roots.iter().all(|n| n.children.is_empty()));
    }

    #[test]
    fn siblings_ascend_by_sort_order_at_every_level() {
        let forest = build_tree(vec![
            node(1, None, 3),
            node(2, None, 1),
            node(3, Some(1), 9),
            node(4, Some(1), 2),
            node(5, Some(1), 5),
            node(6, Some(4), 7),
            node(7, Some(4), 0),
        ]);

        assert_eq!(ids(&forest.roots), vec![2, 1]);
        let one = &forest.roots[1];
        assert_eq!(ids(&one.children), vec![4, 5, 3]);
        assert_eq!(ids(&one.children[0].children), vec![7, 6]);
    }

    #[test]
    fn equal_sort_orders_keep_input_order() {
        let forest = build_tree(vec![
            node(9, None, 0),
            node(3, None, 0),
            node(5, None, 0),
            node(4, Some(3), 1),
            node(2, Some(3), 1),
        ]);
        assert_eq!(ids(&forest.roots), vec![9, 3, 5]);
        assert_eq!(ids(&forest.roots[1].children), vec![4, 2]);
    }

    #[test]
    fn every_reachable_node_appears_exactly_once() {
        let input = vec![
            node(1, None, 0),
            node(2, Some(1), 0),
            node(3, Some(2), 0),
            node(4, Some(3), 0),
            node(5, Some(1), 1),
            node(6, None, 1),
        ];
        let forest = build_tree(input.clone());

        let mut seen = Vec::new();
        flatten_ids(&forest.roots, &mut seen);
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(forest.node_count(), input.len());
    }

    #[test]
    fn dangling_parent_drops_node_from_tree() {
        let forest = build_tree(vec![node(1, None, 0), node(5, Some(999), 0)]);

        let mut seen = Vec::new();
        flatten_ids(&forest.roots, &mut seen);
        assert_eq!(seen, vec![1]);
        assert_eq!(forest.orphans.len(), 1);
        assert_eq!(forest.orphans[0].id, 5);
    }

    #[test]
    fn orphan_subtree_is_reported_whole() {
        let forest = build_tree(vec![
            node(1, None, 0),
            node(5, Some(999), 0),
            node(6, Some(5), 0),
            node(7, Some(6), 0),
        ]);
        assert_eq!(forest.node_count(), 1);
        let orphan_ids: Vec<i32> = forest.orphans.iter().map(|n| n.id).collect();
        assert_eq!(orphan_ids, vec![5, 6, 7]);
    }

    #[test]
    fn cycles_terminate_and_surface_as_orphans() {
        let forest = build_tree(vec![
            node(1, None, 0),
            node(2, Some(3), 0),
            node(3, Some(2), 0),
            node(4, Some(4), 0),
        ]);
        assert_eq!(ids(&forest.roots), vec![1]);
        let orphan_ids: Vec<i32> = forest.orphans.iter().map(|n| n.id).collect();
        assert_eq!(orphan_ids, vec![2, 3, 4]);
    }

    #[test]
    fn building_twice_gives_identical_output() {
        let input = vec![
            node(1, None, 1),
            node(2, Some(1), 0),
            node(3, Some(1), 0),
            node(4, None, 0),
            node(8, Some(77), 0),
        ];
        assert_eq!(build_tree(input.clone()), build_tree(input));
    }

    #[test]
    fn orphans_attach_as_trailing_roots() {
        let forest = build_tree(vec![
            node(1, None, 0),
            node(5, Some(999), 2),
            node(6, Some(5), 0),
            node(8, Some(998), 1),
            node(2, Some(3), 0),
            node(3, Some(2), 0),
        ]);
        let roots = forest.into_roots_with_orphans();

        assert_eq!(ids(&roots), vec![1, 8, 5, 2]);
        assert_eq!(ids(&roots[2].children), vec![6]);
        assert_eq!(ids(&roots[3].children), vec![3]);
        assert!(roots[3].children[0].children.is_empty());
    }

    #[test]
    fn cycle_descendants_keep_their_structure() {
        let forest = build_tree(vec![
            node(1, None, 0),
            node(2, Some(3), 0),
            node(3, Some(2), 0),
            node(4, Some(3), 1),
            node(5, Some(4), 0),
            node(7, Some(7), 0),
        ]);
        let roots = forest.into_roots_with_orphans();

        assert_eq!(ids(&roots), vec![1, 2, 7]);
        let two = &roots[1];
        assert_eq!(ids(&two.children), vec![3]);
        assert_eq!(ids(&two.children[0].children), vec![4]);
        assert_eq!(ids(&two.children[0].children[0].children), vec![5]);
        assert!(roots[2].children.is_empty());
    }

    fn chain(len: i32) -> Vec<FlatNode<()>> {
        (1..=len)
            .map(|id| node(id, if id == 1 { None } else { Some(id - 1) }, 0))
            .collect()
    }

    fn max_depth<P>(nodes: &[MenuNode<P>]) -> usize {
        let mut stack: Vec<(&MenuNode<P>, usize)> = nodes.iter().map(|n| (n, 1)).collect();
        let mut deepest = 0;
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|c| (c, depth + 1)));
        }
        deepest
    }

    #[test]
    fn long_chain_is_cut_at_max_depth() {
        let len = 50_000;
        let forest = build_tree(chain(len));

        assert_eq!(forest.node_count(), MAX_TREE_DEPTH);
        assert_eq!(max_depth(&forest.roots), MAX_TREE_DEPTH);
        assert_eq!(forest.orphans.len(), len as usize - MAX_TREE_DEPTH);
        assert_eq!(forest.orphans[0].id, MAX_TREE_DEPTH as i32 + 1);

        let value = serde_json::to_value(&forest.roots).unwrap();
        assert_eq!(value[0]["id"], 1);
    }

    #[test]
    fn long_chain_with_orphans_keeps_every_node_bounded() {
        let len = 50_000;
        let roots = build_tree(chain(len)).into_roots_with_orphans();

        let placed = Forest { roots, orphans: Vec::new() };
        assert_eq!(placed.node_count(), len as usize);
        assert!(max_depth(&placed.roots) <= MAX_TREE_DEPTH);
        assert_eq!(placed.roots[1].id, MAX_TREE_DEPTH as i32 + 1);
    }

    #[test]
    fn leaf_children_serialize_as_empty_array() {
        #[derive(Debug, Clone, PartialEq, Serialize)]
        struct Fields {
            href: String,
        }

        let forest = build_tree(vec![FlatNode {
            id: 1,
            parent_id: None,
            sort_order: 0,
            name: "Home".to_string(),
            payload: Fields { href: "/home".to_string() },
        }]);

        let value = serde_json::to_value(&forest.roots).unwrap();
        assert_eq!(
            value,
            json!([{ "id": 1, "name": "Home", "href": "/home", "sort_order": 0, "children": [] }])
        );
    }

    fn links(pairs: &[(i32, Option<i32>)]) -> ParentLinks {
        pairs.iter().copied().collect()
    }

    #[test]
    fn detects_reparenting_under_own_descendant() {
        let links = links(&[(1, None), (2, Some(1)), (3, Some(2)), (4, None)]);
        assert!(links.creates_cycle(1, 3));
        assert!(links.creates_cycle(2, 2));
        assert!(!links.creates_cycle(3, 4));
        assert!(!links.creates_cycle(4, 1));
    }

    #[test]
    fn existing_cycle_elsewhere_does_not_hang() {
        let links = links(&[(1, None), (2, Some(3)), (3, Some(2))]);
        assert!(!links.creates_cycle(1, 2));
        assert_eq!(links.depth(2), 2);
        assert_eq!(links.height(2), 2);
    }

    #[test]
    fn depth_and_height_follow_stored_links() {
        let links = links(&[(1, None), (2, Some(1)), (3, Some(2)), (4, Some(1)), (5, Some(99))]);

        assert_eq!(links.depth(1), 1);
        assert_eq!(links.depth(3), 3);
        assert_eq!(links.depth(5), 1);
        assert_eq!(links.depth(42), 0);

        assert_eq!(links.height(1), 3);
        assert_eq!(links.height(2), 2);
        assert_eq!(links.height(4), 1);
    }
}
