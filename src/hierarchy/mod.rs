// hierarchy/mod.rs - Self-referencing tree assembly and recursive creation
//
// Read path:  flat rows (id, parent_id, sort_order) → ordered forest of MenuNodes
// Write path: nested create requests → depth-first inserts with parent ids propagated
//
// Both halves are storage-agnostic. Repositories feed FlatNodes in and
// implement NodeStore for the inserts.

pub mod build;
pub mod create;
pub mod error;

pub use build::{build_tree, FlatNode, Forest, MenuNode, ParentLinks, MAX_TREE_DEPTH};
pub use create::{create_tree, validate_forest, CreateLimits, CreatedNode, NestedRequest, NodeStore};
pub use error::HierarchyError;
