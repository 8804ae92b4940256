use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::error::HierarchyError;
use crate::database::manager::DatabaseError;

/// A create request that may carry nested children of its own kind
pub trait NestedRequest: Sized + Send + Sync {
    fn children(&self) -> &[Self];

    /// Check this node's own scalar fields (children are visited separately)
    fn validate(&self) -> Result<(), String>;
}

/// Persistence boundary for recursive creation: insert one record, get it back
/// with its assigned id.
#[async_trait]
pub trait NodeStore: Send {
    type Request: NestedRequest;
    type Record: Send;

    async fn insert(
        &mut self,
        request: &Self::Request,
        parent_id: Option<i32>,
    ) -> Result<Self::Record, DatabaseError>;

    fn record_id(record: &Self::Record) -> i32;
}

/// A persisted node plus the children created beneath it, in input order
#[derive(Debug, Clone, Serialize)]
pub struct CreatedNode<R> {
    #[serde(flatten)]
    pub record: R,
    pub children: Vec<CreatedNode<R>>,
}

impl<R> CreatedNode<R> {
    pub fn count(nodes: &[CreatedNode<R>]) -> usize {
        nodes.iter().map(|n| 1 + Self::count(&n.children)).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CreateLimits {
    /// Deepest allowed level, counted from the table's roots
    pub max_depth: usize,
    pub max_nodes: usize,
    /// Level of the row new top-level requests attach under, 0 for new roots
    pub parent_depth: usize,
}

/// Walk the whole input forest before anything is written.
///
/// Returns the total node count. Iterative so adversarially deep input is
/// rejected without recursing into it.
pub fn validate_forest<R: NestedRequest>(
    requests: &[R],
    limits: &CreateLimits,
) -> Result<usize, HierarchyError> {
    let mut stack: Vec<(&R, usize, String)> = requests
        .iter()
        .enumerate()
        .rev()
        .map(|(i, r)| (r, limits.parent_depth + 1, format!("[{}]", i)))
        .collect();
    let mut total = 0;

    while let Some((request, depth, path)) = stack.pop() {
        if depth > limits.max_depth {
            return Err(HierarchyError::DepthExceeded { path, max: limits.max_depth });
        }

        total += 1;
        if total > limits.max_nodes {
            return Err(HierarchyError::TooManyNodes { max: limits.max_nodes });
        }

        request
            .validate()
            .map_err(|message| HierarchyError::InvalidNode { path: path.clone(), message })?;

        for (i, child) in request.children().iter().enumerate().rev() {
            stack.push((child, depth + 1, format!("{}.children[{}]", path, i)));
        }
    }

    Ok(total)
}

/// Create a forest of new records depth-first, pre-order.
///
/// Each node is inserted with `parent_id` set to its parent's freshly
/// assigned id (`parent_id` argument for the top level). A store error stops
/// the traversal and is returned as-is; rollback is the store's business.
pub async fn create_tree<S: NodeStore>(
    store: &mut S,
    requests: &[S::Request],
    parent_id: Option<i32>,
    limits: &CreateLimits,
    cancel: &CancellationToken,
) -> Result<Vec<CreatedNode<S::Record>>, HierarchyError> {
    let total = validate_forest(requests, limits)?;
    tracing::debug!("Creating {} nodes under parent {:?}", total, parent_id);

    create_level(store, requests, parent_id, cancel).await
}

fn create_level<'a, S: NodeStore>(
    store: &'a mut S,
    requests: &'a [S::Request],
    parent_id: Option<i32>,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<Vec<CreatedNode<S::Record>>, HierarchyError>> {
    async move {
        let mut created = Vec::with_capacity(requests.len());

        for request in requests {
            if cancel.is_cancelled() {
                return Err(HierarchyError::Cancelled);
            }

            let record = store.insert(request, parent_id).await?;
            let id = S::record_id(&record);
            let children = create_level(&mut *store, request.children(), Some(id), cancel).await?;

            created.push(CreatedNode { record, children });
        }

        Ok(created)
    }
    .boxed()
}
