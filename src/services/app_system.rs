use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::tree_service::{TreeService, TreeServiceError};
use crate::database::models::{AppSystem, NewAppSystem};
use crate::hierarchy::HierarchyError;

/// One entry of a bulk import: systems sharing a category
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryGroup {
    pub category: String,
    #[serde(default)]
    pub systems: Vec<NewAppSystem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub success_count: usize,
    pub failed_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Flatten the groups into systems carrying their group's category
pub fn expand_groups(groups: Vec<CategoryGroup>) -> Vec<NewAppSystem> {
    groups
        .into_iter()
        .flat_map(|group| {
            let category = group.category;
            group.systems.into_iter().map(move |mut system| {
                system.category = category.clone();
                system
            })
        })
        .collect()
}

/// Create each system on its own; one failure does not stop the rest.
/// Only shutdown aborts the batch.
pub async fn create_multiple(
    service: &TreeService<AppSystem>,
    groups: Vec<CategoryGroup>,
    cancel: &CancellationToken,
) -> Result<BatchReport, TreeServiceError> {
    let mut report = BatchReport::default();

    for system in expand_groups(groups) {
        match service.create(std::slice::from_ref(&system), None, cancel).await {
            Ok(_) => report.success_count += 1,
            Err(TreeServiceError::Hierarchy(HierarchyError::Cancelled)) => {
                return Err(HierarchyError::Cancelled.into());
            }
            Err(e) => {
                report.failed_count += 1;
                report.errors.push(format!("{}: {}", system.name.trim(), e));
            }
        }
    }

    tracing::info!(
        "Bulk app system import: {} created, {} failed",
        report.success_count,
        report.failed_count
    );
    Ok(report)
}
