pub mod app_system;
pub mod tree_service;

pub use app_system::{create_multiple, BatchReport, CategoryGroup};
pub use tree_service::{TreeService, TreeServiceError};
