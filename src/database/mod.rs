pub mod entity;
pub mod manager;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod schema;

pub use entity::{ParentChange, PatchRequest, TreeEntity};
pub use manager::{DatabaseError, DatabaseManager};
pub use pagination::{ListFilter, PageRequest, PageResponse};
pub use repository::{Repository, TxWriter};
