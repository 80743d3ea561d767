pub mod catalog;
pub mod identity;

pub use catalog::{
    EntityType, Module, ModulePermission, Page, PagePermission, ViewMatrix, ViewMatrixEntry,
};
pub use identity::{Identity, SuperAdmins};
