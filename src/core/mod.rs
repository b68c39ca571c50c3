pub mod engine;
pub mod fields;
pub mod traits;

pub use engine::{BulkResult, CrudEngine, UpdateInput};
pub use fields::FieldTable;
pub use traits::{CRUDResource, MergeIntoActiveModel};
