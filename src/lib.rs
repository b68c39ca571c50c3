//! # crudbase
//!
//! A generic CRUD engine over sea-orm: declarative multi-predicate filters, bulk create and
//! update, and sessions routed to several independently configured backends.
//!
//! - [`session`]: backends, pools and scoped sessions
//! - [`filter`]: filter specifications → `Condition`
//! - [`core`]: the [`CRUDResource`] binding trait and the generic [`CrudEngine`]
//! - [`binding`]: JSON payloads → typed, validated inputs
//! - [`routes`]: the axum HTTP surface

pub mod binding;
pub mod config;
pub mod core;
pub mod errors;
pub mod filter;
pub mod logging;
pub mod migration;
pub mod models;
pub mod outbound;
pub mod pagination;
pub mod resources;
pub mod routes;
pub mod session;
pub mod validation;

pub use binding::{SchemaBinding, Strictness};
pub use config::Settings;
pub use core::{BulkResult, CRUDResource, CrudEngine, UpdateInput};
pub use errors::{ApiError, CrudError};
pub use filter::{FilterSet, FilterSpec, NamedFilter, NamedFilters};
pub use session::{BackendId, Session, SessionProvider};
