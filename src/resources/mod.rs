//! Concrete resources served by the API.

pub mod car;

pub use car::{Car, CarCreate, CarUpdate};
