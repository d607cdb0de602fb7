//! State model and persistence for upwatch.
//!
//! Outcomes, the bounded history log and the JSON artifact store.

mod history;
mod models;
mod store;

pub use history::*;
pub use models::*;
pub use store::*;
