//! Binder, catalog, permissions gate, temporal resolver and session entry
//! point (§4.1, §4.2, §6): the layer that turns a SQL string plus a set of
//! registered connectors into a bound, permission-checked `LogicalPlan`, and
//! the `Session`/`Cursor` pair that drives one through optimization,
//! physical planning and execution.

pub mod binder;
pub mod catalog;
pub mod config;
pub mod permissions;
pub mod session;
pub mod temporal;

pub use binder::Binder;
pub use catalog::{Catalog, Resolved};
pub use config::SessionConfig;
pub use permissions::Permissions;
pub use session::{Cursor, QueryStats, Session};
