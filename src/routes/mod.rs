//! Routing: the axum router, the route table, and the dispatcher between them.

pub mod dispatcher;
#[allow(clippy::module_inception)]
pub mod routes;
pub mod table;
