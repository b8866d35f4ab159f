/// Request handling for the migration wizard's history controls.
pub mod endpoint;
pub mod history;

pub use endpoint::{Endpoint, Operation, Request, Response};
