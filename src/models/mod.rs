pub mod coerce;
pub mod project;
pub mod request;
pub mod task;

pub use project::*;
pub use request::*;
pub use task::*;
