pub mod model;
pub mod validate;

pub use model::{ContentAggregate, ContentRef, ContentType};
