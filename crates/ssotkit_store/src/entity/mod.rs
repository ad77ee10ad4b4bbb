//! Entity types.

mod id;
mod record;

pub use id::ObjectId;
pub use record::Entity;
