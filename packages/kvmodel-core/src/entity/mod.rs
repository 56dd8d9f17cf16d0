//! Entities: the typed model handle, entity instances, the save engine,
//! batched retrieval and table administration.

mod admin;
mod batch;
#[allow(clippy::module_inception)]
mod entity;
mod model;
mod pending;
mod write;

pub use batch::{fetch_batch, BatchFetch, BatchOptions};
pub use entity::Entity;
pub use model::Model;
pub use pending::PendingOp;
pub use write::{apply_write, Patch, WriteIntent};
