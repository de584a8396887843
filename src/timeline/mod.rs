mod model;
mod service;

pub use model::*;
pub use service::{TimelineService, MAX_PAGE_SIZE};
