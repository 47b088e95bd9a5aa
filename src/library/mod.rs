//! Library services
//!
//! Ownership-aware operations over documents and their highlights.

mod highlights;
mod registry;

pub use highlights::HighlightStore;
pub use registry::{DocumentRegistry, MAX_FILE_NAME_LEN};
