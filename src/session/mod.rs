//! Client-side annotation session
//!
//! Drives the highlight workflow of a document viewer: loading, text
//! selection, saving and reprojection across pages and zoom levels. The
//! session talks to highlight storage through [`HighlightApi`], either over
//! HTTP or in-process.

mod annotation;
mod api;

pub use annotation::{
    AnnotationSession, Notice, PendingSelection, ProjectedHighlight, SessionState, MAX_SCALE,
    MIN_SCALE, SCALE_STEP,
};
pub use api::{HighlightApi, HttpHighlightClient, LocalHighlightApi};
