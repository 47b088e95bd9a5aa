//! PDF Shelf Server
//!
//! Per-user PDF library with persistent, zoom-independent highlights.
//!
//! # Modules
//!
//! - `db`: SQLite persistence for documents and highlights
//! - `library`: Ownership-aware document and highlight operations
//! - `geometry`: Pixel to page-fraction coordinate normalization
//! - `storage`: Blob storage for uploaded PDFs (local disk or S3)
//! - `routes`: HTTP API
//! - `session`: Viewer-side annotation state machine

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod geometry;
pub mod library;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
