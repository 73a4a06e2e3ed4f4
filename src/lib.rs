//! # pet-tagger
//!
//! HTTP backend for a lost/found/adoption pet listing site.
//!
//! Uploaded photos are sent to an image-labeling service; the labels that
//! relate to animals become the post's `ai_tags`. Posts, their details and
//! their images live in a hosted document database and file store. Searches
//! fetch candidate posts from the store and rank them by how many of the
//! requested tags they carry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────────┐
//! │ HTTP (axum) │──▶│  ingest /    │──▶│ ImageLabeler        │ Rekognition
//! │  or CLI     │   │  search      │   │ FileStore           │ Appwrite Storage
//! └─────────────┘   └──────┬───────┘   │ DocumentStore       │ Appwrite Databases
//!                          │           └─────────────────────┘
//!                          ▼
//!                labels / relevance (pure)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment configuration |
//! | [`models`] | Labels, posts, form submissions |
//! | [`labels`] | Animal label filter |
//! | [`relevance`] | Tag-relevance scoring and ranking |
//! | [`traits`] | Service traits and the [`Services`](traits::Services) bundle |
//! | [`ingest`] | Image analysis and post creation |
//! | [`search`] | Tag search |
//! | [`server`] | HTTP API |
//! | [`rekognition`] | Rekognition client |
//! | [`appwrite`] | Appwrite client |
//! | [`sigv4`] | AWS request signing |
//! | [`memory`] | In-memory services for tests |
//! | [`error`] | Orchestrator error type |

pub mod appwrite;
pub mod config;
pub mod error;
pub mod ingest;
pub mod labels;
pub mod memory;
pub mod models;
pub mod rekognition;
pub mod relevance;
pub mod search;
pub mod server;
pub mod sigv4;
pub mod traits;

#[cfg(test)]
mod test_support;
