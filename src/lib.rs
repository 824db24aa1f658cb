//! Semantic matching core for a campus lost-and-found service.
//!
//! Text and image embeddings, cosine ranking of posts against a query, and
//! zero-shot photo tagging. The surrounding web application owns routing,
//! persistence and rendering; it hands this crate plain strings and image
//! bytes.

pub mod analyze;
pub mod config;
pub mod images;
pub mod semantic;
