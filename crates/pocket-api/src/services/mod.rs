//! Service layer for request workflows that span several repositories.

pub mod categorization;
pub mod image_intake;

pub use categorization::PipelineResponse;
pub use image_intake::{ImagePayload, IncomingImage, StoredImage};
