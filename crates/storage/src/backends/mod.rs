//! Storage backend implementations.

pub mod cloudinary;
