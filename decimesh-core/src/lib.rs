//! Core data structures for decimesh
//!
//! This crate provides the exchange-level types shared by the decimesh
//! workspace: point and vector aliases, the plain indexed triangle mesh,
//! and the common error type.

pub mod error;
pub mod mesh;
pub mod point;

pub use error::*;
pub use mesh::*;
pub use point::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix4, Point3, Vector3, Vector4};
