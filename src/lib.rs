//! Height field erosion library
//!
//! Re-exports modules for use by binaries and tools.

pub mod convolution;
pub mod erosion;
pub mod error;
pub mod export;
pub mod heightmap;
pub mod tilemap;
