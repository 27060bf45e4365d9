//! Scene data structures.
//!
//! - `transform` holds local position, rotation and scale of a node
//! - `geometry` holds CPU-side vertex and index data
//! - `light` and `material` describe how surfaces are lit and shaded
//! - `texture` holds texture slots and their GPU counterpart
//! - `scene_graph` ties everything together into a node tree

pub mod geometry;
pub mod light;
pub mod material;
pub mod scene_graph;
pub mod texture;
pub mod transform;
