//! # Point Cloud Model
//!
//! Clean DTOs that flow through the pipeline.
//! These types cross every boundary: matrix ↔ embedding ↔ assembly ↔ output.
//!
//! Design rule: NO file handles, NO engine state here.
//! This module is pure data: no I/O, no logging.

pub mod entity;
pub mod matrix;
pub mod coordinate;
pub mod path;
pub mod record;
pub mod property_map;

pub use entity::EntityId;
pub use matrix::DissimilarityMatrix;
pub use coordinate::{Coordinate, CoordinateMap};
pub use path::{ClusterPath, ROOT_CLUSTER, root_path};
pub use record::{PointRecord, PointMap};
pub use property_map::{MetadataMap, PropertyMap};
