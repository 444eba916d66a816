//! Embedded coordinates.

use std::collections::BTreeMap;
use super::EntityId;

/// A point in the normalized cube [-1, 1]³.
pub type Coordinate = [f64; 3];

/// Entity id → coordinate, ordered by id.
pub type CoordinateMap = BTreeMap<EntityId, Coordinate>;
