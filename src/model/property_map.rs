//! Side-data maps: per-entity labels and property intensities.

use hashbrown::HashMap;
use super::EntityId;

/// Entity id → category labels, in file column order.
pub type MetadataMap = HashMap<EntityId, Vec<String>>;

/// Entity id → property intensities, kept as the strings found in the file.
/// Order matches the external property-name list.
pub type PropertyMap = HashMap<EntityId, Vec<String>>;
