//! Record assembly: one `PointRecord` per placed entity.
//!
//! The coordinate map is authoritative: an id gets a record if and only if it
//! has a coordinate. Side data for other ids is ignored, and an id without
//! side data (or a run where that input was not supplied at all) gets empty
//! lists.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::model::{
    root_path, ClusterPath, CoordinateMap, EntityId, MetadataMap, PointMap, PointRecord,
    PropertyMap,
};

/// Root-only cluster paths for `ids`.
pub fn trivial_paths<'a>(ids: impl IntoIterator<Item = &'a EntityId>) -> BTreeMap<EntityId, ClusterPath> {
    ids.into_iter().map(|id| (id.clone(), root_path())).collect()
}

/// Merge coordinates, paths and optional side data into point records.
///
/// `None` for `metadata` or `properties` means the input was not supplied
/// for this run.
pub fn assemble_points(
    coordinates: &CoordinateMap,
    paths: &BTreeMap<EntityId, ClusterPath>,
    metadata: Option<&MetadataMap>,
    properties: Option<&PropertyMap>,
) -> PointMap {
    coordinates
        .iter()
        .map(|(id, coords)| {
            let record = PointRecord {
                path: paths.get(id).cloned().unwrap_or_else(root_path),
                coordinates: *coords,
                categories: lookup(metadata, id),
                properties: lookup(properties, id),
            };
            (id.clone(), record)
        })
        .collect()
}

fn lookup(map: Option<&HashMap<EntityId, Vec<String>>>, id: &EntityId) -> Vec<String> {
    map.and_then(|m| m.get(id)).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn coords() -> CoordinateMap {
        [
            (EntityId::from("0"), [1.0, 0.0, 0.0]),
            (EntityId::from("1"), [0.0, -1.0, 0.5]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_records_follow_coordinates_only() {
        let coords = coords();
        let mut metadata = MetadataMap::new();
        metadata.insert(EntityId::from("0"), vec!["Fungi".into()]);
        metadata.insert(EntityId::from("99"), vec!["orphan".into()]);
        let mut properties = PropertyMap::new();
        properties.insert(EntityId::from("1"), vec!["0.3".into(), "7".into()]);

        let points = assemble_points(
            &coords,
            &trivial_paths(coords.keys()),
            Some(&metadata),
            Some(&properties),
        );

        assert_eq!(points.keys().cloned().collect::<Vec<_>>(), vec![EntityId::from("0"), EntityId::from("1")]);
        let p0 = &points[&EntityId::from("0")];
        assert_eq!(p0.categories, vec!["Fungi".to_string()]);
        assert_eq!(p0.properties, Vec::<String>::new());
        assert_eq!(p0.path.as_slice(), &["0".to_string()]);
        let p1 = &points[&EntityId::from("1")];
        assert_eq!(p1.categories, Vec::<String>::new());
        assert_eq!(p1.properties, vec!["0.3".to_string(), "7".to_string()]);
        assert_eq!(p1.coordinates, [0.0, -1.0, 0.5]);
    }

    #[test]
    fn test_not_provided_inputs_give_empty_lists() {
        let coords = coords();
        let points = assemble_points(&coords, &trivial_paths(coords.keys()), None, None);
        assert_eq!(points.len(), 2);
        assert!(points.values().all(|p| p.categories.is_empty() && p.properties.is_empty()));
    }

    #[test]
    fn test_empty_coordinates_give_no_records() {
        let mut metadata = MetadataMap::new();
        metadata.insert(EntityId::from("0"), vec!["Fungi".into()]);
        let points = assemble_points(&CoordinateMap::new(), &BTreeMap::new(), Some(&metadata), None);
        assert!(points.is_empty());
    }
}
