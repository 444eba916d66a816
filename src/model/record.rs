//! Point record: the unit written to `smalldata.json`.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use super::{ClusterPath, Coordinate, EntityId};

/// Everything the viewer knows about one entity.
///
/// Field names are the viewer's JSON keys. All four are always present;
/// missing side data is an empty array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PointRecord {
    pub path: ClusterPath,
    pub coordinates: Coordinate,
    pub categories: Vec<String>,
    pub properties: Vec<String>,
}

/// Entity id → point record. Serializes as one JSON object keyed by id.
pub type PointMap = BTreeMap<EntityId, PointRecord>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::root_path;

    #[test]
    fn test_json_field_names() {
        let record = PointRecord {
            path: root_path(),
            coordinates: [1.0, -0.5, 0.0],
            categories: vec!["Ascomycota".into()],
            properties: Vec::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Path"], serde_json::json!(["0"]));
        assert_eq!(json["Coordinates"], serde_json::json!([1.0, -0.5, 0.0]));
        assert_eq!(json["Categories"], serde_json::json!(["Ascomycota"]));
        assert_eq!(json["Properties"], serde_json::json!([]));
    }
}
