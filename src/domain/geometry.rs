// ==========================================
// NEXO work-planning - GeoJSON geometry value type
// ==========================================
// Minimal GeoJSON carrier: the pipeline never interprets coordinates,
// it only validates shape, stores, and unions geometries into a
// project work area.
// ==========================================

use serde::{Deserialize, Serialize};

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// One GeoJSON geometry, coordinates kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub geometry_type: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub coordinates: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geometries: Vec<Geometry>,
}

impl Geometry {
    /// Parses an embedded GeoJSON string, as found in a `Geom` cell.
    pub fn from_json_str(raw: &str) -> Option<Geometry> {
        let geometry: Geometry = serde_json::from_str(raw).ok()?;
        if geometry.is_valid() {
            Some(geometry)
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        if !GEOMETRY_TYPES.contains(&self.geometry_type.as_str()) {
            return false;
        }
        if self.geometry_type == "GeometryCollection" {
            self.geometries.iter().all(Geometry::is_valid)
        } else {
            !self.coordinates.is_null()
        }
    }

    /// Union work area of several geometries: a flattened
    /// GeometryCollection. Single input passes through unchanged.
    pub fn union(geometries: Vec<Geometry>) -> Option<Geometry> {
        let mut flattened: Vec<Geometry> = Vec::new();
        for geometry in geometries {
            if geometry.geometry_type == "GeometryCollection" {
                flattened.extend(geometry.geometries);
            } else {
                flattened.push(geometry);
            }
        }
        match flattened.len() {
            0 => None,
            1 => flattened.into_iter().next(),
            _ => Some(Geometry {
                geometry_type: "GeometryCollection".to_string(),
                coordinates: serde_json::Value::Null,
                geometries: flattened,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_point() {
        let geometry =
            Geometry::from_json_str(r#"{"type":"Point","coordinates":[-73.55,45.51]}"#);
        assert!(geometry.is_some());
        assert_eq!(geometry.unwrap().geometry_type, "Point");
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(Geometry::from_json_str(r#"{"type":"Blob","coordinates":[1,2]}"#).is_none());
    }

    #[test]
    fn test_parse_rejects_missing_coordinates() {
        assert!(Geometry::from_json_str(r#"{"type":"Point"}"#).is_none());
    }

    #[test]
    fn test_union_flattens_collections() {
        let a = Geometry::from_json_str(r#"{"type":"Point","coordinates":[0,0]}"#).unwrap();
        let b = Geometry::from_json_str(
            r#"{"type":"LineString","coordinates":[[0,0],[1,1]]}"#,
        )
        .unwrap();
        let collection = Geometry::union(vec![a.clone(), b]).unwrap();
        assert_eq!(collection.geometry_type, "GeometryCollection");
        assert_eq!(collection.geometries.len(), 2);

        let single = Geometry::union(vec![a.clone()]).unwrap();
        assert_eq!(single, a);

        let merged = Geometry::union(vec![collection, a]).unwrap();
        assert_eq!(merged.geometries.len(), 3);
    }
}
