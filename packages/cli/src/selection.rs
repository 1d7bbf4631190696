//! Choosing the street fragments a query runs against.

use house_locator_models::{FeatureId, LonLat};
use house_locator_spatial::{FeatureIndex, rect_around};

/// Parses `"lon,lat"`.
pub fn parse_lon_lat(s: &str) -> Result<LonLat, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lon,lat\", got {s:?}"))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("invalid longitude {lon:?}: {e}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("invalid latitude {lat:?}: {e}"))?;
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("coordinates out of range: {s:?}"));
    }
    Ok(LonLat::new(lon, lat))
}

/// Street name and/or area restriction. Without either, every line is
/// selected.
pub struct StreetFilter {
    pub name: Option<String>,
    pub near: Option<(LonLat, f64)>,
}

impl StreetFilter {
    /// Matching line ids, ascending.
    pub fn select(&self, index: &FeatureIndex) -> Vec<FeatureId> {
        let by_area = self
            .near
            .map(|(center, radius_m)| index.line_ids_in_rect(&rect_around(center, radius_m)));

        match (&self.name, by_area) {
            (Some(name), Some(area)) => index
                .line_ids_named(name)
                .into_iter()
                .filter(|id| area.binary_search(id).is_ok())
                .collect(),
            (Some(name), None) => index.line_ids_named(name),
            (None, Some(area)) => area,
            (None, None) => index.line_ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature", "id": 1,
                "properties": { "name": "Main St" },
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [0.001, 0.0]] }
            },
            {
                "type": "Feature", "id": 2,
                "properties": { "name": "Main St" },
                "geometry": { "type": "LineString", "coordinates": [[0.05, 0.0], [0.051, 0.0]] }
            },
            {
                "type": "Feature", "id": 3,
                "properties": { "name": "Elm St" },
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.001], [0.001, 0.001]] }
            }
        ]
    }"#;

    #[test]
    fn parses_coordinates() {
        let p = parse_lon_lat("13.4, 52.5").unwrap();
        assert!((p.lon - 13.4).abs() < f64::EPSILON);
        assert!((p.lat - 52.5).abs() < f64::EPSILON);
        assert!(parse_lon_lat("13.4").is_err());
        assert!(parse_lon_lat("x,1").is_err());
        assert!(parse_lon_lat("10,95").is_err());
    }

    #[test]
    fn combines_name_and_area() {
        let index = FeatureIndex::from_geojson_str(LINES).unwrap();
        let near = Some((LonLat::new(0.0005, 0.0), 300.0));

        let filter = |name: Option<&str>, near| StreetFilter {
            name: name.map(str::to_string),
            near,
        };
        assert_eq!(
            filter(None, None).select(&index),
            vec![FeatureId(1), FeatureId(2), FeatureId(3)]
        );
        assert_eq!(
            filter(Some("Main Street"), None).select(&index),
            vec![FeatureId(1), FeatureId(2)]
        );
        assert_eq!(
            filter(None, near).select(&index),
            vec![FeatureId(1), FeatureId(3)]
        );
        assert_eq!(
            filter(Some("Main St"), near).select(&index),
            vec![FeatureId(1)]
        );
    }
}
