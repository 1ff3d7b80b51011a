use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarvestError;

pub type Position = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Polygon,
}

// Written as GeoJSON (`coordinates`), the same shape run contexts and AOI
// hits carry in `location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPolygon {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: Vec<Vec<Position>>,
}

impl NormalizedPolygon {
    pub fn from_raw_ring(raw: &str) -> Result<Self, HarvestError> {
        Ok(Self {
            kind: GeometryKind::Polygon,
            coordinates: vec![parse_ring(raw)?],
        })
    }

    pub fn from_record_polygons(polygons: &[Vec<String>]) -> Result<Self, HarvestError> {
        let raw = polygons
            .first()
            .and_then(|rings| rings.first())
            .ok_or_else(|| HarvestError::GeometryParse("record has no polygon rings".to_string()))?;
        Self::from_raw_ring(raw)
    }
}

pub fn parse_ring(raw: &str) -> Result<Vec<Position>, HarvestError> {
    let tokens = raw.split_whitespace().collect::<Vec<_>>();
    if tokens.is_empty() {
        return Err(HarvestError::GeometryParse("empty ring".to_string()));
    }
    if tokens.len() % 2 != 0 {
        return Err(HarvestError::GeometryParse(format!(
            "odd token count {} in ring",
            tokens.len()
        )));
    }
    tokens
        .chunks(2)
        .map(|pair| {
            let lat = parse_coordinate(pair[0])?;
            let lon = parse_coordinate(pair[1])?;
            Ok([lon, lat])
        })
        .collect()
}

fn parse_coordinate(token: &str) -> Result<f64, HarvestError> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(HarvestError::GeometryParse(format!(
            "non-numeric coordinate {token:?}"
        ))),
    }
}

/// Shoelace signed area. Positive means counter-clockwise.
pub fn signed_area(ring: &[Position]) -> f64 {
    let n = ring.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i][0] * ring[j][1] - ring[j][0] * ring[i][1];
    }
    area / 2.0
}

pub fn is_clockwise(ring: &[Position]) -> bool {
    signed_area(ring) <= 0.0
}

pub fn clockwise(ring: &[Position]) -> Vec<Position> {
    let mut ring = ring.to_vec();
    if !is_clockwise(&ring) {
        ring.reverse();
    }
    ring
}

pub fn format_ring(ring: &[Position]) -> String {
    ring.iter()
        .map(|[lon, lat]| {
            format!(
                "{},{}",
                format_significant(*lon, 8),
                format_significant(*lat, 8)
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// printf-style `%.{digits}g` formatting.
pub fn format_significant(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let precision = digits.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent = exponent.parse::<i32>().unwrap_or(0);
    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaOfInterest {
    ring: Vec<Position>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonPolygon {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    coordinates: Vec<Vec<Position>>,
}

impl AreaOfInterest {
    pub fn new(ring: Vec<Position>) -> Result<Self, HarvestError> {
        if ring.len() < 3 {
            return Err(HarvestError::InvalidLocation(format!(
                "ring needs at least 3 vertices, got {}",
                ring.len()
            )));
        }
        if ring.iter().flatten().any(|component| !component.is_finite()) {
            return Err(HarvestError::InvalidLocation(
                "ring has non-finite coordinates".to_string(),
            ));
        }
        Ok(Self { ring })
    }

    pub fn from_geojson(value: &Value) -> Result<Self, HarvestError> {
        let polygon: GeoJsonPolygon = serde_json::from_value(value.clone())
            .map_err(|err| HarvestError::InvalidLocation(err.to_string()))?;
        if let Some(kind) = polygon.kind.as_deref() {
            if !kind.eq_ignore_ascii_case("polygon") {
                return Err(HarvestError::InvalidLocation(format!(
                    "unsupported geometry type {kind}"
                )));
            }
        }
        let ring = polygon
            .coordinates
            .into_iter()
            .next()
            .ok_or_else(|| HarvestError::InvalidLocation("polygon has no rings".to_string()))?;
        Self::new(ring)
    }

    pub fn ring(&self) -> &[Position] {
        &self.ring
    }

    pub fn clockwise_ring(&self) -> Vec<Position> {
        clockwise(&self.ring)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_swaps_lat_lon_pairs() {
        let ring = parse_ring("10.5 -120.25 11 -121 12.75 -119").unwrap();
        assert_eq!(ring, vec![[-120.25, 10.5], [-121.0, 11.0], [-119.0, 12.75]]);
    }

    #[test]
    fn parse_keeps_ingest_orientation() {
        let ccw = "0 0 0 1 1 1 1 0 0 0";
        let polygon = NormalizedPolygon::from_raw_ring(ccw).unwrap();
        assert_eq!(polygon.coordinates, vec![parse_ring(ccw).unwrap()]);
        assert!(signed_area(&polygon.coordinates[0]) > 0.0);
    }

    #[test]
    fn parse_rejects_odd_tokens() {
        let err = parse_ring("1 2 3").unwrap_err();
        assert_matches!(err, HarvestError::GeometryParse(_));
    }

    #[test]
    fn parse_rejects_non_numeric() {
        let err = parse_ring("1 2 north 4").unwrap_err();
        assert_matches!(err, HarvestError::GeometryParse(_));
        let err = parse_ring("1 2 NaN 4").unwrap_err();
        assert_matches!(err, HarvestError::GeometryParse(_));
    }

    #[test]
    fn record_without_rings_is_a_parse_error() {
        let err = NormalizedPolygon::from_record_polygons(&[]).unwrap_err();
        assert_matches!(err, HarvestError::GeometryParse(_));
    }

    #[test]
    fn polygon_serializes_as_geojson() {
        let polygon = NormalizedPolygon::from_raw_ring("1 2 3 4 5 6").unwrap();
        let value = serde_json::to_value(&polygon).unwrap();
        assert_eq!(
            value,
            json!({"type": "Polygon", "coordinates": [[[2.0, 1.0], [4.0, 3.0], [6.0, 5.0]]]})
        );
    }

    #[test]
    fn reversed_ring_negates_area() {
        let ring = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 3.0], [0.0, 3.0]];
        let mut reversed = ring.clone();
        reversed.reverse();
        assert_eq!(signed_area(&ring), 12.0);
        assert_eq!(signed_area(&reversed), -signed_area(&ring));
    }

    #[test]
    fn clockwise_only_reverses_counter_clockwise_rings() {
        let ccw = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let cw = clockwise(&ccw);
        assert!(is_clockwise(&cw));
        assert_eq!(cw.first(), ccw.last());
        assert_eq!(clockwise(&cw), cw);
    }

    #[test]
    fn significant_digit_formatting() {
        assert_eq!(format_significant(-118.123456789, 8), "-118.12346");
        assert_eq!(format_significant(34.5, 8), "34.5");
        assert_eq!(format_significant(10.0, 8), "10");
        assert_eq!(format_significant(0.0, 8), "0");
        assert_eq!(format_significant(0.000012345, 8), "1.2345e-05");
        assert_eq!(format_significant(123456789.0, 8), "1.2345679e+08");
        assert_eq!(format_significant(0.0001, 8), "0.0001");
    }

    #[test]
    fn area_of_interest_from_geojson() {
        let value = json!({
            "type": "Polygon",
            "coordinates": [[[-155.3, 19.4], [-155.2, 19.4], [-155.2, 19.5], [-155.3, 19.4]]]
        });
        let aoi = AreaOfInterest::from_geojson(&value).unwrap();
        assert_eq!(aoi.ring().len(), 4);
    }

    #[test]
    fn area_of_interest_rejects_other_geometries() {
        let value = json!({"type": "Point", "coordinates": [[[1.0, 2.0]]]});
        let err = AreaOfInterest::from_geojson(&value).unwrap_err();
        assert_matches!(err, HarvestError::InvalidLocation(_));

        let value = json!({"type": "Polygon", "coordinates": [[[1.0, 2.0], [3.0, 4.0]]]});
        let err = AreaOfInterest::from_geojson(&value).unwrap_err();
        assert_matches!(err, HarvestError::InvalidLocation(_));
    }

    #[test]
    fn footprint_reads_back_as_area_of_interest() {
        let footprint =
            NormalizedPolygon::from_raw_ring("19.2 -155.6 19.2 -155.0 19.7 -155.0 19.2 -155.6")
                .unwrap();
        let value = serde_json::to_value(&footprint).unwrap();
        assert_eq!(value["type"], json!("Polygon"));
        assert!(value.get("location").is_none());

        let aoi = AreaOfInterest::from_geojson(&value).unwrap();
        assert_eq!(aoi.ring(), footprint.coordinates[0].as_slice());
    }
}
