use agriboundary_core::models::Crs;
use geo::{Coord, LineString, MultiPolygon, Polygon};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    fn absorb(&mut self, prefix: &str, other: ValidationResult) {
        for error in other.errors {
            self.add_error(format!("{}.{}", prefix, error.location), error.reason);
        }
    }

    /// All error messages joined for reporting
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.location, e.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn validate_ring(name: &str, ring: &LineString<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if ring.0.len() < 4 {
        result.add_error(
            name.to_string(),
            format!("Ring must have at least 4 points, found {}", ring.0.len()),
        );
    }

    if let (Some(first), Some(last)) = (ring.0.first(), ring.0.last()) {
        if first != last {
            result.add_error(
                name.to_string(),
                "Ring must be closed (first point == last point)".to_string(),
            );
        }
    }

    for (i, coord) in ring.0.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            result.add_error(format!("{}[{}]", name, i), "Coordinates must be finite".to_string());
        }
    }

    result
}

/// Validate ring structure of a polygon
pub fn validate_polygon(polygon: &Polygon<f64>) -> ValidationResult {
    let mut result = validate_ring("exterior", polygon.exterior());

    for (i, interior) in polygon.interiors().iter().enumerate() {
        let ring = validate_ring(&format!("interior[{}]", i), interior);
        result.errors.extend(ring.errors);
    }
    result.is_valid = result.errors.is_empty();

    result
}

/// Validate every part of a multipolygon
pub fn validate_multi_polygon(mp: &MultiPolygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    for (i, polygon) in mp.0.iter().enumerate() {
        result.absorb(&format!("Polygon[{}]", i), validate_polygon(polygon));
    }
    result
}

fn in_geographic_range(c: &Coord<f64>) -> bool {
    (-180.0..=180.0).contains(&c.x) && (-90.0..=90.0).contains(&c.y)
}

/// Check that every vertex is a plausible longitude/latitude pair
pub fn validate_geographic(mp: &MultiPolygon<f64>, crs: &Crs) -> ValidationResult {
    let mut result = ValidationResult::valid();
    if !crs.is_geographic() {
        result.add_error("crs".to_string(), format!("Expected EPSG:4326, found {}", crs.authority()));
        return result;
    }

    for (i, polygon) in mp.0.iter().enumerate() {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors().iter());
        for coord in rings.flat_map(|r| r.0.iter()) {
            if !in_geographic_range(coord) {
                result.add_error(
                    format!("Polygon[{}]", i),
                    format!("Coordinate ({}, {}) is outside longitude/latitude range", coord.x, coord.y),
                );
                break;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_valid_polygon() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        assert!(validate_polygon(&poly).is_valid);
    }

    #[test]
    fn test_degenerate_ring() {
        let ring = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        let poly = Polygon::new(ring, vec![]);
        let result = validate_polygon(&poly);
        assert!(!result.is_valid);
        assert!(result.summary().contains("at least 4 points"));
    }

    #[test]
    fn test_non_finite_coordinate() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        assert!(!validate_polygon(&poly).is_valid);
    }

    #[test]
    fn test_geographic_range() {
        let ok = MultiPolygon::new(vec![
            polygon![(x: 5.0, y: 52.0), (x: 5.1, y: 52.0), (x: 5.1, y: 52.1), (x: 5.0, y: 52.0)],
        ]);
        assert!(validate_geographic(&ok, &Crs::wgs84()).is_valid);

        let projected = MultiPolygon::new(vec![
            polygon![(x: 500000.0, y: 5760000.0), (x: 501000.0, y: 5760000.0), (x: 501000.0, y: 5761000.0), (x: 500000.0, y: 5760000.0)],
        ]);
        assert!(!validate_geographic(&projected, &Crs::wgs84()).is_valid);
        assert!(!validate_geographic(&ok, &Crs::from_epsg(32631)).is_valid);
    }
}
