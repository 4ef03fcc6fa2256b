//! CRS transformation and normalization

use agriboundary_core::error::{BoundaryError, Result};
use agriboundary_core::models::{BoundaryPolygon, BoundarySet, Crs};
use geo::{Coord, LineString, MultiPolygon, Polygon, Rect};
use proj::Proj;

/// Check if two CRS are the same
pub fn crs_match(crs1: &Crs, crs2: &Crs) -> bool {
    crs1.epsg == crs2.epsg
}

/// Reusable transformation between two CRSs; identity when they match
pub struct Transformer {
    from: Crs,
    to: Crs,
    proj: Option<Proj>,
}

impl Transformer {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        let proj = if crs_match(from, to) {
            None
        } else {
            let proj = Proj::new_known_crs(&from.authority(), &to.authority(), None).map_err(
                |e| BoundaryError::Reprojection {
                    from: from.authority(),
                    to: to.authority(),
                    reason: format!("Failed to create projection: {}", e),
                },
            )?;
            Some(proj)
        };

        Ok(Self { from: from.clone(), to: to.clone(), proj })
    }

    pub fn is_identity(&self) -> bool {
        self.proj.is_none()
    }

    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        match &self.proj {
            None => Ok(coord),
            Some(proj) => {
                let (x, y) = proj.convert((coord.x, coord.y)).map_err(|e| {
                    BoundaryError::Reprojection {
                        from: self.from.authority(),
                        to: self.to.authority(),
                        reason: format!("Projection failed at ({}, {}): {}", coord.x, coord.y, e),
                    }
                })?;
                Ok(Coord { x, y })
            }
        }
    }

    pub fn line_string(&self, ls: &LineString<f64>) -> Result<LineString<f64>> {
        let coords = ls.0.iter().map(|c| self.coord(*c)).collect::<Result<Vec<_>>>()?;
        Ok(LineString::from(coords))
    }

    pub fn polygon(&self, poly: &Polygon<f64>) -> Result<Polygon<f64>> {
        let exterior = self.line_string(poly.exterior())?;
        let interiors = poly
            .interiors()
            .iter()
            .map(|ring| self.line_string(ring))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    pub fn multi_polygon(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        let polygons = mp.iter().map(|p| self.polygon(p)).collect::<Result<Vec<_>>>()?;
        Ok(MultiPolygon::new(polygons))
    }

    /// Bounding box of the transformed rectangle, densified along its edges so
    /// curved projected edges are covered.
    pub fn rect(&self, rect: Rect<f64>) -> Result<Rect<f64>> {
        if self.is_identity() {
            return Ok(rect);
        }

        const STEPS: usize = 8;
        let (min, max) = (rect.min(), rect.max());
        let mut xs = Vec::with_capacity(4 * (STEPS + 1));
        let mut ys = Vec::with_capacity(4 * (STEPS + 1));

        for i in 0..=STEPS {
            let t = i as f64 / STEPS as f64;
            let x = min.x + t * (max.x - min.x);
            let y = min.y + t * (max.y - min.y);
            for c in [
                Coord { x, y: min.y },
                Coord { x, y: max.y },
                Coord { x: min.x, y },
                Coord { x: max.x, y },
            ] {
                let p = self.coord(c)?;
                xs.push(p.x);
                ys.push(p.y);
            }
        }

        let fold_min = |v: &[f64]| v.iter().copied().fold(f64::INFINITY, f64::min);
        let fold_max = |v: &[f64]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Rect::new(
            Coord { x: fold_min(&xs), y: fold_min(&ys) },
            Coord { x: fold_max(&xs), y: fold_max(&ys) },
        ))
    }
}

/// Reproject a single coordinate
pub fn reproject_coord(coord: Coord<f64>, from_crs: &Crs, to_crs: &Crs) -> Result<Coord<f64>> {
    Transformer::new(from_crs, to_crs)?.coord(coord)
}

/// Reproject a polygon from one CRS to another
pub fn reproject_polygon(poly: &Polygon<f64>, from_crs: &Crs, to_crs: &Crs) -> Result<Polygon<f64>> {
    Transformer::new(from_crs, to_crs)?.polygon(poly)
}

/// Reproject a multipolygon from one CRS to another
pub fn reproject_multi_polygon(
    mp: &MultiPolygon<f64>,
    from_crs: &Crs,
    to_crs: &Crs,
) -> Result<MultiPolygon<f64>> {
    Transformer::new(from_crs, to_crs)?.multi_polygon(mp)
}

/// Reproject every boundary, keeping order and tags
pub fn reproject_boundaries(set: &BoundarySet, to_crs: &Crs) -> Result<BoundarySet> {
    let transformer = Transformer::new(&set.crs, to_crs)?;
    if transformer.is_identity() {
        return Ok(set.clone());
    }

    let polygons = set
        .polygons
        .iter()
        .map(|b| Ok(BoundaryPolygon::new(transformer.polygon(&b.polygon)?, b.cluster_id)))
        .collect::<Result<Vec<_>>>()?;

    Ok(BoundarySet::new(polygons, to_crs.clone()))
}

/// UTM zone (WGS 84 datum) containing a longitude/latitude
pub fn utm_crs_for(lon: f64, lat: f64) -> Crs {
    let normalized = ((lon + 180.0).rem_euclid(360.0)) - 180.0;
    let zone = (((normalized + 180.0) / 6.0).floor() as u32).clamp(0, 59) + 1;
    let (base, hemisphere) = if lat >= 0.0 { (32600, "N") } else { (32700, "S") };
    Crs::new(base + zone, format!("WGS 84 / UTM zone {}{}", zone, hemisphere))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_identity_transform_skips_proj() {
        let t = Transformer::new(&Crs::wgs84(), &Crs::wgs84()).unwrap();
        assert!(t.is_identity());
        let c = t.coord(Coord { x: 5.0, y: 52.0 }).unwrap();
        assert_eq!(c, Coord { x: 5.0, y: 52.0 });
    }

    #[test]
    fn test_utm_zone_selection() {
        assert_eq!(utm_crs_for(5.1, 52.0).epsg, 32631);
        assert_eq!(utm_crs_for(-122.3, 47.6).epsg, 32610);
        assert_eq!(utm_crs_for(151.2, -33.9).epsg, 32756);
        assert_eq!(utm_crs_for(180.0, 0.0).epsg, 32601);
        assert_eq!(utm_crs_for(179.9, 0.0).epsg, 32660);
    }

    #[test]
    fn test_web_mercator_round_trip() {
        let poly = polygon![
            (x: 5.0, y: 52.0),
            (x: 5.01, y: 52.0),
            (x: 5.01, y: 52.01),
            (x: 5.0, y: 52.0),
        ];
        let mp = MultiPolygon::new(vec![poly.clone()]);
        let projected = reproject_multi_polygon(&mp, &Crs::wgs84(), &Crs::web_mercator()).unwrap();
        let first = projected.0[0].exterior().0[0];
        assert!((first.x - 556_597.45).abs() < 1.0, "x was {}", first.x);

        let back = reproject_multi_polygon(&projected, &Crs::web_mercator(), &Crs::wgs84()).unwrap();
        for (a, b) in back.0[0].exterior().0.iter().zip(poly.exterior().0.iter()) {
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reproject_boundaries_keeps_tags() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let set = BoundarySet::new(
            vec![BoundaryPolygon::new(poly.clone(), Some(4)), BoundaryPolygon::new(poly, None)],
            Crs::wgs84(),
        );
        let out = reproject_boundaries(&set, &Crs::web_mercator()).unwrap();
        assert_eq!(out.crs, Crs::web_mercator());
        assert_eq!(out.cluster_ids(), vec![Some(4), None]);
    }
}
