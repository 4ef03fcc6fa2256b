//! Property tests for request validation and scene filtering

use std::collections::HashMap;

use agriboundary_core::error::BoundaryError;
use agriboundary_core::models::{AreaOfInterest, ImageryRequest};
use agriboundary_imagery::composite::{filter_scenes, Scene};
use chrono::{Duration, NaiveDate};
use geo::{polygon, MultiPolygon};
use proptest::prelude::*;

fn area() -> AreaOfInterest {
    let poly = polygon![
        (x: 5.0, y: 52.0), (x: 5.01, y: 52.0), (x: 5.01, y: 52.01), (x: 5.0, y: 52.01), (x: 5.0, y: 52.0)
    ];
    AreaOfInterest::new(MultiPolygon::new(vec![poly]), "field.kml", 1)
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()
}

fn scene(day: i64, cloud: f64) -> Scene {
    Scene {
        id: format!("S2_{}_{}", day, cloud),
        date: base_date() + Duration::days(day),
        cloudy_pixel_percentage: cloud,
        footprint: [4.5, 51.5, 5.5, 52.5],
        bands: HashMap::new(),
        qa60: Vec::new(),
    }
}

proptest! {
    #[test]
    fn prop_inverted_window_is_rejected(start in 1i64..3650, gap in 1i64..365) {
        let start_date = base_date() + Duration::days(start);
        let end_date = start_date - Duration::days(gap);
        let result = ImageryRequest::new(area(), start_date, end_date, 10.0);
        let rejected = matches!(result, Err(BoundaryError::InvalidRequest { .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn prop_cloud_outside_range_is_rejected(cloud in prop_oneof![-1000.0f64..-0.001, 100.001f64..1000.0]) {
        let result = ImageryRequest::new(area(), base_date(), base_date(), cloud);
        prop_assert!(result.is_err());
    }

    #[test]
    fn prop_lower_threshold_never_adds_scenes(
        clouds in proptest::collection::vec(0.0f64..100.0, 0..40),
        low in 0.0f64..100.0,
        extra in 0.0f64..100.0,
    ) {
        let high = (low + extra).min(100.0);
        let scenes: Vec<Scene> = clouds.iter().enumerate().map(|(i, c)| scene(i as i64, *c)).collect();
        let end = base_date() + Duration::days(60);

        let strict = ImageryRequest::new(area(), base_date(), end, low).unwrap();
        let loose = ImageryRequest::new(area(), base_date(), end, high).unwrap();

        let kept_strict = filter_scenes(&scenes, &strict);
        let kept_loose = filter_scenes(&scenes, &loose);

        prop_assert!(kept_strict.len() <= kept_loose.len());
        for s in &kept_strict {
            prop_assert!(kept_loose.iter().any(|l| l.id == s.id));
        }
    }
}

#[test]
fn test_zero_threshold_keeps_nothing() {
    let scenes = vec![scene(0, 0.0), scene(1, 0.5)];
    let request = ImageryRequest::new(area(), base_date(), base_date() + Duration::days(5), 0.0).unwrap();
    assert!(filter_scenes(&scenes, &request).is_empty());
}

#[test]
fn test_date_window_is_inclusive() {
    let scenes = vec![scene(0, 1.0), scene(10, 1.0), scene(11, 1.0)];
    let request =
        ImageryRequest::new(area(), base_date(), base_date() + Duration::days(10), 10.0).unwrap();
    assert_eq!(filter_scenes(&scenes, &request).len(), 2);
}

#[test]
fn test_footprint_must_intersect() {
    let mut far = scene(0, 1.0);
    far.footprint = [10.0, 40.0, 11.0, 41.0];
    let request =
        ImageryRequest::new(area(), base_date(), base_date() + Duration::days(1), 10.0).unwrap();
    assert!(filter_scenes(&[far], &request).is_empty());
}
