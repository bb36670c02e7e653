//! Great-circle math for the "tours near me" endpoints.

use crate::domain::models::tour::Tour;
use crate::error::AppError;
use serde::Serialize;

const EARTH_RADIUS_MI: f64 = 3963.2;
const EARTH_RADIUS_KM: f64 = 6378.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometers,
}

impl Unit {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "mi" => Ok(Unit::Miles),
            "km" => Ok(Unit::Kilometers),
            other => Err(AppError::Validation(format!("Unit must be 'mi' or 'km', got '{}'", other))),
        }
    }

    fn earth_radius(self) -> f64 {
        match self {
            Unit::Miles => EARTH_RADIUS_MI,
            Unit::Kilometers => EARTH_RADIUS_KM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    /// Parses the `lat,lng` path segment.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::Validation("Please provide latitude and longitude in the format lat,lng.".into());

        let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(invalid());
        }
        Ok(Self { lat, lng })
    }
}

/// Haversine distance between two points in the given unit.
pub fn distance(a: Point, b: Point, unit: Unit) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * unit.earth_radius() * h.sqrt().min(1.0).asin()
}

fn start_of(tour: &Tour) -> Option<Point> {
    tour.start_point().map(|(lat, lng)| Point { lat, lng })
}

pub fn tours_within(tours: Vec<Tour>, center: Point, radius: f64, unit: Unit) -> Vec<Tour> {
    tours
        .into_iter()
        .filter(|tour| start_of(tour).is_some_and(|p| distance(center, p, unit) <= radius))
        .collect()
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TourDistance {
    pub id: String,
    pub name: String,
    pub distance: f64,
}

/// Distance from `origin` to every located tour, nearest first.
pub fn distances_from(tours: &[Tour], origin: Point, unit: Unit) -> Vec<TourDistance> {
    let mut out: Vec<TourDistance> = tours
        .iter()
        .filter_map(|tour| {
            let start = start_of(tour)?;
            Some(TourDistance {
                id: tour.id.clone(),
                name: tour.name.clone(),
                distance: distance(origin, start, unit),
            })
        })
        .collect();

    out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOS_ANGELES: Point = Point { lat: 34.111745, lng: -118.113491 };
    const SAN_FRANCISCO: Point = Point { lat: 37.7749, lng: -122.4194 };

    #[test]
    fn parses_lat_lng() {
        assert_eq!(Point::parse("34.1,-118.1").unwrap(), Point { lat: 34.1, lng: -118.1 });
        assert!(Point::parse("34.1").is_err());
        assert!(Point::parse("abc,1").is_err());
        assert!(Point::parse("95,1").is_err());
    }

    #[test]
    fn distance_between_la_and_sf() {
        let km = distance(LOS_ANGELES, SAN_FRANCISCO, Unit::Kilometers);
        let mi = distance(LOS_ANGELES, SAN_FRANCISCO, Unit::Miles);

        assert!((555.0..570.0).contains(&km), "got {km}");
        assert!((345.0..355.0).contains(&mi), "got {mi}");
        assert_eq!(distance(LOS_ANGELES, LOS_ANGELES, Unit::Miles), 0.0);
    }

    #[test]
    fn unit_must_be_known() {
        assert_eq!(Unit::parse("mi").unwrap(), Unit::Miles);
        assert!(Unit::parse("parsec").is_err());
    }
}
