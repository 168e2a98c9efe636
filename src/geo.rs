use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Edge length of a slippy-map tile in pixels
pub const TILE_SIZE: f64 = 256.0;

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance to `other` in kilometres
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance between two points, in kilometres.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let cos_product = lat1.to_radians().cos() * lat2.to_radians().cos();
    let a = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * cos_product;

    // Rounding can push `a` a hair past 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Project a coordinate to absolute Web-Mercator pixel space at `zoom`.
///
/// Zoom may be fractional, as map links often carry values like `z=11.5`.
pub fn coordinate_to_pixel(coordinate: Coordinate, zoom: f64) -> (f64, f64) {
    let scale = 2f64.powf(zoom) * TILE_SIZE;
    let lat = coordinate.latitude.to_radians();

    let x = (coordinate.longitude + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;

    (x * scale, y * scale)
}

/// Recover the coordinate of a point rendered `offset_x`/`offset_y` pixels away
/// from the centre of a map showing (`center_lat`, `center_lon`) at `zoom`.
///
/// Only meaningful for latitudes strictly inside (-85, 85).
pub fn pixel_offset_to_coordinate(
    offset_x: f64,
    offset_y: f64,
    center_lat: f64,
    center_lon: f64,
    zoom: f64,
) -> Coordinate {
    let scale = 2f64.powf(zoom) * TILE_SIZE;
    let (center_x, center_y) = coordinate_to_pixel(Coordinate::new(center_lat, center_lon), zoom);

    let x = (center_x + offset_x) / scale;
    let y = (center_y + offset_y) / scale;

    let longitude = x * 360.0 - 180.0;
    let latitude = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();

    Coordinate::new(latitude, longitude)
}
