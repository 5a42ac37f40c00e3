use serde::{Deserialize, Serialize};

/// GeoJSON point as stored for `2dsphere` indexes. Coordinates are `[lng, lat]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: GeoKind,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub enum GeoKind {
    #[default]
    Point,
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            kind: GeoKind::Point,
            coordinates: [lng, lat],
        }
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn is_valid(&self) -> bool {
        (-180.0..=180.0).contains(&self.lng()) && (-90.0..=90.0).contains(&self.lat())
    }
}
