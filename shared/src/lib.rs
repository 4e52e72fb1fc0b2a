use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Body of `POST /find_path`. The routing service expects the four
/// coordinates flattened rather than nested pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
}

impl RouteRequest {
    pub fn from_endpoints(start: Coordinate, end: Coordinate) -> Self {
        Self {
            start_lat: start.lat,
            start_lon: start.lon,
            end_lat: end.lat,
            end_lon: end.lon,
        }
    }
}

/// Successful `/find_path` response: two pre-rendered route previews and
/// their weights. A fresh value replaces the previous one on every
/// submission; nothing is kept beyond the latest result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub safest_path_map_html: String,
    pub shortest_path_map_html: String,
    pub safest_path_weight: f64,
    pub shortest_path_weight: f64,
}
