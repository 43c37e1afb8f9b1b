use serde::Deserialize;

use crate::config::GeocodingConfig;
use crate::error::{AppError, AppResult};
use crate::models::venue::GeocodeResult;

/// Nominatim-compatible search client.
#[derive(Clone)]
pub struct GeocodingClient {
    api_url: String,
    user_agent: String,
    limit: u32,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Place {
    display_name: String,
    lat: String,
    lon: String,
}

fn to_result(place: Place) -> Option<GeocodeResult> {
    Some(GeocodeResult {
        name: place.display_name,
        lat: place.lat.parse().ok()?,
        lng: place.lon.parse().ok()?,
    })
}

impl GeocodingClient {
    pub fn new(config: &GeocodingConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            limit: config.result_limit,
            client: reqwest::Client::new(),
        }
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<GeocodeResult>> {
        let limit = self.limit.to_string();
        let resp = self
            .client
            .get(format!("{}/search", self.api_url))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[("q", query), ("format", "json"), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Geocoding request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!("Geocoding error: {}", status)));
        }

        let places: Vec<Place> = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Geocoding response parse failed: {}", e)))?;

        Ok(places.into_iter().filter_map(to_result).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_places_and_skips_bad_coordinates() {
        let raw = r#"[
            {"display_name": "Club Central, Barcelona", "lat": "41.3874", "lon": "2.1686", "type": "sports_centre"},
            {"display_name": "Broken", "lat": "n/a", "lon": "2.0"}
        ]"#;
        let places: Vec<Place> = serde_json::from_str(raw).unwrap();
        let results: Vec<GeocodeResult> = places.into_iter().filter_map(to_result).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Club Central, Barcelona");
        assert!((results[0].lng - 2.1686).abs() < 1e-9);
    }
}
