use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub grpc_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub dispatch: DispatchConfig,
}

/// Tuning knobs for the dispatch engine itself, kept separate from server
/// wiring so tests can construct them directly.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Ordered search radius tiers in km. Dispatch starts at the first
    /// tier; the sweeper escalates one tier per pass and terminates rides
    /// that go stale at the last one.
    pub search_radii_km: Vec<f64>,
    pub sweep_interval: Duration,
    pub stale_after: Duration,
    pub temp_ride_ttl: Duration,
    pub base_fare: u64,
    pub fare_per_km: u64,
    pub tax_pct: u64,
    pub driver_share_pct: u64,
    pub currency: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            search_radii_km: vec![5.0, 7.0],
            sweep_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(120),
            temp_ride_ttl: Duration::from_secs(24 * 60 * 60),
            base_fare: 20,
            fare_per_km: 10,
            tax_pct: 18,
            driver_share_pct: 90,
            currency: "inr".to_string(),
        }
    }
}

impl DispatchConfig {
    /// The tier that follows `radius_km`, if any.
    pub fn next_radius_km(&self, radius_km: f64) -> Option<f64> {
        self.search_radii_km
            .iter()
            .copied()
            .find(|tier| *tier > radius_km)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = DispatchConfig::default();

        let dispatch = DispatchConfig {
            search_radii_km: parse_radii("SEARCH_RADII_KM", defaults.search_radii_km)?,
            sweep_interval: Duration::from_secs(parse_or_default("SWEEP_INTERVAL_SECS", 10)?),
            stale_after: Duration::from_secs(parse_or_default("STALE_AFTER_SECS", 120)?),
            temp_ride_ttl: Duration::from_secs(parse_or_default(
                "TEMP_RIDE_TTL_SECS",
                24 * 60 * 60,
            )?),
            base_fare: parse_or_default("BASE_FARE", defaults.base_fare)?,
            fare_per_km: parse_or_default("FARE_PER_KM", defaults.fare_per_km)?,
            tax_pct: parse_or_default("TAX_PCT", defaults.tax_pct)?,
            driver_share_pct: parse_or_default("DRIVER_SHARE_PCT", defaults.driver_share_pct)?,
            currency: env::var("CURRENCY").unwrap_or(defaults.currency),
        };

        if dispatch.search_radii_km.is_empty() {
            return Err(AppError::Internal(
                "SEARCH_RADII_KM must name at least one tier".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            grpc_port: parse_or_default("GRPC_PORT", 50051)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            dispatch,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn parse_radii(key: &str, default: Vec<f64>) -> Result<Vec<f64>, AppError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };

    let mut tiers = Vec::new();
    for part in raw.split(',') {
        let tier = part
            .trim()
            .parse::<f64>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}")))?;
        tiers.push(tier);
    }

    tiers.sort_by(|a, b| a.total_cmp(b));
    Ok(tiers)
}

#[cfg(test)]
mod tests {
    use super::DispatchConfig;

    #[test]
    fn walks_radius_tiers_in_order() {
        let config = DispatchConfig::default();

        assert_eq!(config.next_radius_km(5.0), Some(7.0));
        assert_eq!(config.next_radius_km(7.0), None);
    }
}
