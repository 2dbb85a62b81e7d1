use rand::Rng;

use crate::config::DispatchConfig;

/// Base fare plus a per-km rate, rounded up to a whole unit.
pub fn fare_for_distance(config: &DispatchConfig, distance_km: f64) -> u64 {
    (config.base_fare as f64 + distance_km * config.fare_per_km as f64).ceil() as u64
}

/// The amount actually charged: fare plus tax, rounded up.
pub fn charged_total(config: &DispatchConfig, fare: u64) -> u64 {
    (fare * (100 + config.tax_pct)).div_ceil(100)
}

/// Fresh 4-digit one-time code. Collisions with a ride's previous code are
/// not checked; the code is only scoped to that ride.
pub fn generate_otp() -> u32 {
    rand::thread_rng().gen_range(1000..=9999)
}

#[cfg(test)]
mod tests {
    use super::{charged_total, fare_for_distance, generate_otp};
    use crate::config::DispatchConfig;

    #[test]
    fn fare_is_ceil_of_base_plus_per_km() {
        let config = DispatchConfig::default();

        assert_eq!(fare_for_distance(&config, 3.2), 52);
        assert_eq!(fare_for_distance(&config, 0.0), 20);
        assert_eq!(fare_for_distance(&config, 0.01), 21);
    }

    #[test]
    fn charged_total_applies_tax_rounded_up() {
        let config = DispatchConfig::default();

        // 52 * 1.18 = 61.36
        assert_eq!(charged_total(&config, 52), 62);
        assert_eq!(charged_total(&config, 100), 118);
    }

    #[test]
    fn otp_is_four_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert!((1000..=9999).contains(&otp));
        }
    }
}
