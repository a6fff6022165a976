//! Upload pricing.

use crate::core::config::Config;

/// Overage is billed per started chunk of this size.
pub const CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Number of started chunks above the free threshold.
pub fn extra_chunks(size: u64, free_threshold: u64) -> u64 {
    size.saturating_sub(free_threshold).div_ceil(CHUNK_SIZE)
}

/// `base + ceil(max(0, size - threshold) / CHUNK_SIZE) * unit`
pub fn upload_cost(size: u64, free_threshold: u64, base: f64, unit: f64) -> f64 {
    base + extra_chunks(size, free_threshold) as f64 * unit
}

/// Upload cost under the given configuration.
pub fn upload_cost_for(config: &Config, size: u64) -> f64 {
    upload_cost(size, config.max_file_size, config.price_upload, config.price_per_chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn under_threshold_costs_base() {
        assert_eq!(upload_cost(10 * MIB, 100 * MIB, 1.0, 1.0), 1.0);
        assert_eq!(upload_cost(100 * MIB, 100 * MIB, 1.0, 1.0), 1.0);
        assert_eq!(upload_cost(0, 100 * MIB, 1.0, 1.0), 1.0);
    }

    #[test]
    fn overage_rounds_up_per_chunk() {
        assert_eq!(upload_cost(140 * MIB, 100 * MIB, 1.0, 1.0), 2.0);
        assert_eq!(upload_cost(100 * MIB + 1, 100 * MIB, 1.0, 1.0), 2.0);
        assert_eq!(upload_cost(150 * MIB, 100 * MIB, 1.0, 1.0), 2.0);
        assert_eq!(upload_cost(150 * MIB + 1, 100 * MIB, 1.0, 0.5), 2.0);
    }

    #[test]
    fn zero_threshold_bills_everything() {
        assert_eq!(extra_chunks(1, 0), 1);
        assert_eq!(extra_chunks(0, 0), 0);
    }

    #[test]
    fn uses_config_prices() {
        let cfg = Config {
            price_upload: 2.0,
            price_per_chunk: 0.25,
            max_file_size: 0,
            ..Config::default()
        };
        assert_eq!(upload_cost_for(&cfg, 120 * MIB), 2.75);
    }
}
