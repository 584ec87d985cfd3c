//! Shipping cost calculation.
//!
//! Price is a pure function of a package's physical attributes and one row of
//! the rate table. All surcharges are additive:
//!
//! ```text
//! base_rate
//!   + urgent_rate            if urgent
//!   + fragile_rate           if fragile
//!   + oversize_rate          if volume > OVERSIZE_THRESHOLD
//!   + margin * per-kg rate   if trunc(weight - base_weight) > 0
//! ```

use crate::models::{package::PackageMetrics, package_rate::PackageRate};

/// Volume (cm³) above which the oversize surcharge applies.
pub const OVERSIZE_THRESHOLD: f64 = 50_000.0;

/// Whole kilograms by which `weight` exceeds `base_weight`, truncated toward zero.
pub fn overweight_margin(weight: f64, base_weight: f64) -> f64 {
    (weight - base_weight).trunc()
}

/// Compute the shipping cost of a package billed against `rate`.
pub fn compute_price(metrics: &PackageMetrics, rate: &PackageRate) -> f64 {
    let oversize_margin = metrics.volume() - OVERSIZE_THRESHOLD;
    let overweight = overweight_margin(metrics.weight, rate.base_weight);

    let urgent = if metrics.is_urgent { rate.urgent_rate } else { 0.0 };
    let fragile = if metrics.is_fragile { rate.fragile_rate } else { 0.0 };
    let oversize = if oversize_margin > 0.0 {
        rate.oversize_rate
    } else {
        0.0
    };
    let overweight = if overweight > 0.0 {
        overweight * rate.overweight_rate_per_kg
    } else {
        0.0
    };

    rate.base_rate + urgent + fragile + oversize + overweight
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn rate() -> PackageRate {
        PackageRate {
            id: Uuid::new_v4(),
            name: "standard".into(),
            base_rate: 10_000.0,
            base_weight: 5.0,
            oversize_rate: 8_000.0,
            overweight_rate_per_kg: 2_000.0,
            fragile_rate: 5_000.0,
            urgent_rate: 6_000.0,
            created_at: Utc::now(),
        }
    }

    fn metrics(weight: f64, dims: (f64, f64, f64)) -> PackageMetrics {
        PackageMetrics {
            width: dims.0,
            height: dims.1,
            length: dims.2,
            weight,
            is_fragile: false,
            is_urgent: false,
        }
    }

    #[test]
    fn fragile_oversize_overweight_package() {
        // 60 * 50 * 20 = 60_000 cm³
        let mut package = metrics(7.0, (60.0, 50.0, 20.0));
        package.is_fragile = true;
        assert_eq!(compute_price(&package, &rate()), 27_000.0);
    }

    #[test]
    fn small_light_package_pays_base_rate_only() {
        let package = metrics(1.0, (10.0, 10.0, 10.0));
        assert_eq!(compute_price(&package, &rate()), 10_000.0);
    }

    #[test]
    fn threshold_volume_is_not_oversize() {
        // exactly 50_000 cm³
        let package = metrics(1.0, (50.0, 50.0, 20.0));
        assert_eq!(compute_price(&package, &rate()), 10_000.0);
    }

    #[test]
    fn fractional_overweight_is_truncated() {
        assert_eq!(overweight_margin(5.9, 5.0), 0.0);
        assert_eq!(overweight_margin(7.99, 5.0), 2.0);
        assert_eq!(overweight_margin(3.0, 5.0), -2.0);

        let package = metrics(5.9, (10.0, 10.0, 10.0));
        assert_eq!(compute_price(&package, &rate()), 10_000.0);
    }

    #[test]
    fn weight_past_base_weight_strictly_increases_price() {
        let rate = rate();
        let mut last = compute_price(&metrics(5.0, (10.0, 10.0, 10.0)), &rate);
        for weight in [6.0, 7.0, 8.5, 12.0] {
            let price = compute_price(&metrics(weight, (10.0, 10.0, 10.0)), &rate);
            assert!(price > last, "{weight} kg should cost more than {last}");
            last = price;
        }
    }

    #[test]
    fn flags_add_their_flat_rates() {
        let rate = rate();
        let plain = metrics(1.0, (10.0, 10.0, 10.0));
        let base = compute_price(&plain, &rate);

        let urgent = PackageMetrics {
            is_urgent: true,
            ..plain
        };
        assert_eq!(compute_price(&urgent, &rate) - base, rate.urgent_rate);

        let fragile = PackageMetrics {
            is_fragile: true,
            ..plain
        };
        assert_eq!(compute_price(&fragile, &rate) - base, rate.fragile_rate);
    }
}
