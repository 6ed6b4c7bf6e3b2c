//! Carbon footprint calculations.
//!
//! - [`estimator`] — website sustainability analysis (hosting × traffic ×
//!   page weight, URL-derived scores, optional LLM analysis).
//! - [`personal`] — personal daily footprint from electricity, travel, diet.
//! - [`website`] — footprint from a measured page weight and monthly views.
//! - [`tips`] — reduction tips scaled to a footprint.

pub mod estimator;
pub mod personal;
pub mod tips;
pub mod website;

/// Round to `places` decimal places, halves away from zero.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_places() {
        assert_eq!(round_to(1.25, 1), 1.3);
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(0.0, 2), 0.0);
    }
}
