/// Tips for everyone, listed first.
const GENERAL: &[&str] = &[
    "Use LED bulbs which use up to 85% less energy than traditional bulbs",
    "Turn off lights and unplug electronics when not in use",
    "Reduce water usage with shorter showers and fixing leaks",
    "Eat locally grown, seasonal food to reduce transportation emissions",
    "Reduce food waste by planning meals and composting scraps",
];

const HIGH: &[&str] = &[
    "Consider renewable energy options for your home",
    "Evaluate home insulation to reduce heating/cooling needs",
    "Look into carbon offset programs for unavoidable emissions",
    "Consider reducing air travel when possible",
];

const MEDIUM: &[&str] = &[
    "Try to reduce meat consumption a few days per week",
    "Use public transportation more frequently",
    "Consider carpooling or ride-sharing options",
];

const LOW: &[&str] = &[
    "Continue your great sustainability practices",
    "Share your sustainability knowledge with friends and family",
];

/// Reduction tips for a daily footprint of `total_kg` kg CO2e.
pub fn reduction_tips(total_kg: f64) -> Vec<&'static str> {
    let extra = if total_kg > 20.0 {
        HIGH
    } else if total_kg > 10.0 {
        MEDIUM
    } else {
        LOW
    };
    GENERAL.iter().chain(extra).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_tips_come_first() {
        let tips = reduction_tips(5.0);
        assert_eq!(&tips[..5], GENERAL);
        assert_eq!(tips.len(), 7);
    }

    #[test]
    fn tiers_by_footprint() {
        assert_eq!(reduction_tips(25.0).len(), 9);
        assert_eq!(reduction_tips(15.0).len(), 8);
        // thresholds are exclusive
        assert_eq!(reduction_tips(20.0).len(), 8);
        assert_eq!(reduction_tips(10.0).len(), 7);
        assert!(reduction_tips(21.0).contains(&"Consider reducing air travel when possible"));
    }
}
