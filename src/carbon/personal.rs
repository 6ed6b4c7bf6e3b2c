//! Personal daily footprint: electricity use, one mode of travel, and diet.

use serde::Serialize;
use tracing::warn;

use super::round_to;

/// kg CO2e per kWh of grid electricity.
pub const ELECTRICITY_FACTOR: f64 = 0.41;

/// kg CO2e per passenger-km.
pub const TRANSPORT_FACTORS: &[(&str, f64)] = &[
    ("car", 0.192),
    ("bus", 0.105),
    ("train", 0.041),
    ("bicycle", 0.0),
    ("walking", 0.0),
    ("motorcycle", 0.103),
    ("plane", 0.255),
];

/// kg CO2e per day.
pub const DIET_FACTORS: &[(&str, f64)] = &[
    ("meat_heavy", 7.19),
    ("meat_medium", 5.63),
    ("pescatarian", 3.91),
    ("vegetarian", 3.81),
    ("vegan", 2.89),
];

#[derive(Debug, Clone, Copy)]
pub struct PersonalInput<'a> {
    /// kWh per day.
    pub electricity_kwh: f64,
    pub transport_type: &'a str,
    /// km per day.
    pub distance_km: f64,
    pub diet: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PersonalFootprint {
    pub electricity: f64,
    pub transport: f64,
    pub diet: f64,
    pub total: f64,
}

fn lookup(table: &[(&str, f64)], key: &str) -> Option<f64> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Daily footprint in kg CO2e, each part rounded to two decimals.
///
/// Unknown transport types and diets contribute nothing.
pub fn calculate(input: PersonalInput<'_>) -> PersonalFootprint {
    let transport_factor = lookup(TRANSPORT_FACTORS, input.transport_type).unwrap_or_else(|| {
        warn!(transport = input.transport_type, "unknown transport type");
        0.0
    });
    let diet = lookup(DIET_FACTORS, input.diet).unwrap_or_else(|| {
        warn!(diet = input.diet, "unknown diet");
        0.0
    });

    let electricity = input.electricity_kwh * ELECTRICITY_FACTOR;
    let transport = input.distance_km * transport_factor;
    PersonalFootprint {
        electricity: round_to(electricity, 2),
        transport: round_to(transport, 2),
        diet: round_to(diet, 2),
        total: round_to(electricity + transport + diet, 2),
    }
}
