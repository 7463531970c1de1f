//! Curated fact database
//!
//! Every entry is a `Fact<T>` carrying its own provenance: where it came
//! from, how much it is trusted, and when it was last refreshed.

use crate::types::Season;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A reference value with provenance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact<T> {
    pub value: T,
    pub source: String,
    /// Trust in the entry (0.0-1.0)
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
}

impl<T> Fact<T> {
    pub fn new(value: T, source: impl Into<String>, confidence: f64) -> Self {
        Self {
            value,
            source: source.into(),
            confidence: confidence.clamp(0.0, 1.0),
            last_updated: Utc::now(),
        }
    }
}

/// Country reference record
#[derive(Debug, Clone, Copy)]
pub struct CountryRecord {
    pub code: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub currency: &'static str,
    /// (min_lat, max_lat, min_lng, max_lng)
    pub bounds: (f64, f64, f64, f64),
}

impl CountryRecord {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        let (min_lat, max_lat, min_lng, max_lng) = self.bounds;
        (min_lat..=max_lat).contains(&lat) && (min_lng..=max_lng).contains(&lng)
    }

    /// Entirely south of the equator
    pub fn is_southern(&self) -> bool {
        self.bounds.1 < 0.0
    }
}

const fn country(
    code: &'static str,
    name: &'static str,
    aliases: &'static [&'static str],
    currency: &'static str,
    bounds: (f64, f64, f64, f64),
) -> CountryRecord {
    CountryRecord {
        code,
        name,
        aliases,
        currency,
        bounds,
    }
}

pub const COUNTRIES: &[CountryRecord] = &[
    country(
        "US",
        "United States",
        &["USA", "United States of America"],
        "USD",
        (18.9, 71.4, -179.2, -66.9),
    ),
    country("CA", "Canada", &[], "CAD", (41.7, 83.1, -141.0, -52.6)),
    country("MX", "Mexico", &[], "MXN", (14.5, 32.7, -118.4, -86.7)),
    country(
        "GB",
        "United Kingdom",
        &["UK", "Great Britain", "England", "Scotland"],
        "GBP",
        (49.9, 60.9, -8.6, 1.8),
    ),
    country("FR", "France", &[], "EUR", (41.3, 51.1, -5.2, 9.6)),
    country("DE", "Germany", &["Deutschland"], "EUR", (47.3, 55.1, 5.9, 15.0)),
    country("ES", "Spain", &["España"], "EUR", (27.6, 43.8, -18.2, 4.3)),
    country("IT", "Italy", &["Italia"], "EUR", (35.5, 47.1, 6.6, 18.5)),
    country("PT", "Portugal", &[], "EUR", (32.6, 42.2, -31.3, -6.2)),
    country("NL", "Netherlands", &["Holland"], "EUR", (50.7, 53.6, 3.3, 7.2)),
    country("AU", "Australia", &[], "AUD", (-43.7, -10.7, 113.3, 153.6)),
    country("NZ", "New Zealand", &[], "NZD", (-47.3, -34.4, 166.4, 178.6)),
    country("JP", "Japan", &[], "JPY", (24.0, 45.6, 122.9, 145.8)),
    country("BR", "Brazil", &["Brasil"], "BRL", (-33.8, 5.3, -74.0, -34.8)),
    country("ZA", "South Africa", &[], "ZAR", (-34.9, -22.1, 16.4, 32.9)),
    country("AR", "Argentina", &[], "ARS", (-55.1, -21.8, -73.6, -53.6)),
];

/// Look up a country by ISO code, name or alias (case-insensitive)
pub fn country_record(raw: &str) -> Option<&'static CountryRecord> {
    let wanted = raw.trim();
    COUNTRIES.iter().find(|c| {
        c.code.eq_ignore_ascii_case(wanted)
            || c.name.eq_ignore_ascii_case(wanted)
            || c.aliases.iter().any(|a| a.eq_ignore_ascii_case(wanted))
    })
}

/// (city, country code)
const CITIES: &[(&str, &str)] = &[
    ("new york", "US"),
    ("los angeles", "US"),
    ("san francisco", "US"),
    ("miami", "US"),
    ("austin", "US"),
    ("toronto", "CA"),
    ("vancouver", "CA"),
    ("cancun", "MX"),
    ("mexico city", "MX"),
    ("london", "GB"),
    ("edinburgh", "GB"),
    ("paris", "FR"),
    ("nice", "FR"),
    ("lyon", "FR"),
    ("berlin", "DE"),
    ("munich", "DE"),
    ("barcelona", "ES"),
    ("madrid", "ES"),
    ("rome", "IT"),
    ("florence", "IT"),
    ("lisbon", "PT"),
    ("porto", "PT"),
    ("amsterdam", "NL"),
    ("sydney", "AU"),
    ("melbourne", "AU"),
    ("auckland", "NZ"),
    ("tokyo", "JP"),
    ("kyoto", "JP"),
    ("rio de janeiro", "BR"),
    ("cape town", "ZA"),
    ("buenos aires", "AR"),
];

const PROPERTY_TYPES: &[&str] = &[
    "apartment", "house", "villa", "cabin", "studio", "condo", "cottage", "loft", "townhouse",
    "bungalow", "chalet", "guesthouse", "room",
];

const AMENITIES: &[&str] = &[
    "wifi", "kitchen", "parking", "freeparking", "noparking", "pool", "hottub", "airconditioning",
    "heating", "washer", "dryer", "tv", "workspace", "gym", "elevator", "balcony", "garden",
    "bbq", "fireplace", "petfriendly", "nopets", "smokingallowed", "nonsmoking", "breakfast",
    "crib", "wheelchairaccessible", "stairsonly", "nointernet", "beachaccess", "evcharger",
];

/// Month set and price-multiplier range for one season
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonProfile {
    pub months: Vec<u32>,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

/// Maximum occupancy as `bedrooms * per_bedroom + base`
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyRule {
    pub per_bedroom: f64,
    pub base: f64,
}

impl OccupancyRule {
    pub fn limit(&self, bedrooms: f64) -> f64 {
        bedrooms.max(0.0) * self.per_bedroom + self.base
    }
}

/// Northern-hemisphere season for a calendar month (1-12)
pub fn season_for_month(month: u32) -> Season {
    match month {
        3..=5 => Season::Spring,
        6..=8 => Season::Summer,
        9..=11 => Season::Autumn,
        _ => Season::Winter,
    }
}

/// The curated reference data consulted by the factual layer
#[derive(Debug, Clone)]
pub struct FactDatabase {
    /// Plausible nightly price (min, max)
    pub price_bounds: Fact<(f64, f64)>,
    pub property_types: Fact<HashSet<String>>,
    /// Lower-case city name → country code
    pub cities: Fact<HashMap<String, String>>,
    pub seasons: Fact<HashMap<Season, SeasonProfile>>,
    /// Lower-case amenity keys
    pub amenities: Fact<HashSet<String>>,
    pub occupancy: Fact<OccupancyRule>,
    /// Lower-case city → typical nightly rate (min, max)
    pub city_rates: Fact<HashMap<String, (f64, f64)>>,
}

impl Default for FactDatabase {
    fn default() -> Self {
        Self::curated()
    }
}

impl FactDatabase {
    /// Built-in curated dataset
    pub fn curated() -> Self {
        let seasons = [
            (Season::Spring, vec![3, 4, 5], 0.9, 1.3),
            (Season::Summer, vec![6, 7, 8], 1.2, 1.8),
            (Season::Autumn, vec![9, 10, 11], 0.8, 1.2),
            (Season::Winter, vec![12, 1, 2], 0.7, 1.3),
        ]
        .into_iter()
        .map(|(season, months, min_multiplier, max_multiplier)| {
            (
                season,
                SeasonProfile {
                    months,
                    min_multiplier,
                    max_multiplier,
                },
            )
        })
        .collect();

        let city_rates = [
            ("paris", 80.0, 800.0),
            ("london", 90.0, 900.0),
            ("new york", 100.0, 1000.0),
            ("barcelona", 60.0, 600.0),
            ("lisbon", 50.0, 500.0),
            ("tokyo", 70.0, 700.0),
            ("sydney", 80.0, 700.0),
            ("miami", 90.0, 900.0),
        ]
        .into_iter()
        .map(|(city, min, max)| (city.to_string(), (min, max)))
        .collect();

        Self {
            price_bounds: Fact::new((10.0, 50_000.0), "market_survey", 0.9),
            property_types: Fact::new(
                PROPERTY_TYPES.iter().map(|s| s.to_string()).collect(),
                "listing_taxonomy",
                0.95,
            ),
            cities: Fact::new(
                CITIES
                    .iter()
                    .map(|(city, code)| (city.to_string(), code.to_string()))
                    .collect(),
                "geo_reference",
                0.95,
            ),
            seasons: Fact::new(seasons, "tourism_calendar", 0.85),
            amenities: Fact::new(
                AMENITIES.iter().map(|s| s.to_string()).collect(),
                "amenity_catalogue",
                0.9,
            ),
            occupancy: Fact::new(
                OccupancyRule {
                    per_bedroom: 2.0,
                    base: 2.0,
                },
                "occupancy_regulations",
                0.85,
            ),
            city_rates: Fact::new(city_rates, "market_rates", 0.8),
        }
    }

    pub fn is_known_property_type(&self, raw: &str) -> bool {
        self.property_types.value.contains(&raw.trim().to_ascii_lowercase())
    }

    /// Country code a known city belongs to
    pub fn city_country(&self, city: &str) -> Option<&str> {
        self.cities
            .value
            .get(&city.trim().to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_known_amenity(&self, raw: &str) -> bool {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        self.amenities.value.contains(&key)
    }

    pub fn season_profile(&self, season: Season) -> Option<&SeasonProfile> {
        self.seasons.value.get(&season)
    }

    pub fn city_rate(&self, city: &str) -> Option<(f64, f64)> {
        self.city_rates.value.get(&city.trim().to_ascii_lowercase()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_lookup_by_code_name_alias() {
        assert_eq!(country_record("fr").unwrap().currency, "EUR");
        assert_eq!(country_record("United Kingdom").unwrap().code, "GB");
        assert_eq!(country_record("usa").unwrap().code, "US");
        assert!(country_record("Atlantis").is_none());
    }

    #[test]
    fn test_bounds_and_hemisphere() {
        let fr = country_record("FR").unwrap();
        assert!(fr.contains(48.85, 2.35));
        assert!(!fr.contains(40.71, -74.0));
        assert!(country_record("AU").unwrap().is_southern());
        assert!(!country_record("BR").unwrap().is_southern());
    }

    #[test]
    fn test_season_months_match_profiles() {
        let db = FactDatabase::curated();
        for month in 1..=12 {
            let season = season_for_month(month);
            assert!(db.season_profile(season).unwrap().months.contains(&month));
        }
    }

    #[test]
    fn test_lookups_are_case_insensitive() {
        let db = FactDatabase::curated();
        assert!(db.is_known_property_type("Villa"));
        assert_eq!(db.city_country("Paris"), Some("FR"));
        assert!(db.is_known_amenity("Hot Tub"));
        assert!(db.is_known_amenity("petFriendly"));
        assert!(!db.is_known_amenity("helipad"));
        assert_eq!(db.occupancy.value.limit(2.0), 6.0);
    }
}
