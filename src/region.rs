// 🌍 Region Lookup - country → continent
//
// The region file maps continent name → list of countries:
//
//   { "Asia": ["China", "India", ...], "Europe": ["Germany", ...], ... }
//
// It is inverted on load so the transformer can look countries up directly.

use crate::error::{EtlError, EtlResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Region assigned to any country missing from the region file
pub const UNMAPPED_REGION: &str = "Other";

#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    country_to_region: HashMap<String, String>,
}

impl RegionMap {
    /// Load and invert the region file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EtlResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::RegionData(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> EtlResult<Self> {
        let by_region: BTreeMap<String, Vec<String>> = serde_json::from_str(content)
            .map_err(|e| EtlError::RegionData(format!("invalid region JSON: {}", e)))?;

        Ok(Self::from_regions(by_region))
    }

    /// Invert a continent → countries mapping.
    ///
    /// A country listed under several continents keeps the first one in
    /// continent-name order.
    pub fn from_regions(by_region: BTreeMap<String, Vec<String>>) -> Self {
        let mut country_to_region = HashMap::new();

        for (region, countries) in by_region {
            for country in countries {
                let country = country.trim().to_string();
                if let Some(existing) = country_to_region.get(&country) {
                    tracing::warn!(
                        "{} is listed under both {} and {}; keeping {}",
                        country,
                        existing,
                        region,
                        existing
                    );
                    continue;
                }
                country_to_region.insert(country, region.clone());
            }
        }

        RegionMap { country_to_region }
    }

    /// Region for a country, or `"Other"` if unmapped
    pub fn region_for(&self, country: &str) -> &str {
        self.country_to_region
            .get(country)
            .map(String::as_str)
            .unwrap_or(UNMAPPED_REGION)
    }

    pub fn country_count(&self) -> usize {
        self.country_to_region.len()
    }
}
