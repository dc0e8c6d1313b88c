use std::fs;
use std::ops::RangeInclusive;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::AtlasError;

pub const DEFAULT_CONFIG_FILE: &str = "lpa.json";

pub const LONDON_AREAS: [&str; 19] = [
    "E", "EC", "N", "NW", "SE", "SW", "W", "WC", "IG", "RM", "DA", "BR", "CR", "SM", "KT", "TW",
    "UB", "HA", "EN",
];

pub const BOUNDARY_URL_TEMPLATE: &str =
    "https://raw.githubusercontent.com/missinglink/uk-postcode-polygons/master/geojson/{area}.geojson";

pub const AREA_PLACEHOLDER: &str = "{area}";

pub const FIRST_YEAR: i32 = 2015;
pub const LAST_YEAR: i32 = 2026;

/// Rounded prices above this are treated as bad data and dropped, never clipped.
pub const PRICE_CEILING: i64 = 2_500_000;

pub const BOUNDARIES_OUTPUT: &str = "london_postcodes.geojson";
pub const PRICES_INPUT: &str = "WebsiteDataTable.xlsx";
pub const METRICS_INPUT: &str = "Master_v2.xlsx";
pub const POSTCODE_PRICES_OUTPUT: &str = "london_postcode_prices.json";
pub const BOROUGH_PRICES_OUTPUT: &str = "london_borough_prices.json";
pub const RECORDS_OUTPUT: &str = "london_data_records.json";
pub const METRICS_OUTPUT: &str = "london_metrics.json";

pub fn years() -> RangeInclusive<i32> {
    FIRST_YEAR..=LAST_YEAR
}

pub fn price_column(year: i32) -> String {
    format!("{year}_price")
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub boundaries: Option<BoundarySection>,
    #[serde(default)]
    pub aggregate: Option<AggregateSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BoundarySection {
    #[serde(default)]
    pub areas: Option<Vec<String>>,
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub insecure: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AggregateSection {
    #[serde(default)]
    pub prices: Option<String>,
    #[serde(default)]
    pub metrics: Option<String>,
    #[serde(default)]
    pub out_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundarySettings {
    pub areas: Vec<String>,
    pub url_template: String,
    pub output: Utf8PathBuf,
    pub insecure: bool,
}

impl BoundarySettings {
    pub fn area_url(&self, area: &str) -> String {
        self.url_template.replace(AREA_PLACEHOLDER, area)
    }
}

impl Default for BoundarySettings {
    fn default() -> Self {
        Self {
            areas: LONDON_AREAS.iter().map(|area| area.to_string()).collect(),
            url_template: BOUNDARY_URL_TEMPLATE.to_string(),
            output: Utf8PathBuf::from(BOUNDARIES_OUTPUT),
            insecure: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSettings {
    pub prices_input: Utf8PathBuf,
    pub metrics_input: Utf8PathBuf,
    pub postcode_prices_output: Utf8PathBuf,
    pub borough_prices_output: Utf8PathBuf,
    pub records_output: Utf8PathBuf,
    pub metrics_output: Utf8PathBuf,
}

impl AggregateSettings {
    pub fn with_out_dir(out_dir: &Utf8Path) -> Self {
        Self {
            prices_input: Utf8PathBuf::from(PRICES_INPUT),
            metrics_input: Utf8PathBuf::from(METRICS_INPUT),
            postcode_prices_output: out_dir.join(POSTCODE_PRICES_OUTPUT),
            borough_prices_output: out_dir.join(BOROUGH_PRICES_OUTPUT),
            records_output: out_dir.join(RECORDS_OUTPUT),
            metrics_output: out_dir.join(METRICS_OUTPUT),
        }
    }

    pub fn outputs(&self) -> [&Utf8Path; 4] {
        [
            &self.postcode_prices_output,
            &self.borough_prices_output,
            &self.records_output,
            &self.metrics_output,
        ]
    }
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self::with_out_dir(Utf8Path::new(""))
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub boundaries: BoundarySettings,
    pub aggregate: AggregateSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, AtlasError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| AtlasError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| AtlasError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, AtlasError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let mut boundaries = BoundarySettings::default();
        if let Some(section) = config.boundaries {
            if let Some(areas) = section.areas {
                boundaries.areas = areas
                    .iter()
                    .map(|area| area.trim().to_uppercase())
                    .filter(|area| !area.is_empty())
                    .collect();
            }
            if let Some(template) = section.url_template {
                if !template.contains(AREA_PLACEHOLDER) {
                    return Err(AtlasError::ConfigParse(format!(
                        "url_template must contain {AREA_PLACEHOLDER}: {template}"
                    )));
                }
                boundaries.url_template = template;
            }
            if let Some(output) = section.output {
                boundaries.output = Utf8PathBuf::from(output);
            }
            boundaries.insecure = section.insecure.unwrap_or(false);
        }

        let mut aggregate = match config
            .aggregate
            .as_ref()
            .and_then(|section| section.out_dir.as_deref())
        {
            Some(dir) => AggregateSettings::with_out_dir(Utf8Path::new(dir)),
            None => AggregateSettings::default(),
        };
        if let Some(section) = config.aggregate {
            if let Some(prices) = section.prices {
                aggregate.prices_input = Utf8PathBuf::from(prices);
            }
            if let Some(metrics) = section.metrics {
                aggregate.metrics_input = Utf8PathBuf::from(metrics);
            }
        }

        Ok(ResolvedConfig {
            schema_version,
            boundaries,
            aggregate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.boundaries.areas.len(), 19);
        assert_eq!(resolved.boundaries.areas[0], "E");
        assert!(!resolved.boundaries.insecure);
        assert_eq!(resolved.aggregate.prices_input.as_str(), PRICES_INPUT);
        assert_eq!(
            resolved.aggregate.metrics_output.as_str(),
            "london_metrics.json"
        );
    }

    #[test]
    fn area_url_substitutes_placeholder() {
        let settings = BoundarySettings::default();
        assert_eq!(
            settings.area_url("SW"),
            "https://raw.githubusercontent.com/missinglink/uk-postcode-polygons/master/geojson/SW.geojson"
        );
    }

    #[test]
    fn years_cover_twelve_price_columns() {
        let columns = years().map(price_column).collect::<Vec<_>>();
        assert_eq!(columns.len(), 12);
        assert_eq!(columns[0], "2015_price");
        assert_eq!(columns[11], "2026_price");
    }
}
