use indexmap::IndexMap;
use serde::Serialize;

use crate::domain::{Borough, Mean, OutwardCode};
use crate::error::AtlasError;
use crate::table::{Row, Table};

pub const METRIC_COLUMNS: [&str; 6] = [
    "borough",
    "postcode",
    "year",
    "crime_lagged_1yr",
    "central",
    "culture",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub borough: Borough,
    pub outward: OutwardCode,
    pub year: Option<i64>,
    pub crime: Option<f64>,
    pub central: Option<f64>,
    pub culture: Option<f64>,
}

impl MetricRow {
    pub fn read(row: &Row<'_>, columns: &[usize]) -> Result<Self, AtlasError> {
        Ok(Self {
            borough: Borough::new(&row.text(columns[0])),
            outward: OutwardCode::from_postcode(&row.text(columns[1])),
            year: row.number_at(columns[2])?.map(|year| year.trunc() as i64),
            crime: row.number_at(columns[3])?,
            central: row.number_at(columns[4])?,
            culture: row.number_at(columns[5])?,
        })
    }

    fn year_key(&self) -> Option<String> {
        self.year.filter(|year| *year != 0).map(|year| year.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crime: Option<IndexMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub central: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culture: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsTables {
    pub boroughs: IndexMap<String, EntityMetrics>,
    pub postcodes: IndexMap<String, EntityMetrics>,
}

#[derive(Debug, Default)]
struct Accumulators {
    crime: IndexMap<String, IndexMap<String, Mean>>,
    central: IndexMap<String, Mean>,
    culture: IndexMap<String, Mean>,
}

impl Accumulators {
    fn add(&mut self, key: &str, year_key: Option<&str>, row: &MetricRow) {
        if key.is_empty() {
            return;
        }
        if let (Some(year_key), Some(crime)) = (year_key, row.crime) {
            self.crime
                .entry(key.to_string())
                .or_default()
                .entry(year_key.to_string())
                .or_default()
                .push(crime);
        }
        if let Some(central) = row.central {
            self.central.entry(key.to_string()).or_default().push(central);
        }
        if let Some(culture) = row.culture {
            self.culture.entry(key.to_string()).or_default().push(culture);
        }
    }

    /// Crime entities come first, then those only seen for central, then
    /// those only seen for culture.
    fn finish(self) -> IndexMap<String, EntityMetrics> {
        let mut out: IndexMap<String, EntityMetrics> = IndexMap::new();
        for (key, year_map) in self.crime {
            let series = year_map
                .into_iter()
                .filter_map(|(year, mean)| mean.value().map(|value| (year, value)))
                .collect();
            out.entry(key).or_default().crime = Some(series);
        }
        for (key, mean) in self.central {
            if let Some(value) = mean.value() {
                out.entry(key).or_default().central = Some(value);
            }
        }
        for (key, mean) in self.culture {
            if let Some(value) = mean.value() {
                out.entry(key).or_default().culture = Some(value);
            }
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct MetricsAggregator {
    boroughs: Accumulators,
    postcodes: Accumulators,
}

impl MetricsAggregator {
    pub fn add(&mut self, row: &MetricRow) {
        let year_key = row.year_key();
        self.boroughs
            .add(row.borough.as_str(), year_key.as_deref(), row);
        self.postcodes
            .add(&row.outward.key(), year_key.as_deref(), row);
    }

    pub fn finish(self) -> MetricsTables {
        MetricsTables {
            boroughs: self.boroughs.finish(),
            postcodes: self.postcodes.finish(),
        }
    }
}

pub fn aggregate_metrics(table: &Table) -> Result<MetricsTables, AtlasError> {
    let columns = table.require_columns(&METRIC_COLUMNS)?;
    let mut aggregator = MetricsAggregator::default();
    for row in table.rows() {
        aggregator.add(&MetricRow::read(&row, &columns)?);
    }
    Ok(aggregator.finish())
}
