use indexmap::IndexMap;
use serde::Serialize;

use crate::config::{PRICE_CEILING, price_column, years};
use crate::domain::{AreaBin, Borough, Mean, OutwardCode, PropertyType, round_price};
use crate::error::AtlasError;
use crate::table::{Row, Table};

pub const PRICE_KEY_COLUMNS: [&str; 4] = ["outward", "borough", "area_bin", "propertytype"];

/// year -> area bin -> property type -> price
pub type PriceGrid = IndexMap<String, IndexMap<String, IndexMap<String, i64>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceEntry {
    pub prices: PriceGrid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostcodePrices {
    pub postcodes: IndexMap<String, PriceEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoroughPrices {
    pub boroughs: IndexMap<String, PriceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRecord {
    pub outward: String,
    pub year: i32,
    pub propertytype: String,
    pub area_bin: String,
    pub price: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct PriceRow {
    pub outward: OutwardCode,
    pub borough: Borough,
    pub area_bin: AreaBin,
    pub property_type: PropertyType,
    pub values: Vec<(i32, Option<f64>)>,
}

#[derive(Debug, Clone)]
pub struct PriceColumns {
    outward: usize,
    borough: usize,
    area_bin: usize,
    property_type: usize,
    years: Vec<(i32, usize)>,
}

impl PriceColumns {
    pub fn resolve(table: &Table) -> Result<Self, AtlasError> {
        let keys = table.require_columns(&PRICE_KEY_COLUMNS)?;
        let year_names = years().map(price_column).collect::<Vec<_>>();
        let year_refs = year_names.iter().map(String::as_str).collect::<Vec<_>>();
        let year_columns = table.require_columns(&year_refs)?;
        Ok(Self {
            outward: keys[0],
            borough: keys[1],
            area_bin: keys[2],
            property_type: keys[3],
            years: years().zip(year_columns).collect(),
        })
    }
}

impl PriceRow {
    pub fn read(row: &Row<'_>, columns: &PriceColumns) -> Result<Option<Self>, AtlasError> {
        let outward = OutwardCode::new(&row.text(columns.outward));
        if outward.is_empty() {
            return Ok(None);
        }
        let values = columns
            .years
            .iter()
            .map(|(year, column)| Ok((*year, row.number_at(*column)?)))
            .collect::<Result<Vec<_>, AtlasError>>()?;
        Ok(Some(Self {
            outward,
            borough: Borough::new(&row.text(columns.borough)),
            area_bin: AreaBin::new(&row.text(columns.area_bin)),
            property_type: PropertyType::normalize(&row.text(columns.property_type)),
            values,
        }))
    }
}

pub fn valid_price(value: Option<f64>, ceiling: i64) -> Option<i64> {
    let price = round_price(value?);
    (price <= ceiling).then_some(price)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceTables {
    pub postcodes: PostcodePrices,
    pub boroughs: BoroughPrices,
    pub records: Vec<FlatRecord>,
}

/// Two-phase reduction: `add` every row, then `finish` once.
///
/// Postcode cells are last-write-wins, so they depend on row order. Borough
/// cells are summed and averaged in `finish`, so they do not.
#[derive(Debug)]
pub struct PriceAggregator {
    ceiling: i64,
    postcodes: IndexMap<String, PriceEntry>,
    borough_sums: IndexMap<String, IndexMap<String, IndexMap<String, IndexMap<String, Mean>>>>,
    records: Vec<FlatRecord>,
}

impl Default for PriceAggregator {
    fn default() -> Self {
        Self::with_ceiling(PRICE_CEILING)
    }
}

impl PriceAggregator {
    pub fn with_ceiling(ceiling: i64) -> Self {
        Self {
            ceiling,
            postcodes: IndexMap::new(),
            borough_sums: IndexMap::new(),
            records: Vec::new(),
        }
    }

    pub fn add(&mut self, row: &PriceRow) {
        let property_type = row.property_type.as_str();
        let area_bin = row.area_bin.as_str();
        let entry = self.postcodes.entry(row.outward.key()).or_default();

        for (year, value) in &row.values {
            let price = valid_price(*value, self.ceiling);
            self.records.push(FlatRecord {
                outward: row.outward.as_str().to_string(),
                year: *year,
                propertytype: property_type.to_string(),
                area_bin: area_bin.to_string(),
                price,
            });

            let Some(price) = price else {
                continue;
            };

            let year_key = year.to_string();
            entry
                .prices
                .entry(year_key.clone())
                .or_default()
                .entry(area_bin.to_string())
                .or_default()
                .insert(property_type.to_string(), price);

            if !row.borough.is_empty() {
                self.borough_sums
                    .entry(row.borough.as_str().to_string())
                    .or_default()
                    .entry(year_key)
                    .or_default()
                    .entry(area_bin.to_string())
                    .or_default()
                    .entry(property_type.to_string())
                    .or_default()
                    .push(price as f64);
            }
        }
    }

    pub fn finish(self) -> PriceTables {
        let mut boroughs = IndexMap::new();
        for (borough, year_map) in self.borough_sums {
            let mut entry = PriceEntry::default();
            for (year_key, size_map) in year_map {
                let sizes = entry.prices.entry(year_key).or_default();
                for (size_key, type_map) in size_map {
                    let types = sizes.entry(size_key).or_default();
                    for (property_type, mean) in type_map {
                        if let Some(value) = mean.value() {
                            types.insert(property_type, round_price(value));
                        }
                    }
                }
            }
            boroughs.insert(borough, entry);
        }

        PriceTables {
            postcodes: PostcodePrices {
                postcodes: self.postcodes,
            },
            boroughs: BoroughPrices { boroughs },
            records: self.records,
        }
    }
}

pub fn aggregate_prices(table: &Table) -> Result<PriceTables, AtlasError> {
    let columns = PriceColumns::resolve(table)?;
    let mut aggregator = PriceAggregator::default();
    let mut skipped = 0usize;
    for row in table.rows() {
        match PriceRow::read(&row, &columns)? {
            Some(price_row) => aggregator.add(&price_row),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "price rows without an outward code were skipped");
    }
    Ok(aggregator.finish())
}
