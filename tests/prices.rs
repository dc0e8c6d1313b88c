use assert_matches::assert_matches;
use serde_json::json;

use london_property_atlas::error::AtlasError;
use london_property_atlas::prices::aggregate_prices;
use london_property_atlas::table::Table;

const HEADER: &str = "outward,borough,area_bin,propertytype,2015_price,2016_price,2017_price,\
2018_price,2019_price,2020_price,2021_price,2022_price,2023_price,2024_price,2025_price,2026_price";

fn price_table(rows: &[&str]) -> Table {
    let mut csv = HEADER.to_string();
    for row in rows {
        csv.push('\n');
        csv.push_str(row);
    }
    Table::from_csv_reader("prices.csv", csv.as_bytes()).unwrap()
}

#[test]
fn single_row_end_to_end() {
    let table = price_table(&["sw1a,Westminster,small,F,500000,,,,,,,,,,,"]);
    let tables = aggregate_prices(&table).unwrap();

    assert_eq!(
        serde_json::to_value(&tables.postcodes).unwrap(),
        json!({"postcodes": {"sw1a": {"prices": {"2015": {"SMALL": {"flat": 500000}}}}}})
    );
    assert_eq!(
        serde_json::to_value(&tables.boroughs).unwrap(),
        json!({"boroughs": {"westminster": {"prices": {"2015": {"SMALL": {"flat": 500000}}}}}})
    );

    assert_eq!(tables.records.len(), 12);
    let years = tables.records.iter().map(|r| r.year).collect::<Vec<_>>();
    assert_eq!(years, (2015..=2026).collect::<Vec<_>>());
    assert_eq!(tables.records[0].price, Some(500000));
    assert!(tables.records[1..].iter().all(|r| r.price.is_none()));
    assert_eq!(
        serde_json::to_value(&tables.records[0]).unwrap(),
        json!({
            "outward": "SW1A",
            "year": 2015,
            "propertytype": "flat",
            "area_bin": "SMALL",
            "price": 500000
        })
    );
}

#[test]
fn postcode_cell_keeps_last_row_and_borough_cell_averages() {
    let table = price_table(&[
        "E8,Hackney,Q1,T,400000,,,,,,,,,,,",
        "e8,hackney,q1,t,500001,,,,,,,,,,,",
        "E9,Hackney,Q1,T,300000,,,,,,,,,,,",
    ]);
    let tables = aggregate_prices(&table).unwrap();

    assert_eq!(
        tables.postcodes.postcodes["e8"].prices["2015"]["Q1"]["terraced"],
        500001
    );
    // (400000 + 500001 + 300000) / 3 = 400000.33..
    assert_eq!(
        tables.boroughs.boroughs["hackney"].prices["2015"]["Q1"]["terraced"],
        400000
    );
}

#[test]
fn borough_mean_rounds_half_to_even() {
    let table = price_table(&[
        "E8,Hackney,Q1,T,1,,,,,,,,,,,",
        "E8,Hackney,Q1,T,2,,,,,,,,,,,",
    ]);
    let tables = aggregate_prices(&table).unwrap();
    assert_eq!(
        tables.boroughs.boroughs["hackney"].prices["2015"]["Q1"]["terraced"],
        2
    );
}

#[test]
fn price_over_ceiling_is_null_everywhere() {
    let table = price_table(&["W1,Westminster,Q2,D,2500000.6,,,,,,,,,,,"]);
    let tables = aggregate_prices(&table).unwrap();

    assert!(tables.postcodes.postcodes["w1"].prices.is_empty());
    assert!(tables.boroughs.boroughs.is_empty());
    assert_eq!(tables.records[0].price, None);
}

#[test]
fn price_at_ceiling_is_kept() {
    let table = price_table(&["W1,Westminster,Q2,D,2500000,,,,,,,,,,,"]);
    let tables = aggregate_prices(&table).unwrap();
    assert_eq!(tables.records[0].price, Some(2_500_000));
}

#[test]
fn borough_without_valid_prices_is_absent() {
    let table = price_table(&[
        "N1,Islington,Q1,F,,,,,,,,,,,,",
        "N7,Islington,Q1,F,NaN,,,,,,,,,,,",
        "E8,Hackney,Q1,F,350000,,,,,,,,,,,",
    ]);
    let tables = aggregate_prices(&table).unwrap();

    assert!(!tables.boroughs.boroughs.contains_key("islington"));
    assert!(tables.boroughs.boroughs.contains_key("hackney"));
    // postcode entries exist even with nothing to show
    assert!(tables.postcodes.postcodes["n1"].prices.is_empty());
    assert_eq!(tables.records.len(), 36);
}

#[test]
fn rows_without_outward_are_skipped_entirely() {
    let table = price_table(&[" ,Camden,Q1,F,not-a-price,,,,,,,,,,,"]);
    let tables = aggregate_prices(&table).unwrap();
    assert!(tables.postcodes.postcodes.is_empty());
    assert!(tables.records.is_empty());
}

#[test]
fn rows_without_borough_still_fill_postcodes() {
    let table = price_table(&["NW1,,Q3,Bungalow,610000,,,,,,,,,,,"]);
    let tables = aggregate_prices(&table).unwrap();
    assert_eq!(
        tables.postcodes.postcodes["nw1"].prices["2015"]["Q3"]["bungalow"],
        610000
    );
    assert!(tables.boroughs.boroughs.is_empty());
}

#[test]
fn keys_follow_first_occurrence() {
    let table = price_table(&[
        "W1,Westminster,Q1,F,,500000,,,,,,,,,,",
        "E8,Hackney,Q1,F,400000,,,,,,,,,,,",
        "W1,Westminster,Q1,F,450000,,,,,,,,,,,",
    ]);
    let tables = aggregate_prices(&table).unwrap();
    let postcodes = tables.postcodes.postcodes.keys().cloned().collect::<Vec<_>>();
    assert_eq!(postcodes, vec!["w1", "e8"]);
    let years = tables.postcodes.postcodes["w1"]
        .prices
        .keys()
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(years, vec!["2016", "2015"]);
}

#[test]
fn missing_year_column_fails_before_aggregation() {
    let csv = "outward,borough,area_bin,propertytype,2015_price\nE8,Hackney,Q1,F,1";
    let table = Table::from_csv_reader("prices.csv", csv.as_bytes()).unwrap();
    let err = aggregate_prices(&table).unwrap_err();
    assert_matches!(err, AtlasError::MissingColumn { column, .. } if column == "2016_price");
}

#[test]
fn unreadable_price_halts_with_row_number() {
    let table = price_table(&[
        "E8,Hackney,Q1,F,350000,,,,,,,,,,,",
        "E9,Hackney,Q1,F,£400k,,,,,,,,,,,",
    ]);
    let err = aggregate_prices(&table).unwrap_err();
    assert_matches!(
        err,
        AtlasError::CellType { row: 3, column, .. } if column == "2015_price"
    );
}
