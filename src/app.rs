use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::boundary::{BoundaryClient, FeatureCollection, extract_features};
use crate::config::{AggregateSettings, BoundarySettings};
use crate::error::AtlasError;
use crate::metrics::aggregate_metrics;
use crate::output::write_json_file;
use crate::prices::aggregate_prices;
use crate::table::Table;

pub const SAMPLE_NAME_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct AreaOutcome {
    pub area: String,
    pub url: String,
    pub features: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundaryResult {
    pub generated_at: DateTime<Utc>,
    pub output: String,
    pub total_features: usize,
    pub areas: Vec<AreaOutcome>,
    pub sample_names: Vec<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub generated_at: DateTime<Utc>,
    pub postcodes: usize,
    pub boroughs: usize,
    pub records: usize,
    pub metric_boroughs: usize,
    pub metric_postcodes: usize,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<B: BoundaryClient> {
    boundary: B,
}

impl<B: BoundaryClient> App<B> {
    pub fn new(boundary: B) -> Self {
        Self { boundary }
    }

    pub fn fetch_boundaries(
        &self,
        settings: &BoundarySettings,
        sink: &dyn ProgressSink,
    ) -> Result<BoundaryResult, AtlasError> {
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {} areas", settings.areas.len()),
            elapsed: None,
        });

        let mut features = Vec::new();
        let mut areas = Vec::with_capacity(settings.areas.len());
        for area in &settings.areas {
            let url = settings.area_url(area);
            sink.event(ProgressEvent {
                message: format!("boundary.request area={area} url={url}"),
                elapsed: None,
            });
            let start = Instant::now();
            let outcome = self
                .boundary
                .fetch_document(&url)
                .and_then(|document| extract_features(area, document));
            let elapsed = start.elapsed();

            match outcome {
                Ok(found) => {
                    tracing::info!(area = %area, features = found.len(), "fetched boundaries");
                    sink.event(ProgressEvent {
                        message: format!("boundary.response area={area} features={}", found.len()),
                        elapsed: Some(elapsed),
                    });
                    areas.push(AreaOutcome {
                        area: area.clone(),
                        url,
                        features: found.len(),
                        error: None,
                    });
                    features.extend(found);
                }
                Err(err) => {
                    tracing::warn!(area = %area, error = %err, "skipping area");
                    sink.event(ProgressEvent {
                        message: format!("boundary.skip area={area} reason={err}"),
                        elapsed: Some(elapsed),
                    });
                    areas.push(AreaOutcome {
                        area: area.clone(),
                        url,
                        features: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let collection = FeatureCollection::new(features);
        sink.event(ProgressEvent {
            message: format!("phase=Store; writing {}", settings.output),
            elapsed: None,
        });
        write_json_file(&settings.output, &collection)?;

        Ok(BoundaryResult {
            generated_at: Utc::now(),
            output: settings.output.to_string(),
            total_features: collection.features.len(),
            areas,
            sample_names: collection.feature_names(SAMPLE_NAME_COUNT),
        })
    }

    pub fn aggregate(
        &self,
        settings: &AggregateSettings,
        sink: &dyn ProgressSink,
    ) -> Result<AggregateResult, AtlasError> {
        sink.event(ProgressEvent {
            message: format!("phase=Load; {}", settings.prices_input),
            elapsed: None,
        });
        let price_table = Table::load(&settings.prices_input)?;
        sink.event(ProgressEvent {
            message: format!("phase=Load; {}", settings.metrics_input),
            elapsed: None,
        });
        let metrics_table = Table::load(&settings.metrics_input)?;

        sink.event(ProgressEvent {
            message: format!("phase=Aggregate; {} price rows", price_table.len()),
            elapsed: None,
        });
        let start = Instant::now();
        let prices = aggregate_prices(&price_table)?;
        sink.event(ProgressEvent {
            message: format!("phase=Aggregate; {} metric rows", metrics_table.len()),
            elapsed: Some(start.elapsed()),
        });
        let metrics = aggregate_metrics(&metrics_table)?;

        sink.event(ProgressEvent {
            message: "phase=Store; writing outputs".to_string(),
            elapsed: Some(start.elapsed()),
        });
        write_json_file(&settings.postcode_prices_output, &prices.postcodes)?;
        write_json_file(&settings.borough_prices_output, &prices.boroughs)?;
        write_json_file(&settings.records_output, &prices.records)?;
        write_json_file(&settings.metrics_output, &metrics)?;

        tracing::info!(
            postcodes = prices.postcodes.postcodes.len(),
            boroughs = prices.boroughs.boroughs.len(),
            "aggregation complete"
        );

        Ok(AggregateResult {
            generated_at: Utc::now(),
            postcodes: prices.postcodes.postcodes.len(),
            boroughs: prices.boroughs.boroughs.len(),
            records: prices.records.len(),
            metric_boroughs: metrics.boroughs.len(),
            metric_postcodes: metrics.postcodes.len(),
            outputs: settings
                .outputs()
                .iter()
                .map(|path| path.to_string())
                .collect(),
        })
    }
}
