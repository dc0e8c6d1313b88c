use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::app::{AggregateResult, BoundaryResult, ProgressEvent, ProgressSink};
use crate::error::AtlasError;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub fn write_json_file<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), AtlasError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| AtlasError::Filesystem(format!("create {parent}: {err}")))?;
    }
    let json = serde_json::to_vec_pretty(value)
        .map_err(|err| AtlasError::Serialize(format!("{path}: {err}")))?;
    fs::write(path.as_std_path(), json)
        .map_err(|err| AtlasError::Filesystem(format!("write {path}: {err}")))?;
    tracing::debug!(path = %path, "wrote output");
    Ok(())
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_boundaries(result: &BoundaryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_aggregate(result: &AggregateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_boundaries(result: &BoundaryResult) {
        println!(
            "Finished. Saved {} polygons to {}",
            result.total_features, result.output
        );
        let names = result
            .sample_names
            .iter()
            .map(|name| name.as_deref().unwrap_or("?"))
            .collect::<Vec<_>>();
        println!("First {} feature names: {:?}", names.len(), names);
    }

    pub fn print_aggregate(result: &AggregateResult) {
        println!(
            "Processed {} postcodes and {} boroughs.",
            result.postcodes, result.boroughs
        );
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        eprintln!("{}", format_event(&event));
    }
}

fn format_event(event: &ProgressEvent) -> String {
    match event.elapsed {
        Some(elapsed) => format!("{} ({elapsed:?})", event.message),
        None => event.message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn console_events_show_elapsed_time() {
        let timed = ProgressEvent {
            message: "boundary.response area=E features=3".to_string(),
            elapsed: Some(Duration::from_millis(250)),
        };
        assert_eq!(
            format_event(&timed),
            "boundary.response area=E features=3 (250ms)"
        );

        let untimed = ProgressEvent {
            message: "phase=Fetch; 19 areas".to_string(),
            elapsed: None,
        };
        assert_eq!(format_event(&untimed), "phase=Fetch; 19 areas");
    }

    #[test]
    fn json_file_creates_parent_directories() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(temp.path())
            .unwrap()
            .join("site/data/out.json");
        write_json_file(&path, &serde_json::json!({"a": 1})).unwrap();
        let written = fs::read_to_string(path.as_std_path()).unwrap();
        assert_eq!(written, "{\n  \"a\": 1\n}");
    }
}
