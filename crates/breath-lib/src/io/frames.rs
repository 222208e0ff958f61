//! Frame recordings as CSV: `timestamp,intensity[,region_found]`.

use crate::signal::FrameObservation;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::io::{Read, Write};
use std::path::Path;

pub fn read_frames_csv(path: &Path) -> Result<Vec<FrameObservation>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_frames(file).with_context(|| format!("parsing frames from {}", path.display()))
}

/// Parse frames from any reader. Rows without a face region, or with an empty
/// intensity, become frames without a sample.
pub fn parse_frames<R: Read>(reader: R) -> Result<Vec<FrameObservation>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);
    let headers = reader.headers().context("reading header")?.clone();
    let ts_idx = locate_column(&headers, "timestamp")?;
    let intensity_idx = locate_column(&headers, "intensity")?;
    let found_idx = headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case("region_found"));

    let mut frames = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading row {}", row + 1))?;
        let timestamp = record
            .get(ts_idx)
            .unwrap_or_default()
            .parse::<f64>()
            .with_context(|| format!("row {}: parsing timestamp", row + 1))?;
        let region_found = match found_idx.and_then(|idx| record.get(idx)) {
            Some(value) => parse_flag(value)
                .with_context(|| format!("row {}: parsing region_found", row + 1))?,
            None => true,
        };
        let raw = record.get(intensity_idx).unwrap_or_default();
        let intensity = if raw.is_empty() {
            None
        } else {
            Some(
                raw.parse::<f64>()
                    .with_context(|| format!("row {}: parsing intensity", row + 1))?,
            )
        };
        frames.push(FrameObservation {
            timestamp,
            region_found: region_found && intensity.is_some(),
            intensity,
        });
    }
    Ok(frames)
}

pub fn write_frames_csv<W: Write>(writer: W, frames: &[FrameObservation]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(["timestamp", "intensity", "region_found"])?;
    for frame in frames {
        writer.write_record(&[
            frame.timestamp.to_string(),
            frame
                .intensity
                .filter(|_| frame.region_found)
                .map(|v| v.to_string())
                .unwrap_or_default(),
            frame.region_found.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" | "" => Ok(false),
        other => anyhow::bail!("not a boolean: {}", other),
    }
}

fn locate_column(headers: &StringRecord, requested: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing {} column", requested))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_optional_region_column() {
        let text = "timestamp,intensity,region_found\n0.0,101.5,true\n0.033,,false\n0.066,102.0,1\n";
        let frames = parse_frames(text.as_bytes()).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].sample().is_some());
        assert!(frames[1].sample().is_none());
        assert_eq!(frames[2].intensity, Some(102.0));
    }

    #[test]
    fn region_column_defaults_to_found() {
        let text = "Timestamp, Intensity\n1.0, 3.5\n2.0, 4.5\n";
        let frames = parse_frames(text.as_bytes()).unwrap();
        assert!(frames.iter().all(|f| f.region_found));
    }

    #[test]
    fn missing_intensity_column_is_an_error() {
        let err = parse_frames("timestamp,value\n0,1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("intensity"));
    }

    #[test]
    fn written_file_reads_back() {
        let frames = vec![
            FrameObservation::found(0.0, 98.25),
            FrameObservation::missing(0.5),
            FrameObservation::found(1.0, 99.0),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.csv");
        write_frames_csv(std::fs::File::create(&path).unwrap(), &frames).unwrap();
        assert_eq!(read_frames_csv(&path).unwrap(), frames);
    }
}
