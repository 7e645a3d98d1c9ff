use anyhow::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use pointsort::{Detection, Forecast, TrackReport};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// One row of the input file.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DetectionRecord {
    pub frame: u32,
    pub x: f32,
    pub y: f32,
}

/// One row of the tracking output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackRecord {
    pub frame: u32,
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TrackRecord {
    pub fn new(frame: u32, report: &TrackReport) -> TrackRecord {
        TrackRecord {
            frame,
            id: report.id,
            x: report.position.x(),
            y: report.position.y(),
            r: report.color.r,
            g: report.color.g,
            b: report.color.b,
        }
    }
}

/// One row of the forecast output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastRecord {
    pub id: usize,
    pub step: usize,
    pub x: f32,
    pub y: f32,
}

/// Read detections and group them by frame.
///
/// Every frame between the first and the last one is present in the result, frames without rows map to no detections.
/// Rows keep their file order within a frame. Consecutive frames further apart than `max_gap` are rejected.
pub fn read_frames<R: Read>(reader: R, max_gap: u32) -> Result<IndexMap<u32, Vec<Detection>>> {
    let mut frames = IndexMap::<u32, Vec<Detection>>::new();
    for record in csv::Reader::from_reader(reader).deserialize() {
        let record: DetectionRecord = record?;
        frames
            .entry(record.frame)
            .or_default()
            .push(Detection::new(record.x, record.y));
    }
    frames.sort_keys();

    if let Some((previous, next)) = frames
        .keys()
        .tuple_windows()
        .find(|(previous, next)| *next - *previous > max_gap)
    {
        anyhow::bail!(
            "frame {next} follows frame {previous} by {} frames, more than the allowed gap of {max_gap}",
            next - previous
        );
    }

    let (first, last) = match (frames.first(), frames.last()) {
        (Some((first, _)), Some((last, _))) => (*first, *last),
        _ => return Ok(frames),
    };

    Ok((first..=last)
        .map(|frame| (frame, frames.remove(&frame).unwrap_or_default()))
        .collect())
}

/// Write the reports of every frame.
pub fn write_tracks<W: Write>(writer: W, frames: &[(u32, Vec<TrackReport>)]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for (frame, reports) in frames {
        for report in reports {
            writer.serialize(TrackRecord::new(*frame, report))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write forecast positions, steps numbered from 1.
pub fn write_forecasts<W: Write>(writer: W, forecasts: &[Forecast]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for forecast in forecasts {
        for (step, position) in forecast.positions.iter().enumerate() {
            writer.serialize(ForecastRecord {
                id: forecast.id,
                step: step + 1,
                x: position.x(),
                y: position.y(),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}
