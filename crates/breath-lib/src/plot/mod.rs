use crate::estimator::Analysis;
use crate::signal::Snapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    /// Discrete markers, e.g. detected peaks.
    Markers(LineSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) | Series::Markers(line) => &line.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over every series, `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Raw and smoothed intensity against time, with the detected peaks marked.
pub fn figure_from_analysis(snapshot: &Snapshot, analysis: &Analysis, max_points: usize) -> Figure {
    let times = snapshot.timestamps();
    let series_points = |values: &[f64]| -> Vec<[f64; 2]> {
        times
            .iter()
            .zip(values.iter())
            .map(|(&t, &v)| [t, v])
            .collect()
    };
    let title = match analysis.report.estimate.cpm() {
        Some(cpm) => format!("Breathing rate {:.2} cpm", cpm),
        None => "Breathing rate undetermined".to_string(),
    };
    let mut fig = Figure::new(Some(title));
    fig.x.label = Some("time (s)".into());
    fig.y.label = Some("intensity".into());
    fig.add_series(Series::Line(LineSeries {
        name: "raw".into(),
        points: decimate_points(&series_points(&analysis.raw), max_points),
        style: Style {
            width: 1.0,
            color: Color(0xA0A0A0),
        },
    }));
    fig.add_series(Series::Line(LineSeries {
        name: "smoothed".into(),
        points: decimate_points(&series_points(&analysis.smoothed), max_points),
        style: Style {
            width: 2.0,
            color: Color(0x0077FF),
        },
    }));
    let peaks = analysis
        .report
        .peaks
        .indices
        .iter()
        .filter_map(|&i| Some([*times.get(i)?, *analysis.smoothed.get(i)?]))
        .collect();
    fig.add_series(Series::Markers(LineSeries {
        name: "peaks".into(),
        points: peaks,
        style: Style {
            width: 4.0,
            color: Color(0xFF0077),
        },
    }));
    fig
}
