//! The labelled point table shared by anchors and documents.

use crate::error::{BrwsError, Result};
use crate::loader::Document;
use crate::vector_ops::squared_distance_2d;
use ndarray::Array2;
use std::collections::BTreeMap;

pub type Rgb = [u8; 3];

pub const PALETTE: [Rgb; 5] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
];

#[derive(Debug, Clone, PartialEq)]
pub struct PlottablePoint {
    /// `None` for anchors.
    pub filename: Option<String>,
    pub extension: Option<String>,
    pub x: f64,
    pub y: f64,
}

impl PlottablePoint {
    pub fn is_anchor(&self) -> bool {
        self.filename.is_none()
    }

    pub fn position(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Rows `0..anchor_count` are anchors, in anchor-file order; documents follow.
#[derive(Debug, Clone)]
pub struct PointTable {
    rows: Vec<PlottablePoint>,
    anchor_count: usize,
}

impl PointTable {
    pub fn assemble(
        anchor_count: usize,
        documents: &[Document],
        coordinates: &Array2<f64>,
    ) -> Result<Self> {
        let expected = anchor_count + documents.len();
        if coordinates.nrows() != expected || coordinates.ncols() != 2 {
            return Err(BrwsError::Projection(format!(
                "expected {}x2 coordinates, got {}x{}",
                expected,
                coordinates.nrows(),
                coordinates.ncols()
            )));
        }

        let rows = coordinates
            .outer_iter()
            .enumerate()
            .map(|(i, xy)| {
                let (filename, extension) = match i.checked_sub(anchor_count) {
                    Some(d) => (
                        Some(documents[d].filename.clone()),
                        Some(documents[d].extension.clone()),
                    ),
                    None => (None, None),
                };
                PlottablePoint {
                    filename,
                    extension,
                    x: xy[0],
                    y: xy[1],
                }
            })
            .collect();

        Ok(Self { rows, anchor_count })
    }

    pub fn rows(&self) -> &[PlottablePoint] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn anchors(&self) -> &[PlottablePoint] {
        &self.rows[..self.anchor_count]
    }

    pub fn documents(&self) -> &[PlottablePoint] {
        &self.rows[self.anchor_count..]
    }

    /// Closest document row to `(x, y)`. Anchors never qualify.
    pub fn nearest_document(&self, x: f64, y: f64) -> Option<&PlottablePoint> {
        self.documents().iter().min_by(|a, b| {
            squared_distance_2d(a.position(), [x, y])
                .total_cmp(&squared_distance_2d(b.position(), [x, y]))
        })
    }
}

/// Sorted distinct extensions mapped onto [`PALETTE`], cycling past its end.
#[derive(Debug, Clone)]
pub struct ColorMap {
    colors: BTreeMap<String, Rgb>,
}

impl ColorMap {
    pub fn from_table(table: &PointTable) -> Self {
        Self::from_extensions(
            table
                .documents()
                .iter()
                .filter_map(|p| p.extension.as_deref()),
        )
    }

    pub fn from_extensions<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        let mut colors: BTreeMap<String, Rgb> = extensions
            .into_iter()
            .map(|ext| (ext.to_string(), PALETTE[0]))
            .collect();
        if colors.len() > PALETTE.len() {
            log::warn!(
                "{} distinct extensions but only {} colours; colours will repeat",
                colors.len(),
                PALETTE.len()
            );
        }
        for (i, color) in colors.values_mut().enumerate() {
            *color = PALETTE[i % PALETTE.len()];
        }
        Self { colors }
    }

    pub fn color(&self, extension: &str) -> Option<Rgb> {
        self.colors.get(extension).copied()
    }

    /// `(extension, colour)` in sorted extension order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Rgb)> {
        self.colors.iter().map(|(ext, c)| (ext.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
