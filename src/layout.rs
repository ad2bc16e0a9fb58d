//! # Layout
//!
//! Places packed measures on a page: one horizontal cursor per line, wrapping
//! to a new system when the next measure would overflow the line width.
//!
//! ## Measure width
//! `max(min_stave_width, renderer.min_width(measure) + note_padding)`.
//! Placeholder measures and measures the renderer cannot measure get
//! `min_stave_width`.
//!
//! ## Decorations
//! - Clef: the first measure of every line
//! - Time signature: the first measure of the score only
//!
//! The glyph renderer is an external collaborator. Only its width query is
//! needed here; [`GlyphEstimator`] gives a deterministic stand-in for headless
//! use and tests.

use serde::Serialize;
use tracing::debug;

use crate::duration::{DurationSymbol, Tempo};
use crate::error::RenderError;
use crate::packer::Measure;

/// Width query offered by a notation renderer
pub trait NotationRenderer {
    /// Minimum pixel width needed to draw the notes of `measure`
    fn min_width(&self, measure: &Measure) -> Result<f64, RenderError>;
}

impl<T: NotationRenderer + ?Sized> NotationRenderer for &T {
    fn min_width(&self, measure: &Measure) -> Result<f64, RenderError> {
        (**self).min_width(measure)
    }
}

impl<T: NotationRenderer + ?Sized> NotationRenderer for Box<T> {
    fn min_width(&self, measure: &Measure) -> Result<f64, RenderError> {
        (**self).min_width(measure)
    }
}

/// Page geometry, in pixels
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub min_stave_width: f64,
    pub note_padding: f64,
    pub system_height: f64,
    pub start_x: f64,
    pub start_y: f64,
    pub line_width: f64,
    /// Measure count is padded to a multiple of this
    pub batch_size: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            min_stave_width: 250.0,
            note_padding: 60.0,
            system_height: 150.0,
            start_x: 10.0,
            start_y: 20.0,
            line_width: 800.0,
            batch_size: 4,
        }
    }
}

/// A measure with its allocated region on the page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureLayout {
    pub measure: Measure,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    /// Zero-based line (system) index
    pub line: usize,
    pub show_clef: bool,
    pub show_time_signature: bool,
}

/// Fully laid-out score. Recomputed wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub tempo: Tempo,
    pub measures: Vec<MeasureLayout>,
    /// Total page width
    pub width: f64,
    /// Total page height, down to the bottom of the last system
    pub height: f64,
}

impl Score {
    /// Measures holding at least one note
    pub fn filled_measures(&self) -> impl Iterator<Item = &MeasureLayout> {
        self.measures.iter().filter(|m| !m.measure.is_placeholder())
    }

    pub fn placeholder_count(&self) -> usize {
        self.measures
            .iter()
            .filter(|m| m.measure.is_placeholder())
            .count()
    }

    pub fn line_count(&self) -> usize {
        self.measures.last().map_or(0, |m| m.line + 1)
    }

    /// Number of notes across all measures, committed and provisional
    pub fn note_count(&self) -> usize {
        self.measures.iter().map(|m| m.measure.notes.len()).sum()
    }
}

/// Width of one measure on the page
pub fn measure_width<R: NotationRenderer + ?Sized>(
    measure: &Measure,
    options: &LayoutOptions,
    renderer: &R,
) -> f64 {
    if measure.is_placeholder() {
        return options.min_stave_width;
    }
    match renderer.min_width(measure) {
        Ok(width) if width.is_finite() => {
            options.min_stave_width.max(width + options.note_padding)
        }
        Ok(width) => {
            debug!(width, "renderer returned a non-finite width, using minimum");
            options.min_stave_width
        }
        Err(e) => {
            debug!(error = %e, "width query failed, using minimum stave width");
            options.min_stave_width
        }
    }
}

/// Assign positions and decorations to packed measures
pub fn layout<R: NotationRenderer + ?Sized>(
    measures: Vec<Measure>,
    tempo: Tempo,
    options: &LayoutOptions,
    renderer: &R,
) -> Score {
    let mut placed = Vec::with_capacity(measures.len());
    let mut x = options.start_x;
    let mut y = options.start_y;
    let mut line = 0;
    let mut line_start = true;

    for (i, measure) in measures.into_iter().enumerate() {
        let width = measure_width(&measure, options, renderer);

        // A measure wider than the whole line still goes on a fresh line alone
        if !line_start && x + width > options.line_width {
            x = options.start_x;
            y += options.system_height;
            line += 1;
            line_start = true;
        }

        placed.push(MeasureLayout {
            measure,
            x,
            y,
            width,
            line,
            show_clef: line_start,
            show_time_signature: i == 0,
        });

        x += width;
        line_start = false;
    }

    Score {
        tempo,
        measures: placed,
        width: options.line_width,
        height: y + options.system_height,
    }
}

/// Deterministic width estimate from note count, accidentals and dots
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphEstimator {
    pub note_width: f64,
    pub accidental_width: f64,
    pub dot_width: f64,
    /// Extra room for a tuplet bracket number
    pub tuplet_width: f64,
}

impl Default for GlyphEstimator {
    fn default() -> Self {
        Self {
            note_width: 26.0,
            accidental_width: 12.0,
            dot_width: 6.0,
            tuplet_width: 4.0,
        }
    }
}

impl GlyphEstimator {
    fn note_extent(&self, duration: DurationSymbol, accidental: bool) -> f64 {
        let mut width = self.note_width;
        if accidental {
            width += self.accidental_width;
        }
        if duration.is_dotted() {
            width += self.dot_width;
        }
        if duration.is_triplet() {
            width += self.tuplet_width;
        }
        width
    }
}

impl NotationRenderer for GlyphEstimator {
    fn min_width(&self, measure: &Measure) -> Result<f64, RenderError> {
        if measure.notes.is_empty() {
            return Err(RenderError::EmptyMeasure);
        }
        Ok(measure
            .notes
            .iter()
            .map(|n| self.note_extent(n.duration, n.has_accidental()))
            .sum())
    }
}
