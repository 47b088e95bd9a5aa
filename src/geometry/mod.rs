//! Page coordinate normalization
//!
//! Highlights are stored as fractions of the page they sit on, so they
//! stay valid at any zoom level and across re-renders. Selections arrive
//! in viewport pixels and are normalized here; stored boxes are projected
//! back onto whatever size the page is currently rendered at.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slack allowed when checking that a box stays on the page
const EDGE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("page size is not known yet ({width}x{height})")]
    UnknownPageSize { width: f64, height: f64 },

    #[error("invalid zoom scale: {0}")]
    InvalidScale(f64),
}

/// A point in viewport pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Page dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both dimensions are finite and positive (the page has rendered)
    pub fn is_known(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Size of the page when drawn at `scale`
    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// Bounding box as fractions (0-1) of the page's width and height
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FractionalBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FractionalBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ]
    }

    /// Check that every field is a finite fraction and the box stays on the page.
    ///
    /// Returns a description of the first offending field.
    pub fn check(&self) -> Result<(), String> {
        for (name, value) in self.fields() {
            if !value.is_finite() {
                return Err(format!("boundingBox.{} must be a finite number", name));
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("boundingBox.{} must be between 0 and 1", name));
            }
        }
        if self.x + self.width > 1.0 + EDGE_TOLERANCE {
            return Err("boundingBox extends past the right edge of the page".to_string());
        }
        if self.y + self.height > 1.0 + EDGE_TOLERANCE {
            return Err("boundingBox extends past the bottom edge of the page".to_string());
        }
        Ok(())
    }

    /// Intersect with the unit page.
    ///
    /// Text selections regularly overshoot the page edge by a pixel or two.
    pub fn clamped(&self) -> Self {
        let left = self.x.clamp(0.0, 1.0);
        let top = self.y.clamp(0.0, 1.0);
        let right = (self.x + self.width).clamp(0.0, 1.0);
        let bottom = (self.y + self.height).clamp(0.0, 1.0);
        Self {
            x: left,
            y: top,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }
}

/// Convert a viewport-pixel selection into a fractional box.
///
/// `page_origin` is the top-left corner of the rendered page in the same
/// viewport coordinates as `selection`; `page` is the unscaled page size
/// and `scale` the current zoom factor.
pub fn normalize(
    selection: PixelRect,
    page_origin: Point,
    page: PageSize,
    scale: f64,
) -> Result<FractionalBox, GeometryError> {
    if !page.is_known() {
        return Err(GeometryError::UnknownPageSize {
            width: page.width,
            height: page.height,
        });
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(GeometryError::InvalidScale(scale));
    }

    Ok(FractionalBox {
        x: (selection.x - page_origin.x) / scale / page.width,
        y: (selection.y - page_origin.y) / scale / page.height,
        width: selection.width / scale / page.width,
        height: selection.height / scale / page.height,
    })
}

/// Project a fractional box onto a page rendered at `rendered` pixels.
pub fn project(fraction: FractionalBox, rendered: PageSize) -> PixelRect {
    PixelRect {
        x: fraction.x * rendered.width,
        y: fraction.y * rendered.height,
        width: fraction.width * rendered.width,
        height: fraction.height * rendered.height,
    }
}
