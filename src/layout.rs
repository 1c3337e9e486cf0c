//! Page geometry in PDF points

/// Points per inch (PDF user space unit)
pub const POINTS_PER_INCH: f32 = 72.0;

/// Width and height of a page in points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }

    /// Page size for a raster image of `width_px` × `height_px` at `dpi`
    pub fn from_pixels(width_px: u32, height_px: u32, dpi: f32) -> Self {
        let scale = POINTS_PER_INCH / dpi;
        Self::new(width_px as f32 * scale, height_px as f32 * scale)
    }

    /// Both sides finite and strictly positive
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Ceiling of the page diagonal.
    ///
    /// A square of this half-side centered on the page covers all four
    /// corners whatever the rotation applied around the center.
    pub fn coverage_radius(&self) -> f64 {
        let (w, h) = (self.width as f64, self.height as f64);
        (w * w + h * h).sqrt().ceil()
    }

    /// Exact-match key for caching per-geometry data
    pub fn key(&self) -> (u32, u32) {
        (self.width.to_bits(), self.height.to_bits())
    }
}
