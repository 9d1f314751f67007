//! Blank-page heuristic: decide whether a scanned page carries content.
//!
//! Separator sheets and empty backs of duplex scans are never pure white.
//! Sensor noise and the physical paper edge leave a few dark pixels. The
//! heuristic ignores a 3 % margin on every side, counts interior pixels
//! darker than mid-grey on a 16-bit scale, and keeps the page when more than
//! 0.03 % of them are dark. A typical separator page scores around 0.0008 on
//! a flatbed; a truly blank back scores far lower.
//!
//! The thresholds below are a compatibility contract: pages archived by
//! earlier stations were filtered with the same margin, brightness and ratio.
//! The interior is strictly inside the border on all four sides. Earlier
//! stations also counted the last column and row at `W - border` and
//! `H - border`, so a score here can differ from theirs by that one-pixel
//! strip. The keep/discard decision only differs on pages whose ratio sits
//! right at the threshold.

use crate::error::ScanError;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Fraction of the shorter side excluded on each edge.
pub const BORDER_FRACTION: f64 = 0.03;

/// Average 16-bit channel value above which a pixel counts as bright.
pub const BRIGHTNESS_THRESHOLD: u32 = 32768;

/// A page is kept when its dark ratio is strictly greater than this.
pub const DARK_RATIO_THRESHOLD: f64 = 0.0003;

/// Dark and bright interior pixel counts of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelCounts {
    pub dark: u64,
    pub bright: u64,
}

impl PixelCounts {
    /// `dark / (dark + bright)`; an empty interior scores 0.
    pub fn dark_ratio(&self) -> f64 {
        let total = self.dark + self.bright;
        if total == 0 {
            return 0.0;
        }
        self.dark as f64 / total as f64
    }
}

/// Width of the ignored margin for an image of the given size.
pub fn border_width(width: u32, height: u32) -> u32 {
    (BORDER_FRACTION * f64::from(width.min(height))).floor() as u32
}

/// Count dark and bright pixels strictly inside the border.
pub fn count_pixels(img: &DynamicImage) -> PixelCounts {
    let rgb = img.to_rgb16();
    let (width, height) = rgb.dimensions();
    let border = border_width(width, height);

    let mut counts = PixelCounts::default();
    for y in (border + 1)..height.saturating_sub(border) {
        for x in (border + 1)..width.saturating_sub(border) {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            let average = (u32::from(r) + u32::from(g) + u32::from(b)) / 3;
            if average > BRIGHTNESS_THRESHOLD {
                counts.bright += 1;
            } else {
                counts.dark += 1;
            }
        }
    }
    counts
}

/// Blank-page score of a decoded page.
pub fn dark_ratio(img: &DynamicImage) -> f64 {
    count_pixels(img).dark_ratio()
}

/// Whether a page with this score is content-bearing.
pub fn is_content(dark_ratio: f64) -> bool {
    dark_ratio > DARK_RATIO_THRESHOLD
}

/// Open and decode a raw page. The format is sniffed from the file header.
pub fn decode_page(path: &Path) -> Result<DynamicImage, ScanError> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| ScanError::PageRead {
            path: path.to_path_buf(),
            source,
        })?;

    reader.decode().map_err(|e| ScanError::PageDecode {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
