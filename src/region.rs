use std::fmt;

use crate::error::{RegionError, RegionErrorKind};

/// Axis-aligned face rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Checks that the region has positive area and lies fully inside an
    /// image of the given size.
    pub fn validate(&self, image_width: u32, image_height: u32) -> Result<(), RegionError> {
        if self.width == 0 || self.height == 0 {
            return Err(RegionError {
                region: *self,
                kind: RegionErrorKind::EmptyArea,
            });
        }

        let right = u64::from(self.x) + u64::from(self.width);
        let bottom = u64::from(self.y) + u64::from(self.height);
        if right > u64::from(image_width) || bottom > u64::from(image_height) {
            return Err(RegionError {
                region: *self,
                kind: RegionErrorKind::OutOfBounds {
                    image_width,
                    image_height,
                },
            });
        }

        Ok(())
    }

    /// Builds a region from signed detector coordinates, clipping it to the
    /// image. Returns `None` when nothing of the box remains inside.
    pub fn clamped(
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let x1 = x.clamp(0, i64::from(image_width));
        let y1 = y.clamp(0, i64::from(image_height));
        let x2 = (x + width).clamp(0, i64::from(image_width));
        let y2 = (y + height).clamp(0, i64::from(image_height));

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(Self {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }
}

impl fmt::Display for FaceRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.x, self.y
        )
    }
}
