//! Mapping from the model's normalized 0-1000 space to device pixels.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound of the normalized coordinate space.
pub const NORMALIZED_MAX: u32 = 1000;

/// Bounding box in normalized space, in the model's `[ymin, xmin, ymax, xmax]` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub ymin: u32,
    pub xmin: u32,
    pub ymax: u32,
    pub xmax: u32,
}

impl NormalizedBox {
    /// Validate a raw `box_2d` value: exactly four integers in `[0, 1000]`
    /// with min <= max on both axes.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let items = value
            .as_array()
            .ok_or_else(|| format!("box_2d is not an array: {}", value))?;
        if items.len() != 4 {
            return Err(format!("box_2d has {} values, expected 4", items.len()));
        }

        let mut coords = [0u32; 4];
        for (slot, item) in coords.iter_mut().zip(items) {
            let n = item
                .as_u64()
                .or_else(|| item.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| format!("box_2d value is not a non-negative integer: {}", item))?;
            if n > NORMALIZED_MAX as u64 {
                return Err(format!("box_2d value {} outside 0..={}", n, NORMALIZED_MAX));
            }
            *slot = n as u32;
        }

        let [ymin, xmin, ymax, xmax] = coords;
        if ymin > ymax || xmin > xmax {
            return Err(format!("box_2d is inverted: {:?}", coords));
        }

        Ok(Self { ymin, xmin, ymax, xmax })
    }
}

/// Bounding box in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
}

impl PixelBox {
    pub fn contains(&self, point: ClickPoint) -> bool {
        (self.xmin..=self.xmax).contains(&point.x) && (self.ymin..=self.ymax).contains(&point.y)
    }
}

/// Pixel coordinate to tap for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: u32,
    pub y: u32,
}

/// Map a normalized box onto a `width` x `height` screen.
///
/// Every edge is scaled with floor division and the click point is the
/// floor-average of each axis, so results are exact and repeatable. Inputs
/// must already be validated (see [`NormalizedBox::from_value`]).
pub fn map_box(norm: &NormalizedBox, width: u32, height: u32) -> (PixelBox, ClickPoint) {
    let scale = |v: u32, dim: u32| ((v as u64 * dim as u64) / NORMALIZED_MAX as u64) as u32;

    let abs = PixelBox {
        xmin: scale(norm.xmin, width),
        ymin: scale(norm.ymin, height),
        xmax: scale(norm.xmax, width),
        ymax: scale(norm.ymax, height),
    };
    let click = ClickPoint {
        x: ((abs.xmin as u64 + abs.xmax as u64) / 2) as u32,
        y: ((abs.ymin as u64 + abs.ymax as u64) / 2) as u32,
    };

    (abs, click)
}
