//! Anchor/Prior generation for Single Shot MultiBox Detectors (SSDs).
//!
//! Only as general as the palm detection network needs: one anchor center per box, no anchor
//! sizes or aspect ratios.

use std::ops::Index;

use crate::resolution::Resolution;

/// An anchor of an SSD network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    // values range from 0 to 1
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Non-zero.
    boxes_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// # Parameters
    ///
    /// - `boxes_per_cell`: the number of boxes associated with each cell in this feature map.
    /// - `width`/`height`: size of this layer's feature map, in output cells.
    ///
    /// # Panics
    ///
    /// Panics if `boxes_per_cell` is 0.
    pub fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert_ne!(boxes_per_cell, 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The anchors of all output layers, in network output order.
#[derive(Debug, Clone)]
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();

        for layer in layers {
            let height = layer.resolution.height();
            let width = layer.resolution.width();

            for y in 0..height {
                for x in 0..width {
                    let x_center = (x as f32 + 0.5) / width as f32;
                    let y_center = (y as f32 + 0.5) / height as f32;
                    for _ in 0..layer.boxes_per_cell {
                        anchors.push(Anchor { x_center, y_center });
                    }
                }
            }
        }

        Self { anchors }
    }

    /// Returns the total number of SSD anchors/priors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_order() {
        let anchors = Anchors::calculate(&[LayerInfo::new(2, 2, 1), LayerInfo::new(1, 1, 1)]);
        assert_eq!(anchors.anchor_count(), 5);
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(anchors[0].x_center(), 0.25);
        assert_eq!(anchors[2].x_center(), 0.75);
        assert_eq!(anchors[4].x_center(), 0.5);
        assert_eq!(anchors[4].y_center(), 0.5);
    }
}
