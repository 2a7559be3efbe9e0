//! Axis-aligned rectangles.
//!
//! Used for palm detections and for the region of interest the landmark network looks at.

use nalgebra::{Point2, Vector2};

/// An axis-aligned rectangle in pixel coordinates.
///
/// Rectangles are allowed to have zero height and/or width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    center: Point2<f32>,
    size: Vector2<f32>,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Point2::new(x_center, y_center),
            size: Vector2::new(width, height),
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Computes the bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = Point2<f32>>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let first = iter.next()?;
        let (mut min, mut max) = (first, first);
        for pt in iter {
            min = Point2::new(min.x.min(pt.x), min.y.min(pt.y));
            max = Point2::new(max.x.max(pt.x), max.y.max(pt.y));
        }

        Some(Self::from_top_left(min.x, min.y, max.x - min.x, max.y - min.y))
    }

    /// Scales the width and height of this [`Rect`] by the given amount.
    ///
    /// The center position of the [`Rect`] remains the same.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * scale,
        }
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    ///
    /// `amount` is the relative amount of the rectangle's width and height to add to each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.scale(1.0 + 2.0 * amount)
    }

    /// Symmetrically extends one dimension of `self` so that `width / height == aspect`.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: f32) -> Self {
        let mut res = *self;
        let target_width = self.height() * aspect;
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / aspect;
        }
        res
    }

    #[must_use]
    pub fn move_by(&self, offset: Vector2<f32>) -> Self {
        Self {
            center: self.center + offset,
            ..*self
        }
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.center.x - self.size.x * 0.5
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.center.y - self.size.y * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.center
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x().max(other.x());
        let y_min = self.y().max(other.y());
        let x_max = (self.x() + self.width()).min(other.x() + other.width());
        let y_max = (self.y() + self.height()).min(other.y() + other.height());
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Rect::from_top_left(
            x_min,
            y_min,
            x_max - x_min,
            y_max - y_min,
        ))
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    ///
    /// Two empty rectangles have an IOU of 0.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |rect| rect.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn bounding() {
        let rect = Rect::bounding([
            Point2::new(3.0, 1.0),
            Point2::new(-1.0, 4.0),
            Point2::new(0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(rect, Rect::from_top_left(-1.0, 0.0, 4.0, 4.0));
        assert_eq!(Rect::bounding([]), None);
    }

    #[test]
    fn grow() {
        let rect = Rect::from_top_left(0.0, 0.0, 10.0, 20.0);
        assert_eq!(rect.grow_rel(0.5), Rect::from_center(5.0, 10.0, 20.0, 40.0));
        assert_eq!(
            rect.grow_to_fit_aspect(1.0),
            Rect::from_center(5.0, 10.0, 20.0, 20.0)
        );
        assert_eq!(
            Rect::from_top_left(0.0, 0.0, 640.0, 480.0).grow_to_fit_aspect(1.0),
            Rect::from_top_left(0.0, -80.0, 640.0, 640.0)
        );
    }

    #[test]
    fn iou() {
        let a = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);
        assert_relative_eq!(a.iou(&a), 1.0);
        assert_relative_eq!(a.iou(&a.move_by(Vector2::new(1.0, 0.0))), 2.0 / 6.0);
        assert_eq!(a.iou(&a.move_by(Vector2::new(5.0, 0.0))), 0.0);

        let empty = Rect::from_center(0.0, 0.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }
}
