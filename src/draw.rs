//! Drawing annotations onto camera frames.
//!
//! Every function returns a guard that draws when it is dropped, so that the defaults can be
//! overridden in place:
//!
//! ```no_run
//! # let mut image = image::RgbaImage::new(64, 64);
//! use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
//! handsteer::draw::text(&mut image, 10, 10, "hello").color(Rgb888::RED);
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    mono_font::{ascii, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use image::{Rgba, RgbaImage};

use crate::rect::Rect;

/// Guard returned by [`line`]; draws the line when dropped.
pub struct DrawLine<'a> {
    image: &'a mut RgbaImage,
    start: Point,
    end: Point,
    color: Rgb888,
    stroke_width: u32,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Rgb888) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width. Defaults to 1.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        match Line::new(self.start, self.end)
            .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
            .draw(&mut Target(self.image))
        {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`rect`]; draws the outline when dropped.
pub struct DrawRect<'a> {
    image: &'a mut RgbaImage,
    rect: Rectangle,
    color: Rgb888,
}

impl DrawRect<'_> {
    pub fn color(&mut self, color: Rgb888) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        match self
            .rect
            .into_styled(PrimitiveStyle::with_stroke(self.color, 1))
            .draw(&mut Target(self.image))
        {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`marker`]; draws the marker when dropped.
pub struct DrawMarker<'a> {
    image: &'a mut RgbaImage,
    center: Point,
    color: Rgb888,
    size: u32,
}

impl DrawMarker<'_> {
    pub fn color(&mut self, color: Rgb888) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width and height of the marker.
    ///
    /// The default size is 5. The size must be *uneven*; a size of 1 draws a single pixel.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size % 2 == 1, "marker size must be an uneven number");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let offset = ((self.size - 1) / 2) as i32;
        // An `X` shape: both diagonals through the center.
        let pixels = (-offset..=offset).flat_map(|d| {
            [
                Pixel(self.center + Point::new(d, d), self.color),
                Pixel(self.center + Point::new(d, -d), self.color),
            ]
        });
        match Target(self.image).draw_iter(pixels) {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`text`]; draws the text when dropped.
pub struct DrawText<'a> {
    image: &'a mut RgbaImage,
    position: Point,
    text: &'a str,
    color: Rgb888,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Rgb888) -> &mut Self {
        self.color = color;
        self
    }

    /// Aligns the bottom of the text with the `y` coordinate.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(&ascii::FONT_10X20, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        match Text::with_text_style(self.text, self.position, character_style, text_style)
            .draw(&mut Target(self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a line from `start` to `end`, in blue by default.
pub fn line(image: &mut RgbaImage, start: (i32, i32), end: (i32, i32)) -> DrawLine<'_> {
    DrawLine {
        image,
        start: start.into(),
        end: end.into(),
        color: Rgb888::BLUE,
        stroke_width: 1,
    }
}

/// Draws the outline of `rect`, in red by default.
pub fn rect(image: &mut RgbaImage, rect: Rect) -> DrawRect<'_> {
    DrawRect {
        image,
        rect: Rectangle::new(
            Point::new(rect.x().round() as i32, rect.y().round() as i32),
            Size::new(rect.width().round() as u32, rect.height().round() as u32),
        ),
        color: Rgb888::RED,
    }
}

/// Draws a small `X` centered on `(x, y)`, in red by default.
///
/// Used to visualize landmarks and other points of interest.
pub fn marker(image: &mut RgbaImage, x: i32, y: i32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        center: Point::new(x, y),
        color: Rgb888::RED,
        size: 5,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is red and centered horizontally and vertically around `x` and `y`.
pub fn text<'a>(image: &'a mut RgbaImage, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        position: Point::new(x, y),
        text,
        color: Rgb888::RED,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

struct Target<'a>(&'a mut RgbaImage);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.0.width(), self.0.height()))
    }
}

impl DrawTarget for Target<'_> {
    type Color = Rgb888;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            if pos.x >= 0
                && (pos.x as u32) < self.0.width()
                && pos.y >= 0
                && (pos.y as u32) < self.0.height()
            {
                self.0.put_pixel(
                    pos.x as u32,
                    pos.y as u32,
                    Rgba([color.r(), color.g(), color.b(), 255]),
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn marker_is_clipped() {
        let mut image = RgbaImage::new(4, 4);
        marker(&mut image, 0, 0);
        assert_eq!(*image.get_pixel(0, 0), RED);
        assert_eq!(*image.get_pixel(1, 1), RED);
        assert_eq!(*image.get_pixel(2, 2), RED);
        assert_eq!(*image.get_pixel(3, 3), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn line_color() {
        let mut image = RgbaImage::new(8, 1);
        line(&mut image, (0, 0), (7, 0)).color(Rgb888::GREEN);
        assert!(image.pixels().all(|px| *px == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn rect_outline() {
        let mut image = RgbaImage::new(8, 8);
        rect(&mut image, Rect::from_top_left(-2.0, 1.0, 6.0, 4.0)).color(Rgb888::CYAN);
        let cyan = Rgba([0, 255, 255, 255]);
        assert_eq!(*image.get_pixel(0, 1), cyan);
        assert_eq!(*image.get_pixel(3, 3), cyan);
        assert_eq!(*image.get_pixel(2, 3), Rgba([0, 0, 0, 0]));
        assert_eq!(*image.get_pixel(5, 1), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn text_draws_something() {
        let mut image = RgbaImage::new(100, 30);
        text(&mut image, 0, 29, "Wrist X: 42").align_left().align_bottom();
        assert!(image.pixels().any(|px| *px == RED));
    }
}
