//! Types for representing image resolutions.

use std::fmt;

/// Resolution (`width x height`) of an image, window or camera.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// VGA resolution: `640x480`
    pub const RES_VGA: Self = Self {
        width: 640,
        height: 480,
    };

    /// Creates a new [`Resolution`] of `width x height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width of this [`Resolution`].
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this [`Resolution`].
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns `true` if `self` is at least as wide and as tall as `other`.
    pub fn contains(&self, other: Resolution) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
