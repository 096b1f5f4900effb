//! Shadow attributes: kernel radius, shadow color and drop offset.

use crate::error::{Result, ShadowError};

/// Straight (non-premultiplied) 8-bit RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    /// Unpack a `0xAARRGGBB` word.
    pub const fn from_argb(argb: u32) -> Self {
        Rgba {
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
            a: (argb >> 24) as u8,
        }
    }

    pub const fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | self.rgb()
    }

    /// The color channels as `0x00RRGGBB`.
    #[inline]
    pub const fn rgb(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Same color at full opacity.
    pub const fn opaque(self) -> Self {
        Rgba { a: 255, ..self }
    }

    /// Same color with alpha set from a 0.0-1.0 opacity.
    pub fn with_opacity(self, opacity: f32) -> Self {
        Rgba {
            a: (opacity.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    pub fn opacity(self) -> f32 {
        self.a as f32 / 255.0
    }
}

/// Largest kernel radius [`ShadowAttributes::validate`] accepts.
pub const MAX_KERNEL_RADIUS: f32 = 1024.0;

/// Largest drop offset [`ShadowAttributes::validate`] accepts.
pub const MAX_OFFSET_DISTANCE: f32 = 16384.0;

/// Per-render shadow configuration.
///
/// The offset is kept in polar form; [`ShadowAttributes::with_offset`]
/// accepts cartesian offsets and converts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowAttributes {
    kernel_radius: f32,
    color: Rgba,
    offset_angle: f32,
    offset_distance: f32,
}

impl Default for ShadowAttributes {
    fn default() -> Self {
        ShadowAttributes::with_opacity(5.0, 0.75)
    }
}

impl ShadowAttributes {
    /// Shadow with no offset.
    pub fn new(kernel_radius: f32, color: Rgba) -> Self {
        ShadowAttributes {
            kernel_radius,
            color,
            offset_angle: 0.0,
            offset_distance: 0.0,
        }
    }

    /// Black shadow at the given 0.0-1.0 opacity.
    pub fn with_opacity(kernel_radius: f32, opacity: f32) -> Self {
        ShadowAttributes::new(kernel_radius, Rgba::BLACK.with_opacity(opacity))
    }

    /// Shadow offset given in polar form (`angle` in radians).
    pub fn with_polar_offset(mut self, angle: f32, distance: f32) -> Self {
        self.offset_angle = angle;
        self.offset_distance = distance;
        self
    }

    /// Shadow offset given as `(dx, dy)`; positive values move right / down.
    pub fn with_offset(mut self, dx: f32, dy: f32) -> Self {
        self.offset_distance = dx.hypot(dy);
        self.offset_angle = if self.offset_distance == 0.0 {
            0.0
        } else {
            dy.atan2(dx)
        };
        self
    }

    pub fn with_kernel_radius(mut self, kernel_radius: f32) -> Self {
        self.kernel_radius = kernel_radius;
        self
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    #[inline]
    pub fn kernel_radius(&self) -> f32 {
        self.kernel_radius
    }

    #[inline]
    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn offset_angle(&self) -> f32 {
        self.offset_angle
    }

    pub fn offset_distance(&self) -> f32 {
        self.offset_distance
    }

    pub fn offset_x(&self) -> f32 {
        self.offset_distance * self.offset_angle.cos()
    }

    pub fn offset_y(&self) -> f32 {
        self.offset_distance * self.offset_angle.sin()
    }

    /// Reject radii and offsets no renderer can honour.
    ///
    /// # Errors
    /// `Config` for a radius outside `0..=MAX_KERNEL_RADIUS`, a distance
    /// outside `0..=MAX_OFFSET_DISTANCE`, or a non-finite angle.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=MAX_KERNEL_RADIUS).contains(&self.kernel_radius) {
            return Err(ShadowError::config(format!(
                "kernel radius must be in 0..={MAX_KERNEL_RADIUS}, got {}",
                self.kernel_radius
            )));
        }
        if !(0.0..=MAX_OFFSET_DISTANCE).contains(&self.offset_distance) {
            return Err(ShadowError::config(format!(
                "offset distance must be in 0..={MAX_OFFSET_DISTANCE}, got {}",
                self.offset_distance
            )));
        }
        if !self.offset_angle.is_finite() {
            return Err(ShadowError::config("offset angle must be finite"));
        }
        Ok(())
    }
}
