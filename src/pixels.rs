//! Packed ARGB pixel buffer.
//!
//! Every renderer reads and writes this layout directly:
//! one `u32` per pixel, `0xAARRGGBB`, row-major, no stride padding.
//!
//! Conversion to and from `(height, width, 4)` RGBA8 arrays is provided for
//! callers that hold images as `ndarray` arrays.

use ndarray::{Array3, ArrayView3};

use crate::error::{Result, ShadowError};

/// An owned `width * height` buffer of packed ARGB words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Create a fully transparent buffer.
    pub fn new(width: usize, height: usize) -> Self {
        PixelBuffer {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    /// Wrap an existing pixel vector.
    ///
    /// # Errors
    /// `Bounds` if `pixels.len() != width * height`.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(ShadowError::bounds(format!(
                "pixel count {} does not match {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(PixelBuffer {
            width,
            height,
            pixels,
        })
    }

    /// Create a buffer filled with one ARGB value.
    pub fn filled(width: usize, height: usize, argb: u32) -> Self {
        PixelBuffer {
            width,
            height,
            pixels: vec![argb; width * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }

    /// ARGB word at `(x, y)`, or `None` outside the buffer.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Alpha channel at `(x, y)`; 0 outside the buffer.
    #[inline]
    pub fn alpha(&self, x: usize, y: usize) -> u8 {
        self.get(x, y).map_or(0, |argb| (argb >> 24) as u8)
    }

    /// Overwrite the ARGB word at `(x, y)`. Writes outside the buffer are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, argb: u32) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = argb;
        }
    }

    /// True if a `width x height` rectangle at `(x, y)` lies inside the buffer.
    pub fn contains_region(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        x.checked_add(width).is_some_and(|right| right <= self.width)
            && y.checked_add(height).is_some_and(|bottom| bottom <= self.height)
    }

    /// Sum of the alpha channel over the whole buffer.
    pub fn total_alpha(&self) -> u64 {
        self.pixels.iter().map(|&argb| (argb >> 24) as u64).sum()
    }

    /// Copy this buffer into the centre of a larger transparent canvas.
    ///
    /// # Arguments
    /// * `margin` - Pixels to add on each side
    ///
    /// # Returns
    /// Buffer of `(width + 2*margin) x (height + 2*margin)`
    pub fn padded(&self, margin: usize) -> PixelBuffer {
        let new_w = self.width + margin * 2;
        let new_h = self.height + margin * 2;
        let mut result = PixelBuffer::new(new_w, new_h);

        for y in 0..self.height {
            let src_row = &self.pixels[y * self.width..(y + 1) * self.width];
            let start = (y + margin) * new_w + margin;
            result.pixels[start..start + self.width].copy_from_slice(src_row);
        }

        result
    }

    // ========================================================================
    // ndarray conversion
    // ========================================================================

    /// Build a buffer from an RGBA8 image of shape `(height, width, 4)`.
    ///
    /// # Errors
    /// `Bounds` if the last axis does not have 4 channels.
    pub fn from_rgba_array(image: ArrayView3<u8>) -> Result<Self> {
        let (height, width, channels) = image.dim();
        if channels != 4 {
            return Err(ShadowError::bounds(format!(
                "expected 4 channels (RGBA), got {channels}"
            )));
        }

        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let r = image[[y, x, 0]] as u32;
                let g = image[[y, x, 1]] as u32;
                let b = image[[y, x, 2]] as u32;
                let a = image[[y, x, 3]] as u32;
                pixels.push((a << 24) | (r << 16) | (g << 8) | b);
            }
        }

        Ok(PixelBuffer {
            width,
            height,
            pixels,
        })
    }

    /// Convert to an RGBA8 array of shape `(height, width, 4)`.
    pub fn to_rgba_array(&self) -> Array3<u8> {
        Array3::from_shape_fn((self.height, self.width, 4), |(y, x, c)| {
            let argb = self.pixels[y * self.width + x];
            match c {
                0 => (argb >> 16) as u8,
                1 => (argb >> 8) as u8,
                2 => argb as u8,
                _ => (argb >> 24) as u8,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pixels_checks_length() {
        assert!(PixelBuffer::from_pixels(3, 2, vec![0; 6]).is_ok());
        let err = PixelBuffer::from_pixels(3, 2, vec![0; 5]).unwrap_err();
        assert!(err.is_bounds());
    }

    #[test]
    fn test_padded_places_content_in_centre() {
        let src = PixelBuffer::filled(2, 1, 0xff00_00ff);
        let padded = src.padded(2);

        assert_eq!(padded.width(), 6);
        assert_eq!(padded.height(), 5);
        assert_eq!(padded.get(2, 2), Some(0xff00_00ff));
        assert_eq!(padded.get(3, 2), Some(0xff00_00ff));
        assert_eq!(padded.get(1, 2), Some(0));
        assert_eq!(padded.total_alpha(), 2 * 255);
    }

    #[test]
    fn test_rgba_array_round_trip_keeps_channel_order() {
        let mut img = Array3::<u8>::zeros((1, 2, 4));
        img[[0, 1, 0]] = 10;
        img[[0, 1, 1]] = 20;
        img[[0, 1, 2]] = 30;
        img[[0, 1, 3]] = 40;

        let buffer = PixelBuffer::from_rgba_array(img.view()).unwrap();
        assert_eq!(buffer.get(1, 0), Some(0x280a_141e));
        assert_eq!(buffer.alpha(1, 0), 40);
        assert_eq!(buffer.to_rgba_array(), img);
    }

    #[test]
    fn test_rgba_array_rejects_rgb() {
        let img = Array3::<u8>::zeros((2, 2, 3));
        assert!(PixelBuffer::from_rgba_array(img.view()).is_err());
    }

    #[test]
    fn test_contains_region() {
        let buffer = PixelBuffer::new(10, 8);
        assert!(buffer.contains_region(2, 2, 8, 6));
        assert!(!buffer.contains_region(3, 2, 8, 6));
        assert!(!buffer.contains_region(usize::MAX, 0, 2, 2));
    }
}
