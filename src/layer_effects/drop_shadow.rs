//! Drop shadow layer effect.
//!
//! Creates a shadow effect by:
//! 1. Rendering the blurred, tinted silhouette with any shadow engine
//! 2. Offsetting the shadow by the attribute offset
//! 3. Compositing the original on top with Porter-Duff "over"
//!
//! The canvas grows to hold both the source and the offset shadow, so the
//! source origin generally moves; [`DropShadow`] reports where it landed.

use crate::attributes::ShadowAttributes;
use crate::error::Result;
use crate::pixels::PixelBuffer;
use crate::renderers::ShadowRenderer;

/// Result of [`drop_shadow`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropShadow {
    /// Shadow with the source composited on top.
    pub image: PixelBuffer,
    /// Column of the source origin inside `image`.
    pub origin_x: usize,
    /// Row of the source origin inside `image`.
    pub origin_y: usize,
}

/// Blend an ARGB source word over an ARGB destination word.
#[inline]
pub fn blend_over(dst: u32, src: u32) -> u32 {
    let src_a = src >> 24;
    if src_a == 0 {
        return dst;
    }
    if src_a == 255 {
        return src;
    }

    let src_af = src_a as f32 / 255.0;
    let dst_af = (dst >> 24) as f32 / 255.0;
    let out_a = src_af + dst_af * (1.0 - src_af);
    if out_a <= 0.0 {
        return dst;
    }

    let channel = |shift: u32| {
        let s = ((src >> shift) & 0xff) as f32;
        let d = ((dst >> shift) & 0xff) as f32;
        (((s * src_af + d * dst_af * (1.0 - src_af)) / out_a) as u32).min(255)
    };
    let a = ((out_a * 255.0).round() as u32).min(255);
    (a << 24) | (channel(16) << 16) | (channel(8) << 8) | channel(0)
}

/// Apply a drop shadow to `src`.
///
/// # Arguments
/// * `src` - Source image
/// * `renderer` - Engine that renders the shadow
/// * `attr` - Radius, color and offset (`offset_x`/`offset_y` are rounded
///   to whole pixels; positive values move the shadow right / down)
///
/// # Returns
/// Canvas holding the shadow and the source, plus the source origin
pub fn drop_shadow(
    src: &PixelBuffer,
    renderer: &dyn ShadowRenderer,
    attr: &ShadowAttributes,
) -> Result<DropShadow> {
    let shadow = renderer.create_shadow(src, attr)?;
    let padding = renderer.padding(attr)? as isize;
    let dx = attr.offset_x().round() as isize;
    let dy = attr.offset_y().round() as isize;

    // Everything relative to the source origin.
    let shadow_x = dx - padding;
    let shadow_y = dy - padding;
    let min_x = shadow_x.min(0);
    let min_y = shadow_y.min(0);
    let max_x = (shadow_x + shadow.width() as isize).max(src.width() as isize);
    let max_y = (shadow_y + shadow.height() as isize).max(src.height() as isize);

    let width = (max_x - min_x) as usize;
    let height = (max_y - min_y) as usize;
    let origin_x = (-min_x) as usize;
    let origin_y = (-min_y) as usize;
    log::debug!(
        "drop shadow: {} canvas {}x{}, source at ({}, {})",
        renderer.kind(),
        width,
        height,
        origin_x,
        origin_y
    );

    let mut image = PixelBuffer::new(width, height);
    let sx = (shadow_x - min_x) as usize;
    let sy = (shadow_y - min_y) as usize;
    let sw = shadow.width();
    let pixels = image.pixels_mut();
    for (y, row) in shadow.pixels().chunks_exact(sw).enumerate() {
        let start = (sy + y) * width + sx;
        pixels[start..start + sw].copy_from_slice(row);
    }

    for (y, row) in src.pixels().chunks_exact(src.width()).enumerate() {
        let start = (origin_y + y) * width + origin_x;
        for (d, &s) in pixels[start..start + src.width()].iter_mut().zip(row) {
            *d = blend_over(*d, s);
        }
    }

    Ok(DropShadow {
        image,
        origin_x,
        origin_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Rgba;
    use crate::renderers::{BoxShadowRenderer, GaussianShadowRenderer};

    #[test]
    fn test_blend_over() {
        assert_eq!(blend_over(0x8011_2233, 0x0000_0000), 0x8011_2233);
        assert_eq!(blend_over(0x8011_2233, 0xff44_5566), 0xff44_5566);
        let over_clear = blend_over(0x0000_0000, 0x80ff_0000);
        assert_eq!(over_clear >> 24, 128);
        assert!((over_clear >> 16) & 0xff >= 254);
        // opaque destination stays opaque
        assert_eq!(blend_over(0xff00_0000, 0x80ff_ffff) >> 24, 255);
    }

    #[test]
    fn test_shadow_offset_grows_canvas() {
        let src = PixelBuffer::filled(10, 10, 0xffff_0000);
        let attr = ShadowAttributes::with_opacity(3.0, 0.75).with_offset(4.0, 2.0);
        let result = drop_shadow(&src, &BoxShadowRenderer::new(), &attr).unwrap();

        // shadow spans [4 - 3, 4 - 3 + 16) horizontally, [2 - 3, 2 - 3 + 16) vertically
        assert_eq!((result.origin_x, result.origin_y), (0, 1));
        assert_eq!((result.image.width(), result.image.height()), (17, 16));
        assert_eq!(result.image.get(5, 6), Some(0xffff_0000));
        // shadow centre visible right of the source
        assert_eq!(result.image.alpha(10, 8), 191);
        assert_eq!(result.image.get(10, 8).map(|p| p & 0x00ff_ffff), Some(0));
    }

    #[test]
    fn test_negative_offset_moves_origin() {
        let src = PixelBuffer::filled(4, 4, 0xff00_ff00);
        let attr = ShadowAttributes::new(2.0, Rgba::new(0, 0, 0, 255)).with_offset(-5.0, 0.0);
        let result = drop_shadow(&src, &GaussianShadowRenderer::new(), &attr).unwrap();

        assert_eq!((result.origin_x, result.origin_y), (7, 2));
        assert_eq!(result.image.width(), 11);
        assert_eq!(result.image.get(7, 2), Some(0xff00_ff00));
    }

    #[test]
    fn test_errors_propagate() {
        let src = PixelBuffer::new(0, 3);
        let attr = ShadowAttributes::default();
        assert!(drop_shadow(&src, &BoxShadowRenderer::new(), &attr)
            .unwrap_err()
            .is_bounds());

        let far = ShadowAttributes::default().with_offset(1e20, 0.0);
        let src = PixelBuffer::filled(2, 2, 0xff00_0000);
        assert!(drop_shadow(&src, &BoxShadowRenderer::new(), &far)
            .unwrap_err()
            .is_config());
    }
}
