//! Integer-radius box shadow.
//!
//! Same passes as [`BoxShadowRenderer`](super::BoxShadowRenderer), but the
//! radius is rounded to the nearest integer and every tap has full weight.
//! The source always lands at `(k, k)`; there is no offset placement.

use crate::attributes::ShadowAttributes;
use crate::error::Result;
use crate::kernel::GaussianKernel;
use crate::pixels::PixelBuffer;

use super::box_shadow::{apply_in_place, render_box, BoxKernel, Input, Placement};
use super::{
    check_destination, check_source, padded_size, write_silhouette, RendererKind, ShadowRenderer,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct FastShadowRenderer;

impl FastShadowRenderer {
    pub fn new() -> Self {
        FastShadowRenderer
    }
}

/// Radius actually used for `attr`.
#[inline]
fn integer_radius(attr: &ShadowAttributes) -> usize {
    attr.kernel_radius().round() as usize
}

impl ShadowRenderer for FastShadowRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::FastBox
    }

    fn padding(&self, attr: &ShadowAttributes) -> Result<usize> {
        attr.validate()?;
        Ok(integer_radius(attr))
    }

    fn kernel(&self, attr: &ShadowAttributes) -> Result<GaussianKernel> {
        let k = self.padding(attr)?;
        let taps = 2 * k + 1;
        GaussianKernel::from_normalized(&vec![1.0 / taps as f64; taps])
    }

    fn create_shadow_into(
        &self,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
        attr: &ShadowAttributes,
    ) -> Result<()> {
        check_source(src)?;
        let k = self.padding(attr)?;
        let (w, h) = (src.width(), src.height());
        let (out_w, out_h) = padded_size(w, h, k)?;
        check_destination(dst, out_w, out_h)?;

        let at = Placement {
            x: k,
            y: k,
            width: w,
            height: h,
            stride: dst.width(),
        };
        if k == 0 {
            write_silhouette(src, dst, 0, 0, attr.color());
            return Ok(());
        }

        let kernel = BoxKernel::new(k, 255, attr.color())?;
        let input = Input::Separate {
            pixels: src.pixels(),
            stride: w,
            x: 0,
            y: 0,
        };
        render_box(&kernel, input, dst.pixels_mut(), at);
        Ok(())
    }

    fn apply_shadow(
        &self,
        buffer: &mut PixelBuffer,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        attr: &ShadowAttributes,
    ) -> Result<()> {
        let k = self.padding(attr)?;
        let at = Placement {
            x,
            y,
            width,
            height,
            stride: buffer.width(),
        };
        apply_in_place(buffer, at, k, 255, attr.color())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderers::BoxShadowRenderer;

    #[test]
    fn test_matches_box_for_integer_radius() {
        let mut src = PixelBuffer::new(6, 5);
        for y in 0..5 {
            for x in 0..6 {
                src.set(x, y, (((x * 53 + y * 29) % 256) as u32) << 24);
            }
        }
        let attr = ShadowAttributes::with_opacity(3.0, 0.6);
        let fast = FastShadowRenderer::new().create_shadow(&src, &attr).unwrap();
        let exact = BoxShadowRenderer::new().create_shadow(&src, &attr).unwrap();
        assert_eq!(fast, exact);
    }

    #[test]
    fn test_rounds_fractional_radius() {
        let renderer = FastShadowRenderer::new();
        let src = PixelBuffer::filled(3, 3, 0xff00_0000);

        let shadow = renderer
            .create_shadow(&src, &ShadowAttributes::with_opacity(2.4, 1.0))
            .unwrap();
        assert_eq!(shadow.width(), 7);

        let same = renderer
            .create_shadow(&src, &ShadowAttributes::with_opacity(2.0, 1.0))
            .unwrap();
        assert_eq!(shadow, same);

        assert_eq!(
            renderer
                .padding(&ShadowAttributes::with_opacity(2.6, 1.0))
                .unwrap(),
            3
        );
    }

    #[test]
    fn test_in_place_matches_fresh_render() {
        let src = PixelBuffer::filled(5, 8, 0xc000_0000);
        let attr = ShadowAttributes::with_opacity(2.0, 1.0);
        let renderer = FastShadowRenderer::new();

        let expected = renderer.create_shadow(&src, &attr).unwrap();
        let mut buffer = src.padded(2);
        renderer.apply_shadow(&mut buffer, 2, 2, 5, 8, &attr).unwrap();
        assert_eq!(buffer, expected);

        let err = renderer
            .apply_shadow(&mut buffer, 1, 2, 5, 8, &attr)
            .unwrap_err();
        assert!(err.is_bounds());
    }

    #[test]
    fn test_kernel_is_flat() {
        let kernel = FastShadowRenderer::new()
            .kernel(&ShadowAttributes::with_opacity(1.0, 1.0))
            .unwrap();
        assert_eq!(kernel.weights(), &[21845, 21845, 21845]);
    }
}
