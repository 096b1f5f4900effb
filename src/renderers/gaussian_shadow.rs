//! Gaussian shadow.
//!
//! A true separable convolution with an integer Gaussian kernel
//! (`k = round(radius)`, `sigma = radius / 3`):
//!
//! 1. The vertical pass convolves each source column into a column-major
//!    `u8` scratch plane of `src_w x dst_h`.
//! 2. The horizontal pass convolves each scratch row into the destination
//!    and tints it.
//!
//! Both passes hand out chunks of 16 lines to rayon. The vertical pass is
//! fully joined before the horizontal pass starts.

use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::attributes::{Rgba, ShadowAttributes};
use crate::error::Result;
use crate::kernel::{gaussian_extent, GaussianKernel};
use crate::pixels::PixelBuffer;

use super::{
    check_destination, check_source, padded_size, write_silhouette, RendererKind, ShadowRenderer,
};

/// Lines per parallel task.
const LINES_PER_TASK: usize = 16;

#[derive(Clone, Debug, Default)]
pub struct GaussianShadowRenderer {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl GaussianShadowRenderer {
    /// Renderer running on the global rayon pool.
    pub fn new() -> Self {
        GaussianShadowRenderer { pool: None }
    }

    /// Renderer running on a caller-owned pool.
    pub fn with_thread_pool(pool: Arc<rayon::ThreadPool>) -> Self {
        GaussianShadowRenderer { pool: Some(pool) }
    }

    /// Split `data` into chunks of `chunk_len` and run `f(chunk_index, chunk)`
    /// for each, in parallel where threads are available.
    fn for_each_chunk<T, F>(&self, data: &mut [T], chunk_len: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Send + Sync,
    {
        #[cfg(not(target_arch = "wasm32"))]
        {
            match &self.pool {
                Some(pool) => pool.install(|| {
                    data.par_chunks_mut(chunk_len)
                        .enumerate()
                        .for_each(|(i, chunk)| f(i, chunk))
                }),
                None => data
                    .par_chunks_mut(chunk_len)
                    .enumerate()
                    .for_each(|(i, chunk)| f(i, chunk)),
            }
        }
        #[cfg(target_arch = "wasm32")]
        {
            data.chunks_mut(chunk_len)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk));
        }
    }
}

// ============================================================================
// Line convolution
// ============================================================================

/// Convolve `input` into `output` (`input.len() + 2k` samples).
///
/// Output `j` is centred on input `j - k`. The leading and trailing zones
/// check bounds; the interior does not. Inside the interior a window of
/// `2k + 1` identical samples that are 0 or 255 is copied through without
/// multiplying.
fn convolve_line(kernel: &GaussianKernel, input: &[u8], output: &mut [u8]) {
    let weights = kernel.weights();
    let sum = kernel.sum();
    let half = sum / 2;
    let n = input.len();
    let k = kernel.kernel_radius();
    let taps = 2 * k + 1;
    debug_assert_eq!(output.len(), n + 2 * k);

    let edge = |j: usize| -> u8 {
        // taps cover inputs j - 2k ..= j
        let first = j.saturating_sub(2 * k);
        let last = j.min(n.saturating_sub(1));
        let mut acc = 0u32;
        if n > 0 && first <= last {
            for i in first..=last {
                acc += weights[i + 2 * k - j] * input[i] as u32;
            }
        }
        ((acc + half) / sum).min(255) as u8
    };

    let lead_end = (2 * k).min(output.len());
    for (j, out) in output[..lead_end].iter_mut().enumerate() {
        *out = edge(j);
    }

    if 2 * k < n {
        let mut run = 0usize;
        let mut prev = None;
        for &v in &input[..2 * k] {
            if prev == Some(v) {
                run += 1;
            } else {
                run = 1;
                prev = Some(v);
            }
        }

        for j in 2 * k..n {
            let v = input[j];
            if prev == Some(v) {
                run += 1;
            } else {
                run = 1;
                prev = Some(v);
            }
            if run >= taps && (v == 0 || v == 255) {
                output[j] = v;
                continue;
            }
            let window = &input[j - 2 * k..=j];
            let acc: u32 = weights
                .iter()
                .zip(window)
                .map(|(&w, &s)| w * s as u32)
                .sum();
            output[j] = ((acc + half) / sum).min(255) as u8;
        }
    }

    for j in (2 * k).max(n)..n + 2 * k {
        output[j] = edge(j);
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Tinted shadow word for every convolved alpha value.
fn tint_table(color: Rgba) -> [u32; 256] {
    let mut table = [0u32; 256];
    for (v, entry) in table.iter_mut().enumerate() {
        *entry = super::tint(v as u32, color);
    }
    table
}

impl ShadowRenderer for GaussianShadowRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Gaussian
    }

    fn padding(&self, attr: &ShadowAttributes) -> Result<usize> {
        attr.validate()?;
        Ok(gaussian_extent(attr.kernel_radius()))
    }

    fn kernel(&self, attr: &ShadowAttributes) -> Result<GaussianKernel> {
        attr.validate()?;
        Ok(GaussianKernel::cached(attr.kernel_radius())?.as_ref().clone())
    }

    fn create_shadow_into(
        &self,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
        attr: &ShadowAttributes,
    ) -> Result<()> {
        check_source(src)?;
        let k = self.padding(attr)?;
        let (src_w, src_h) = (src.width(), src.height());
        let (out_w, out_h) = padded_size(src_w, src_h, k)?;
        check_destination(dst, out_w, out_h)?;

        if k == 0 {
            write_silhouette(src, dst, 0, 0, attr.color());
            return Ok(());
        }
        let kernel = GaussianKernel::cached(attr.kernel_radius())?;
        log::debug!(
            "gaussian shadow: radius {} ({} taps) over {}x{}",
            attr.kernel_radius(),
            kernel.len(),
            src_w,
            src_h
        );

        // Vertical pass: source columns into a column-major scratch plane.
        let mut scratch = vec![0u8; src_w * out_h];
        let src_pixels = src.pixels();
        self.for_each_chunk(&mut scratch, LINES_PER_TASK * out_h, |chunk, columns| {
            let mut line = Vec::with_capacity(src_h);
            for (c, column) in columns.chunks_exact_mut(out_h).enumerate() {
                let x = chunk * LINES_PER_TASK + c;
                line.clear();
                line.extend((0..src_h).map(|y| (src_pixels[y * src_w + x] >> 24) as u8));
                convolve_line(&kernel, &line, column);
            }
        });

        // Horizontal pass: scratch rows into tinted destination rows.
        let table = tint_table(attr.color());
        let stride = dst.width();
        let scratch = &scratch;
        let rows = &mut dst.pixels_mut()[..out_h * stride];
        self.for_each_chunk(rows, LINES_PER_TASK * stride, |chunk, block| {
            let mut line = Vec::with_capacity(src_w);
            let mut out = vec![0u8; out_w];
            for (r, row) in block.chunks_exact_mut(stride).enumerate() {
                let y = chunk * LINES_PER_TASK + r;
                line.clear();
                line.extend((0..src_w).map(|x| scratch[x * out_h + y]));
                convolve_line(&kernel, &line, &mut out);
                for (d, &v) in row[..out_w].iter_mut().zip(&out) {
                    *d = table[v as usize];
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(kernel: &GaussianKernel, input: &[u8]) -> Vec<u8> {
        let k = kernel.kernel_radius() as isize;
        let n = input.len() as isize;
        (0..n + 2 * k)
            .map(|j| {
                let mut acc = 0u32;
                for (t, &w) in kernel.weights().iter().enumerate() {
                    let i = j - 2 * k + t as isize;
                    if i >= 0 && i < n {
                        acc += w * input[i as usize] as u32;
                    }
                }
                ((acc + kernel.sum() / 2) / kernel.sum()).min(255) as u8
            })
            .collect()
    }

    #[test]
    fn test_zones_match_reference() {
        let kernel = GaussianKernel::gaussian(3.0).unwrap();
        let inputs: [Vec<u8>; 4] = [
            vec![200],
            vec![10, 250, 30],
            (0..40).map(|i| ((i * 37) % 256) as u8).collect(),
            [vec![0; 9], vec![255; 12], vec![0; 9], vec![7; 3]].concat(),
        ];
        for input in inputs {
            let mut out = vec![0u8; input.len() + 6];
            convolve_line(&kernel, &input, &mut out);
            assert_eq!(out, reference(&kernel, &input), "input {input:?}");
        }
    }

    #[test]
    fn test_single_pixel_is_bell_shaped() {
        let mut src = PixelBuffer::new(1, 1);
        src.set(0, 0, 0xff00_0000);
        let attr = ShadowAttributes::with_opacity(6.0, 1.0);
        let shadow = GaussianShadowRenderer::new()
            .create_shadow(&src, &attr)
            .unwrap();
        assert_eq!((shadow.width(), shadow.height()), (13, 13));

        let row: Vec<u8> = (0..13).map(|x| shadow.alpha(x, 6)).collect();
        for i in 0..6 {
            assert_eq!(row[i], row[12 - i]);
            assert!(row[i] <= row[i + 1]);
        }
        for y in 0..13 {
            for x in 0..13 {
                assert_eq!(shadow.alpha(x, y), shadow.alpha(12 - x, y));
                assert_eq!(shadow.alpha(x, y), shadow.alpha(x, 12 - y));
            }
        }
    }

    #[test]
    fn test_solid_interior_stays_solid() {
        let src = PixelBuffer::filled(40, 40, 0xff00_0000);
        let attr = ShadowAttributes::new(4.0, Rgba::new(0, 0, 255, 255));
        let shadow = GaussianShadowRenderer::new()
            .create_shadow(&src, &attr)
            .unwrap();
        assert_eq!(shadow.get(24, 24), Some(0xff00_00ff));
        assert!(shadow.alpha(4, 24) > 0 && shadow.alpha(4, 24) < 255);
    }

    #[test]
    fn test_custom_pool_gives_same_result() {
        let src = PixelBuffer::filled(37, 21, 0x9000_0000);
        let attr = ShadowAttributes::with_opacity(2.7, 0.9);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();
        let pooled = GaussianShadowRenderer::with_thread_pool(Arc::new(pool))
            .create_shadow(&src, &attr)
            .unwrap();
        let global = GaussianShadowRenderer::new()
            .create_shadow(&src, &attr)
            .unwrap();
        assert_eq!(pooled, global);
    }

    #[test]
    fn test_small_radius_is_unblurred() {
        let src = PixelBuffer::filled(3, 2, 0x8000_0000);
        let attr = ShadowAttributes::with_opacity(0.4, 1.0);
        let shadow = GaussianShadowRenderer::new()
            .create_shadow(&src, &attr)
            .unwrap();
        assert_eq!(shadow, PixelBuffer::filled(3, 2, 0x8000_0000));
    }

    #[test]
    fn test_larger_destination_keeps_outside_pixels() {
        let src = PixelBuffer::filled(8, 8, 0xff00_0000);
        let attr = ShadowAttributes::with_opacity(2.0, 1.0);
        let mut dst = PixelBuffer::filled(16, 14, 0x0102_0304);
        GaussianShadowRenderer::new()
            .create_shadow_into(&src, &mut dst, &attr)
            .unwrap();
        assert_eq!(dst.get(13, 13), Some(0x0102_0304));
        assert_eq!(dst.get(12, 0), Some(0x0102_0304));
        assert_eq!(dst.alpha(6, 6), 255);

        let mut small = PixelBuffer::new(11, 12);
        let err = GaussianShadowRenderer::new()
            .create_shadow_into(&src, &mut small, &attr)
            .unwrap_err();
        assert!(err.is_bounds());
        assert_eq!(small.total_alpha(), 0);
    }
}
