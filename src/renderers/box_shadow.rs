//! Sliding-window box shadow.
//!
//! Two separable passes over the destination:
//!
//! 1. **Vertical** - source alpha is summed column by column over a window of
//!    `2k + 1` rows. The averaged value (0-255) is stored in the low byte of
//!    the destination word.
//! 2. **Horizontal** - the low bytes are summed row by row and the final
//!    word, shadow alpha plus shadow RGB, is written back.
//!
//! Both averages go through lookup tables with `256 * (2k + 1)` entries, so
//! the pixel loops never divide.
//!
//! A fractional radius `r` uses `k = ceil(r)` and down-weights the two
//! outermost taps by `frac(r)`, which makes the blur width continuous in `r`.
//!
//! Each pass keeps the last `2k + 1` samples in a ring. Samples leaving the
//! window come from the ring rather than from the buffer, so source and
//! destination may alias: the write cursor trails the read cursor by `k`.

use crate::attributes::{Rgba, ShadowAttributes};
use crate::error::{Result, ShadowError};
use crate::kernel::GaussianKernel;
use crate::pixels::PixelBuffer;

use super::{
    check_destination, check_margin, check_source, padded_size, tint, tint_region, RendererKind,
    ShadowRenderer,
};

/// Weight (1-255) of the two outermost taps for a radius.
pub(crate) fn edge_weight(radius: f32) -> u32 {
    let frac = radius - radius.floor();
    if frac == 0.0 {
        255
    } else {
        ((255.0 * frac + 0.5) as u32).clamp(1, 255)
    }
}

/// Taps on each side of the centre for a radius.
#[inline]
pub(crate) fn box_extent(radius: f32) -> usize {
    radius.ceil() as usize
}

/// Normalised box weights for a radius, edge taps included.
pub(crate) fn box_weights(radius: f32) -> Vec<f64> {
    let k = box_extent(radius);
    if k == 0 {
        return vec![1.0];
    }
    let edge = edge_weight(radius) as f64 / 255.0;
    let mut weights = vec![1.0; 2 * k + 1];
    weights[0] = edge;
    weights[2 * k] = edge;
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| w / total).collect()
}

// ============================================================================
// Kernel tables
// ============================================================================

/// Precomputed tables for one radius and shadow color.
#[derive(Debug)]
pub(crate) struct BoxKernel {
    k: usize,
    /// `255 - edge_weight`; zero for integer radii.
    edge_complement: u32,
    lut_v: Vec<u8>,
    lut_h: Vec<u32>,
}

impl BoxKernel {
    /// # Errors
    /// `Config` if `k` is 0 or `edge_weight` is outside 1-255.
    pub(crate) fn new(k: usize, edge_weight: u32, color: Rgba) -> Result<Self> {
        if k == 0 {
            return Err(ShadowError::config("box kernel needs a radius of at least 1"));
        }
        if !(1..=255).contains(&edge_weight) {
            return Err(ShadowError::config(format!(
                "edge weight must be in 1..=255, got {edge_weight}"
            )));
        }

        let shadow_size = 2 * k + 1;
        let weighted = (shadow_size - 2) as f32 + 2.0 * edge_weight as f32 / 255.0;
        let divisor = ((weighted * 255.0) as u64).max(1);
        let entries = 256 * shadow_size;
        let alpha = color.a as u64;
        let rgb = color.rgb();

        let lut_v = (0..entries)
            .map(|i| ((i as f32 / weighted) as u32).min(255) as u8)
            .collect();
        let lut_h = (0..entries)
            .map(|i| {
                let a = (i as u64 * alpha / divisor).min(255) as u32;
                (a << 24) | rgb
            })
            .collect();

        Ok(BoxKernel {
            k,
            edge_complement: 255 - edge_weight,
            lut_v,
            lut_h,
        })
    }

    pub(crate) fn for_radius(radius: f32, color: Rgba) -> Result<Self> {
        BoxKernel::new(box_extent(radius), edge_weight(radius), color)
    }

    #[inline]
    fn shadow_size(&self) -> usize {
        2 * self.k + 1
    }

    fn window(&self) -> SlidingWindow {
        SlidingWindow {
            ring: vec![0; self.shadow_size()],
            cursor: 0,
            sum: 0,
            edge_complement: self.edge_complement,
        }
    }
}

// ============================================================================
// Sliding window
// ============================================================================

/// Running sum over the last `2k + 1` samples of a line.
struct SlidingWindow {
    ring: Vec<u32>,
    cursor: usize,
    sum: u32,
    edge_complement: u32,
}

impl SlidingWindow {
    fn reset(&mut self) {
        self.ring.fill(0);
        self.cursor = 0;
        self.sum = 0;
    }

    #[inline]
    fn advance(&mut self, entering: u32) -> u32 {
        self.ring[self.cursor] = entering;
        self.cursor += 1;
        if self.cursor == self.ring.len() {
            self.cursor = 0;
        }
        if self.edge_complement == 0 {
            self.sum
        } else {
            // ring[cursor] is now the oldest sample still in the window
            let oldest = self.ring[self.cursor];
            self.sum
                - entering * self.edge_complement / 255
                - oldest * self.edge_complement / 255
        }
    }

    /// Leading zone: nothing has left the window yet.
    #[inline]
    fn fill(&mut self, entering: u32) -> u32 {
        self.sum += entering;
        self.advance(entering)
    }

    /// Interior: one sample enters, one leaves.
    #[inline]
    fn slide(&mut self, entering: u32) -> u32 {
        self.sum = self.sum + entering - self.ring[self.cursor];
        self.advance(entering)
    }

    /// Trailing zone: the line is exhausted.
    #[inline]
    fn drain(&mut self) -> u32 {
        self.sum -= self.ring[self.cursor];
        self.advance(0)
    }
}

/// Index arithmetic for one row or column.
#[derive(Clone, Copy, Debug)]
struct Line {
    start: usize,
    step: usize,
}

impl Line {
    #[inline]
    fn at(self, i: usize) -> usize {
        self.start + i * self.step
    }
}

/// Blur one line of `len` samples into `len + 2k` outputs.
///
/// Samples are `(word >> shift) & 0xff`, read from `src` or, when `src` is
/// `None`, from `dst` itself. Output `j` is written at `write.at(j)`.
#[allow(clippy::too_many_arguments)]
fn blur_line(
    window: &mut SlidingWindow,
    k: usize,
    src: Option<&[u32]>,
    dst: &mut [u32],
    read: Line,
    write: Line,
    len: usize,
    shift: u32,
    emit: impl Fn(u32) -> u32,
) {
    window.reset();
    let sample = |buf: &[u32], i: usize| (buf[read.at(i)] >> shift) & 0xff;

    for j in 0..2 * k {
        let s = match src {
            Some(src) => sample(src, j),
            None => sample(&*dst, j),
        };
        dst[write.at(j)] = emit(window.fill(s));
    }
    for j in 2 * k..len {
        let s = match src {
            Some(src) => sample(src, j),
            None => sample(&*dst, j),
        };
        dst[write.at(j)] = emit(window.slide(s));
    }
    for j in len..len + 2 * k {
        dst[write.at(j)] = emit(window.drain());
    }
}

/// Reference path for lines shorter than the window.
///
/// The line is copied to `scratch` first, then every output sums its taps
/// directly with bounds checks.
#[allow(clippy::too_many_arguments)]
fn blur_line_unoptimized(
    scratch: &mut Vec<u32>,
    k: usize,
    edge_complement: u32,
    src: Option<&[u32]>,
    dst: &mut [u32],
    read: Line,
    write: Line,
    len: usize,
    shift: u32,
    emit: impl Fn(u32) -> u32,
) {
    scratch.clear();
    scratch.extend((0..len).map(|i| {
        let word = match src {
            Some(src) => src[read.at(i)],
            None => dst[read.at(i)],
        };
        (word >> shift) & 0xff
    }));

    let at = |i: isize| -> u32 {
        if i >= 0 && (i as usize) < len {
            scratch[i as usize]
        } else {
            0
        }
    };

    for j in 0..len + 2 * k {
        let newest = j as isize;
        let oldest = newest - 2 * k as isize;
        let sum: u32 = (oldest..=newest).map(at).sum();
        let z = sum - at(newest) * edge_complement / 255 - at(oldest) * edge_complement / 255;
        dst[write.at(j)] = emit(z);
    }
}

// ============================================================================
// Passes
// ============================================================================

/// Where the vertical pass reads source alpha from.
#[derive(Clone, Copy)]
pub(crate) enum Input<'a> {
    /// A separate buffer; the region starts at `(x, y)`.
    Separate {
        pixels: &'a [u32],
        stride: usize,
        x: usize,
        y: usize,
    },
    /// The destination region itself.
    InPlace,
}

/// Geometry of one box render: the source region lands at `(x, y)` in a
/// destination with row stride `stride`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Placement {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub stride: usize,
}

/// Run both passes. The caller has checked that the region plus `k` pixels
/// of margin fits the destination.
pub(crate) fn render_box(kernel: &BoxKernel, input: Input<'_>, dst: &mut [u32], at: Placement) {
    log::trace!(
        "box passes: k={} region {}x{} at ({}, {})",
        kernel.k,
        at.width,
        at.height,
        at.x,
        at.y
    );
    vertical_pass(kernel, input, dst, at);
    horizontal_pass(kernel, dst, at);
}

fn vertical_pass(kernel: &BoxKernel, input: Input<'_>, dst: &mut [u32], at: Placement) {
    let k = kernel.k;
    let lut = &kernel.lut_v;
    let emit = |z: u32| lut[z as usize] as u32;
    let mut window = kernel.window();
    let mut scratch = Vec::new();

    for c in 0..at.width {
        let (src, read) = match input {
            Input::Separate {
                pixels,
                stride,
                x,
                y,
            } => (
                Some(pixels),
                Line {
                    start: y * stride + x + c,
                    step: stride,
                },
            ),
            Input::InPlace => (
                None,
                Line {
                    start: at.y * at.stride + at.x + c,
                    step: at.stride,
                },
            ),
        };
        let write = Line {
            start: (at.y - k) * at.stride + at.x + c,
            step: at.stride,
        };

        if at.height >= kernel.shadow_size() {
            blur_line(&mut window, k, src, dst, read, write, at.height, 24, emit);
        } else {
            blur_line_unoptimized(
                &mut scratch,
                k,
                kernel.edge_complement,
                src,
                dst,
                read,
                write,
                at.height,
                24,
                emit,
            );
        }
    }
}

fn horizontal_pass(kernel: &BoxKernel, dst: &mut [u32], at: Placement) {
    let k = kernel.k;
    let lut = &kernel.lut_h;
    let emit = |z: u32| lut[z as usize];
    let mut window = kernel.window();
    let mut scratch = Vec::new();

    for row in at.y - k..at.y + at.height + k {
        let read = Line {
            start: row * at.stride + at.x,
            step: 1,
        };
        let write = Line {
            start: row * at.stride + at.x - k,
            step: 1,
        };

        if at.width >= kernel.shadow_size() {
            blur_line(&mut window, k, None, dst, read, write, at.width, 0, emit);
        } else {
            blur_line_unoptimized(
                &mut scratch,
                k,
                kernel.edge_complement,
                None,
                dst,
                read,
                write,
                at.width,
                0,
                emit,
            );
        }
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Box shadow with fractional radius, offset placement and in-place support.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxShadowRenderer;

impl BoxShadowRenderer {
    pub fn new() -> Self {
        BoxShadowRenderer
    }

    /// Render the shadow of a sub-region of `src` with its origin at
    /// `(dst_x, dst_y)` in `dst`.
    ///
    /// # Arguments
    /// * `src_x`, `src_y`, `width`, `height` - Region of `src` to shadow
    /// * `dst_x`, `dst_y` - Where the region's origin lands in `dst`
    ///
    /// # Errors
    /// `Bounds` if the region leaves `src`, or the region plus
    /// `ceil(radius)` pixels of margin does not fit in `dst`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_shadow_region(
        &self,
        src: &PixelBuffer,
        src_x: usize,
        src_y: usize,
        width: usize,
        height: usize,
        dst: &mut PixelBuffer,
        dst_x: usize,
        dst_y: usize,
        attr: &ShadowAttributes,
    ) -> Result<()> {
        attr.validate()?;
        if width == 0 || height == 0 {
            return Err(ShadowError::bounds(format!(
                "source region is empty ({width}x{height})"
            )));
        }
        if !src.contains_region(src_x, src_y, width, height) {
            return Err(ShadowError::bounds(format!(
                "source region {width}x{height} at ({src_x}, {src_y}) exceeds source {}x{}",
                src.width(),
                src.height()
            )));
        }
        let radius = attr.kernel_radius();
        let k = box_extent(radius);
        check_margin(dst.width(), dst.height(), dst_x, dst_y, width, height, k)?;

        let at = Placement {
            x: dst_x,
            y: dst_y,
            width,
            height,
            stride: dst.width(),
        };
        let input = Input::Separate {
            pixels: src.pixels(),
            stride: src.width(),
            x: src_x,
            y: src_y,
        };

        if k == 0 {
            copy_silhouette(input, dst, at, attr.color());
            return Ok(());
        }
        let kernel = BoxKernel::for_radius(radius, attr.color())?;
        render_box(&kernel, input, dst.pixels_mut(), at);
        Ok(())
    }
}

/// Zero-radius rendering of a source region.
fn copy_silhouette(input: Input<'_>, dst: &mut PixelBuffer, at: Placement, color: Rgba) {
    match input {
        Input::Separate {
            pixels,
            stride,
            x,
            y,
        } => {
            let dst_stride = dst.width();
            let out = dst.pixels_mut();
            for row in 0..at.height {
                let s = (y + row) * stride + x;
                let d = (at.y + row) * dst_stride + at.x;
                for (o, &p) in out[d..d + at.width].iter_mut().zip(&pixels[s..s + at.width]) {
                    *o = tint(p >> 24, color);
                }
            }
        }
        Input::InPlace => tint_region(dst, at.x, at.y, at.width, at.height, color),
    }
}

impl ShadowRenderer for BoxShadowRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Box
    }

    fn padding(&self, attr: &ShadowAttributes) -> Result<usize> {
        attr.validate()?;
        Ok(box_extent(attr.kernel_radius()))
    }

    fn kernel(&self, attr: &ShadowAttributes) -> Result<GaussianKernel> {
        attr.validate()?;
        GaussianKernel::from_normalized(&box_weights(attr.kernel_radius()))
    }

    fn create_shadow_into(
        &self,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
        attr: &ShadowAttributes,
    ) -> Result<()> {
        check_source(src)?;
        let p = self.padding(attr)?;
        let (out_w, out_h) = padded_size(src.width(), src.height(), p)?;
        check_destination(dst, out_w, out_h)?;
        self.create_shadow_at(src, dst, p, p, attr)
    }

    fn create_shadow_at(
        &self,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
        dst_x: usize,
        dst_y: usize,
        attr: &ShadowAttributes,
    ) -> Result<()> {
        check_source(src)?;
        self.create_shadow_region(src, 0, 0, src.width(), src.height(), dst, dst_x, dst_y, attr)
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
        attr.validate()?;
        let radius = attr.kernel_radius();
        apply_in_place(
            buffer,
            Placement {
                x,
                y,
                width,
                height,
                stride: buffer.width(),
            },
            box_extent(radius),
            edge_weight(radius),
            attr.color(),
        )
    }
}

/// In-place blur shared by the box engines.
pub(crate) fn apply_in_place(
    buffer: &mut PixelBuffer,
    at: Placement,
    k: usize,
    edge_weight: u32,
    color: Rgba,
) -> Result<()> {
    if at.width == 0 || at.height == 0 {
        return Err(ShadowError::bounds(format!(
            "region is empty ({}x{})",
            at.width, at.height
        )));
    }
    check_margin(
        buffer.width(),
        buffer.height(),
        at.x,
        at.y,
        at.width,
        at.height,
        k,
    )?;
    if k == 0 {
        tint_region(buffer, at.x, at.y, at.width, at.height, color);
        return Ok(());
    }
    let kernel = BoxKernel::new(k, edge_weight, color)?;
    render_box(&kernel, Input::InPlace, buffer.pixels_mut(), at);
    Ok(())
}
