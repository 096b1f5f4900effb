//! Shadow renderers.
//!
//! Every engine takes a packed ARGB [`PixelBuffer`], blurs its alpha
//! silhouette and tints it with the shadow color. They differ in accuracy
//! and speed:
//!
//! | Engine | Algorithm | Exact kernel | In place | Parallel |
//! |--------|-----------|--------------|----------|----------|
//! | [`BoxShadowRenderer`] | sliding-window box, fractional radius | yes | yes | no |
//! | [`FastShadowRenderer`] | sliding-window box, integer radius | yes | yes | no |
//! | [`GaussianShadowRenderer`] | separable Gaussian convolution | yes | no | yes |
//! | [`CompositeShadowRenderer`] | 2-4 chained box passes from a lookup table | no | no | no |
//!
//! The output of [`ShadowRenderer::create_shadow`] is larger than the source
//! by [`ShadowRenderer::padding`] on each side, and the source origin maps
//! to `(padding, padding)`.

pub mod box_shadow;
pub mod composite_shadow;
pub mod fast_shadow;
pub mod gaussian_shadow;

use std::fmt;
use std::str::FromStr;

use crate::attributes::{Rgba, ShadowAttributes};
use crate::error::{Result, ShadowError};
use crate::kernel::GaussianKernel;
use crate::pixels::PixelBuffer;

pub use box_shadow::BoxShadowRenderer;
pub use composite_shadow::{Combo, ComboTable, CompositeShadowRenderer};
pub use fast_shadow::FastShadowRenderer;
pub use gaussian_shadow::GaussianShadowRenderer;

// ============================================================================
// Capabilities
// ============================================================================

/// What a renderer can do beyond `create_shadow`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Non-integer radii change the output.
    pub fractional_radius: bool,
    /// `create_shadow_at` places the source at an arbitrary offset.
    pub offset_placement: bool,
    /// `apply_shadow` blurs a region of a buffer in place.
    pub in_place: bool,
    /// `kernel()` is the exact kernel applied, not an approximation.
    pub exact_kernel: bool,
    /// Passes are split across the rayon pool.
    pub parallel: bool,
}

/// The available shadow engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RendererKind {
    Box,
    FastBox,
    Gaussian,
    Composite,
    DoubleBox,
}

impl RendererKind {
    pub const ALL: [RendererKind; 5] = [
        RendererKind::Box,
        RendererKind::FastBox,
        RendererKind::Gaussian,
        RendererKind::Composite,
        RendererKind::DoubleBox,
    ];

    pub fn capabilities(self) -> Capabilities {
        match self {
            RendererKind::Box => Capabilities {
                fractional_radius: true,
                offset_placement: true,
                in_place: true,
                exact_kernel: true,
                parallel: false,
            },
            RendererKind::FastBox => Capabilities {
                in_place: true,
                exact_kernel: true,
                ..Capabilities::default()
            },
            RendererKind::Gaussian => Capabilities {
                fractional_radius: true,
                exact_kernel: true,
                parallel: true,
                ..Capabilities::default()
            },
            RendererKind::Composite | RendererKind::DoubleBox => Capabilities {
                fractional_radius: true,
                ..Capabilities::default()
            },
        }
    }

    /// Construct the engine with default settings.
    pub fn renderer(self) -> Box<dyn ShadowRenderer> {
        match self {
            RendererKind::Box => Box::new(BoxShadowRenderer::new()),
            RendererKind::FastBox => Box::new(FastShadowRenderer::new()),
            RendererKind::Gaussian => Box::new(GaussianShadowRenderer::new()),
            RendererKind::Composite => Box::new(CompositeShadowRenderer::new()),
            RendererKind::DoubleBox => Box::new(CompositeShadowRenderer::double_box()),
        }
    }

    /// Short configuration name, as accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            RendererKind::Box => "box",
            RendererKind::FastBox => "fast",
            RendererKind::Gaussian => "gaussian",
            RendererKind::Composite => "composite",
            RendererKind::DoubleBox => "double-box",
        }
    }

    /// Engine type name used in error messages.
    pub fn type_name(self) -> &'static str {
        match self {
            RendererKind::Box => "BoxShadowRenderer",
            RendererKind::FastBox => "FastShadowRenderer",
            RendererKind::Gaussian => "GaussianShadowRenderer",
            RendererKind::Composite => "CompositeShadowRenderer",
            RendererKind::DoubleBox => "DoubleBoxShadowRenderer",
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RendererKind {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "box" => Ok(RendererKind::Box),
            "fast" | "fast-box" | "fastbox" => Ok(RendererKind::FastBox),
            "gaussian" => Ok(RendererKind::Gaussian),
            "composite" => Ok(RendererKind::Composite),
            "double-box" | "doublebox" | "double_box" => Ok(RendererKind::DoubleBox),
            other => Err(ShadowError::config(format!("unknown renderer '{other}'"))),
        }
    }
}

// ============================================================================
// Renderer contract
// ============================================================================

/// Shared contract of all shadow engines.
///
/// Arguments are validated before any pixel is touched: a call that returns
/// an error leaves its destination unchanged.
pub trait ShadowRenderer: Send + Sync {
    fn kind(&self) -> RendererKind;

    fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }

    /// Margin the shadow adds on each side of the source.
    ///
    /// The margin is engine specific: `ceil(radius)` for the box engine,
    /// `round(radius)` for the fast box and Gaussian engines, and the sum of
    /// the sub-radius extents for the composite engines.
    fn padding(&self, attr: &ShadowAttributes) -> Result<usize>;

    /// The discrete 1D kernel this engine applies for `attr`.
    ///
    /// Engines without `exact_kernel` return an approximation.
    fn kernel(&self, attr: &ShadowAttributes) -> Result<GaussianKernel>;

    /// Render the shadow of `src` into `dst`, anchored at the top-left.
    ///
    /// `dst` must be at least `src + 2 * padding` in each dimension. Pixels
    /// outside the shadow rectangle are left untouched.
    fn create_shadow_into(
        &self,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
        attr: &ShadowAttributes,
    ) -> Result<()>;

    /// Render the shadow of `src` into a new buffer.
    ///
    /// # Returns
    /// Buffer of `(width + 2*padding) x (height + 2*padding)`
    fn create_shadow(&self, src: &PixelBuffer, attr: &ShadowAttributes) -> Result<PixelBuffer> {
        check_source(src)?;
        let padding = self.padding(attr)?;
        let (width, height) = padded_size(src.width(), src.height(), padding)?;
        let mut dst = PixelBuffer::new(width, height);
        self.create_shadow_into(src, &mut dst, attr)?;
        Ok(dst)
    }

    /// Blur the `width x height` region at `(x, y)` of `buffer` in place.
    ///
    /// The region needs `padding` pixels of margin on every side; the shadow
    /// spreads into it.
    fn apply_shadow(
        &self,
        _buffer: &mut PixelBuffer,
        _x: usize,
        _y: usize,
        _width: usize,
        _height: usize,
        _attr: &ShadowAttributes,
    ) -> Result<()> {
        Err(unsupported(self.kind(), "apply_shadow"))
    }

    /// Render the shadow of `src` with the source origin at `(dst_x, dst_y)`.
    fn create_shadow_at(
        &self,
        _src: &PixelBuffer,
        _dst: &mut PixelBuffer,
        _dst_x: usize,
        _dst_y: usize,
        _attr: &ShadowAttributes,
    ) -> Result<()> {
        Err(unsupported(self.kind(), "create_shadow_at"))
    }
}

pub(crate) fn unsupported(kind: RendererKind, operation: &'static str) -> ShadowError {
    ShadowError::Unsupported {
        renderer: kind.type_name(),
        operation,
    }
}

// ============================================================================
// Shared checks
// ============================================================================

pub(crate) fn check_source(src: &PixelBuffer) -> Result<()> {
    if src.width() == 0 || src.height() == 0 {
        return Err(ShadowError::bounds(format!(
            "source is empty ({}x{})",
            src.width(),
            src.height()
        )));
    }
    Ok(())
}

pub(crate) fn check_destination(dst: &PixelBuffer, width: usize, height: usize) -> Result<()> {
    if dst.width() < width || dst.height() < height {
        return Err(ShadowError::bounds(format!(
            "destination {}x{} is smaller than the shadow {}x{}",
            dst.width(),
            dst.height(),
            width,
            height
        )));
    }
    Ok(())
}

/// Size of a `width x height` source grown by `padding` on every side.
pub(crate) fn padded_size(width: usize, height: usize, padding: usize) -> Result<(usize, usize)> {
    let grow = |len: usize| padding.checked_mul(2).and_then(|p| len.checked_add(p));
    match (grow(width), grow(height)) {
        (Some(w), Some(h)) if w.checked_mul(h).is_some() => Ok((w, h)),
        _ => Err(ShadowError::bounds(format!(
            "shadow of {width}x{height} with {padding} pixels of padding is too large"
        ))),
    }
}

/// Check that a `width x height` region at `(x, y)` has `margin` pixels of
/// room on every side inside a `buf_w x buf_h` buffer.
pub(crate) fn check_margin(
    buf_w: usize,
    buf_h: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    margin: usize,
) -> Result<()> {
    if x < margin || y < margin {
        return Err(ShadowError::bounds(format!(
            "region origin ({x}, {y}) leaves less than {margin} pixels of margin"
        )));
    }
    let fits = |start: usize, len: usize, limit: usize| {
        start
            .checked_add(len)
            .and_then(|end| end.checked_add(margin))
            .is_some_and(|end| end <= limit)
    };
    if !fits(x, width, buf_w) || !fits(y, height, buf_h) {
        return Err(ShadowError::bounds(format!(
            "region {width}x{height} at ({x}, {y}) plus {margin} pixels of margin exceeds {buf_w}x{buf_h}"
        )));
    }
    Ok(())
}

// ============================================================================
// Unblurred silhouette
// ============================================================================

/// Shadow word for one source alpha value without blur.
#[inline]
pub(crate) fn tint(alpha: u32, color: Rgba) -> u32 {
    ((alpha * color.a as u32 / 255) << 24) | color.rgb()
}

/// Write the tinted, unblurred silhouette of `src` at `(dst_x, dst_y)`.
pub(crate) fn write_silhouette(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    dst_x: usize,
    dst_y: usize,
    color: Rgba,
) {
    let (w, h) = (src.width(), src.height());
    let dst_w = dst.width();
    let out = dst.pixels_mut();
    for (y, row) in src.pixels().chunks_exact(w).take(h).enumerate() {
        let start = (dst_y + y) * dst_w + dst_x;
        for (d, &s) in out[start..start + w].iter_mut().zip(row) {
            *d = tint(s >> 24, color);
        }
    }
}

/// Replace a region of `buffer` with its tinted, unblurred silhouette.
pub(crate) fn tint_region(
    buffer: &mut PixelBuffer,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    color: Rgba,
) {
    let stride = buffer.width();
    let pixels = buffer.pixels_mut();
    for row in y..y + height {
        let start = row * stride + x;
        for p in &mut pixels[start..start + width] {
            *p = tint(*p >> 24, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in RendererKind::ALL {
            assert_eq!(kind.to_string().parse::<RendererKind>().unwrap(), kind);
            assert_eq!(kind.renderer().kind(), kind);
        }
        assert_eq!(" Gaussian ".parse::<RendererKind>().unwrap(), RendererKind::Gaussian);
        assert!("blurry".parse::<RendererKind>().unwrap_err().is_config());
    }

    #[test]
    fn test_capabilities_match_engines() {
        assert!(RendererKind::Box.capabilities().offset_placement);
        assert!(!RendererKind::FastBox.capabilities().fractional_radius);
        assert!(RendererKind::FastBox.capabilities().in_place);
        assert!(RendererKind::Gaussian.capabilities().parallel);
        assert!(!RendererKind::Gaussian.capabilities().in_place);
        assert!(!RendererKind::Composite.capabilities().exact_kernel);
    }

    #[test]
    fn test_unsupported_calls_are_reported() {
        let gaussian = GaussianShadowRenderer::new();
        let mut buffer = PixelBuffer::new(10, 10);
        let attr = ShadowAttributes::with_opacity(2.0, 1.0);
        let err = gaussian
            .apply_shadow(&mut buffer, 2, 2, 6, 6, &attr)
            .unwrap_err();
        assert_eq!(err, unsupported(RendererKind::Gaussian, "apply_shadow"));

        let src = PixelBuffer::filled(2, 2, 0xff00_0000);
        let fast = FastShadowRenderer::new();
        assert!(matches!(
            fast.create_shadow_at(&src, &mut buffer, 3, 3, &attr),
            Err(ShadowError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_check_margin() {
        assert!(check_margin(10, 10, 2, 2, 6, 6, 2).is_ok());
        assert!(check_margin(10, 10, 1, 2, 6, 6, 2).unwrap_err().is_bounds());
        assert!(check_margin(10, 10, 2, 2, 7, 6, 2).is_err());
        assert!(check_margin(10, 10, 2, 2, usize::MAX, 6, 2).is_err());
    }

    #[test]
    fn test_padded_size_overflow_is_bounds() {
        assert_eq!(padded_size(10, 4, 3).unwrap(), (16, 10));
        assert!(padded_size(2, 2, usize::MAX).unwrap_err().is_bounds());
        assert!(padded_size(usize::MAX - 1, 2, 1).unwrap_err().is_bounds());
        assert!(padded_size(usize::MAX / 2, 3, 0).unwrap_err().is_bounds());
    }

    #[test]
    fn test_tint() {
        let color = Rgba::new(0x10, 0x20, 0x30, 191);
        assert_eq!(tint(255, color), 0xbf10_2030);
        assert_eq!(tint(0, color), 0x0010_2030);
        assert_eq!(tint(128, color) >> 24, 128 * 191 / 255);
    }
}
