//! ShadowStag Rust Extensions
//!
//! Shadow rendering for packed ARGB images, with Python bindings via PyO3
//! and WASM bindings for JavaScript.
//!
//! ## Pixel Format
//! All engines work on [`PixelBuffer`]: one `u32` per pixel, `0xAARRGGBB`,
//! row-major, no stride padding. `(height, width, 4)` RGBA8 `ndarray`
//! images convert with [`PixelBuffer::from_rgba_array`] and
//! [`PixelBuffer::to_rgba_array`].
//!
//! ## Engines
//! - **Box** - sliding-window box blur with fractional radius, in-place and
//!   offset rendering
//! - **Fast box** - integer-radius box blur
//! - **Gaussian** - exact separable convolution, parallel over rayon
//! - **Composite / double box** - chained box passes approximating the
//!   Gaussian from a lookup table
//!
//! Every engine implements [`ShadowRenderer`]; pick one by name through
//! [`RendererKind`].
//!
//! ```
//! use shadowstag_rust::{PixelBuffer, RendererKind, ShadowAttributes};
//!
//! let src = PixelBuffer::filled(10, 10, 0xff00_0000);
//! let attr = ShadowAttributes::with_opacity(3.0, 0.75);
//! let renderer = "box".parse::<RendererKind>()?.renderer();
//! let shadow = renderer.create_shadow(&src, &attr)?;
//! assert_eq!(shadow.width(), 16);
//! # Ok::<(), shadowstag_rust::ShadowError>(())
//! ```
//!
//! ## Logging
//! The crate logs through the `log` facade and never installs a logger.

pub mod attributes;
pub mod error;
pub mod kernel;
pub mod layer_effects;
pub mod pixels;
pub mod renderers;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use attributes::{Rgba, ShadowAttributes, MAX_KERNEL_RADIUS, MAX_OFFSET_DISTANCE};
pub use error::{Result, ShadowError};
pub use kernel::GaussianKernel;
pub use layer_effects::{drop_shadow, DropShadow};
pub use pixels::PixelBuffer;
pub use renderers::{
    BoxShadowRenderer, Capabilities, Combo, ComboTable, CompositeShadowRenderer,
    FastShadowRenderer, GaussianShadowRenderer, RendererKind, ShadowRenderer,
};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::{PixelBuffer, RendererKind, Rgba, ShadowAttributes, ShadowError};

    fn to_py_err(err: ShadowError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    fn prepare(
        image: &PyReadonlyArray3<'_, u8>,
        renderer: &str,
        radius: f32,
        color: (u8, u8, u8),
        opacity: f32,
    ) -> PyResult<(PixelBuffer, RendererKind, ShadowAttributes)> {
        let kind = renderer.parse::<RendererKind>().map_err(to_py_err)?;
        let src = PixelBuffer::from_rgba_array(image.as_array()).map_err(to_py_err)?;
        let shadow_color = Rgba::new(color.0, color.1, color.2, 255).with_opacity(opacity);
        Ok((src, kind, ShadowAttributes::new(radius, shadow_color)))
    }

    // ========================================================================
    // Shadow
    // ========================================================================

    /// Render the blurred shadow of an RGBA u8 image.
    ///
    /// # Arguments
    /// * `image` - Source RGBA image (height, width, 4) as u8
    /// * `renderer` - Engine name: box, fast, gaussian, composite, double-box
    /// * `radius` - Shadow kernel radius
    /// * `color` - Shadow color as (R, G, B) tuple (0-255)
    /// * `opacity` - Shadow opacity (0.0-1.0)
    ///
    /// # Returns
    /// RGBA shadow image, larger than the input by the engine padding on
    /// every side
    #[pyfunction]
    #[pyo3(signature = (image, renderer="box", radius=5.0, color=(0, 0, 0), opacity=0.75))]
    pub fn create_shadow_rgba<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        renderer: &str,
        radius: f32,
        color: (u8, u8, u8),
        opacity: f32,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let (src, kind, attr) = prepare(&image, renderer, radius, color, opacity)?;
        let shadow = kind
            .renderer()
            .create_shadow(&src, &attr)
            .map_err(to_py_err)?;
        Ok(shadow.to_rgba_array().into_pyarray(py))
    }

    // ========================================================================
    // Drop Shadow
    // ========================================================================

    /// Apply a drop shadow to an RGBA u8 image.
    ///
    /// # Arguments
    /// * `image` - Source RGBA image (height, width, 4) as u8
    /// * `renderer` - Engine name: box, fast, gaussian, composite, double-box
    /// * `radius` - Shadow kernel radius
    /// * `offset_x` - Horizontal shadow offset (positive = right)
    /// * `offset_y` - Vertical shadow offset (positive = down)
    /// * `color` - Shadow color as (R, G, B) tuple (0-255)
    /// * `opacity` - Shadow opacity (0.0-1.0)
    ///
    /// # Returns
    /// Tuple of (RGBA image with drop shadow, source x, source y)
    #[pyfunction]
    #[pyo3(signature = (image, renderer="box", radius=5.0, offset_x=4.0, offset_y=4.0, color=(0, 0, 0), opacity=0.75))]
    #[allow(clippy::too_many_arguments)]
    pub fn drop_shadow_rgba<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        renderer: &str,
        radius: f32,
        offset_x: f32,
        offset_y: f32,
        color: (u8, u8, u8),
        opacity: f32,
    ) -> PyResult<(Bound<'py, PyArray3<u8>>, usize, usize)> {
        let (src, kind, attr) = prepare(&image, renderer, radius, color, opacity)?;
        let attr = attr.with_offset(offset_x, offset_y);
        let result = crate::drop_shadow(&src, kind.renderer().as_ref(), &attr).map_err(to_py_err)?;
        Ok((
            result.image.to_rgba_array().into_pyarray(py),
            result.origin_x,
            result.origin_y,
        ))
    }

    /// Padding the engine adds on each side for `radius`.
    #[pyfunction]
    #[pyo3(signature = (renderer="box", radius=5.0))]
    pub fn shadow_padding(renderer: &str, radius: f32) -> PyResult<usize> {
        let kind = renderer.parse::<RendererKind>().map_err(to_py_err)?;
        kind.renderer()
            .padding(&ShadowAttributes::with_opacity(radius, 1.0))
            .map_err(to_py_err)
    }

    #[pymodule]
    pub fn shadowstag_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(create_shadow_rgba, m)?)?;
        m.add_function(wrap_pyfunction!(drop_shadow_rgba, m)?)?;
        m.add_function(wrap_pyfunction!(shadow_padding, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::shadowstag_rust;
