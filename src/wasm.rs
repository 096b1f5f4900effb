//! WebAssembly exports for the shadow engines.
//!
//! These functions are exposed to JavaScript via wasm-bindgen. Images are
//! flat RGBA byte arrays (length = width * height * 4). Shadows are larger
//! than their source; `shadow_padding_wasm` reports the margin so callers
//! can size the result.

use ndarray::Array3;
use wasm_bindgen::prelude::*;

use crate::{drop_shadow, PixelBuffer, RendererKind, Rgba, ShadowAttributes, ShadowError};

fn to_js(err: ShadowError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn load(data: &[u8], width: usize, height: usize) -> Result<PixelBuffer, JsValue> {
    let input = Array3::from_shape_vec((height, width, 4), data.to_vec())
        .map_err(|e| JsValue::from_str(&format!("invalid dimensions: {e}")))?;
    PixelBuffer::from_rgba_array(input.view()).map_err(to_js)
}

fn shadow_color(r: u8, g: u8, b: u8, opacity: f32) -> Rgba {
    Rgba::new(r, g, b, 255).with_opacity(opacity)
}

// ============================================================================
// Shadow
// ============================================================================

/// Render the blurred shadow of an RGBA image.
///
/// # Arguments
/// * `data` - Flat array of RGBA bytes
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `renderer` - Engine name: box, fast, gaussian, composite, double-box
/// * `radius` - Shadow kernel radius
/// * `r`, `g`, `b` - Shadow color
/// * `opacity` - Shadow opacity (0.0-1.0)
///
/// # Returns
/// Flat RGBA bytes of `(width + 2p) x (height + 2p)`, `p` from
/// `shadow_padding_wasm`
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn create_shadow_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    renderer: &str,
    radius: f32,
    r: u8,
    g: u8,
    b: u8,
    opacity: f32,
) -> Result<Vec<u8>, JsValue> {
    let kind = renderer.parse::<RendererKind>().map_err(to_js)?;
    let src = load(data, width, height)?;
    let attr = ShadowAttributes::new(radius, shadow_color(r, g, b, opacity));
    let shadow = kind.renderer().create_shadow(&src, &attr).map_err(to_js)?;
    Ok(shadow.to_rgba_array().into_raw_vec_and_offset().0)
}

/// Margin the engine adds on each side for `radius`.
#[wasm_bindgen]
pub fn shadow_padding_wasm(renderer: &str, radius: f32) -> Result<usize, JsValue> {
    let kind = renderer.parse::<RendererKind>().map_err(to_js)?;
    kind.renderer()
        .padding(&ShadowAttributes::with_opacity(radius, 1.0))
        .map_err(to_js)
}

// ============================================================================
// Drop Shadow
// ============================================================================

/// Apply a drop shadow to an RGBA image.
///
/// # Returns
/// `[canvas_width, canvas_height, origin_x, origin_y]` as four little-endian
/// `u32`s, followed by the flat RGBA bytes of the canvas
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn drop_shadow_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    renderer: &str,
    radius: f32,
    offset_x: f32,
    offset_y: f32,
    r: u8,
    g: u8,
    b: u8,
    opacity: f32,
) -> Result<Vec<u8>, JsValue> {
    let kind = renderer.parse::<RendererKind>().map_err(to_js)?;
    let src = load(data, width, height)?;
    let attr = ShadowAttributes::new(radius, shadow_color(r, g, b, opacity))
        .with_offset(offset_x, offset_y);
    let result = drop_shadow(&src, kind.renderer().as_ref(), &attr).map_err(to_js)?;

    let image = &result.image;
    let mut out = Vec::with_capacity(16 + image.pixels().len() * 4);
    for value in [image.width(), image.height(), result.origin_x, result.origin_y] {
        out.extend_from_slice(&(value as u32).to_le_bytes());
    }
    out.extend(image.to_rgba_array().into_raw_vec_and_offset().0);
    Ok(out)
}
