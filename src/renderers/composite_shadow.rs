//! Composite shadow: a Gaussian approximated by chained box passes.
//!
//! Repeated box blurs converge on a Gaussian. For each target radius a
//! lookup table names the 2-4 box radii whose composition best matches the
//! Gaussian engine's kernel. Rendering runs one box pass per sub-radius,
//! smallest first: the first pass renders the source, every later pass
//! blurs the previous result in place.
//!
//! Radii outside the table, or a table that failed to load, fall back to
//! [`GaussianShadowRenderer`].
//!
//! ## Table format
//!
//! ```text
//! # comment
//! gaussian_radius,sub_radius_1,sub_radius_2[,sub_radius_3[,sub_radius_4]]
//! ```
//!
//! Rows are strictly ascending by radius. Zero sub-radii are allowed and
//! skipped when rendering.

use std::ops::RangeInclusive;
use std::sync::{Arc, OnceLock};

use crate::attributes::{ShadowAttributes, MAX_KERNEL_RADIUS};
use crate::error::{Result, ShadowError};
use crate::kernel::{convolve, GaussianKernel};
use crate::pixels::PixelBuffer;

use super::box_shadow::{box_extent, box_weights, BoxShadowRenderer};
use super::{
    check_destination, check_source, padded_size, GaussianShadowRenderer, RendererKind,
    ShadowRenderer,
};

const COMPOSITE_TABLE: &str = include_str!("../../data/composite_shadow_table.csv");
const DOUBLE_BOX_TABLE: &str = include_str!("../../data/double_box_shadow_table.csv");

const COMPOSITE_PASSES: RangeInclusive<usize> = 2..=4;
const DOUBLE_BOX_PASSES: RangeInclusive<usize> = 2..=2;

// ============================================================================
// Combo
// ============================================================================

/// Box radii whose composition approximates one Gaussian radius.
#[derive(Clone, Debug, PartialEq)]
pub struct Combo {
    sub_radii: Vec<f32>,
    radii_sum: usize,
}

impl Combo {
    /// # Errors
    /// `Config` if any radius lies outside `0..=MAX_KERNEL_RADIUS`, or all
    /// are zero.
    pub fn new(radii: &[f32]) -> Result<Self> {
        if let Some(bad) = radii.iter().find(|r| !(0.0..=MAX_KERNEL_RADIUS).contains(*r)) {
            return Err(ShadowError::config(format!(
                "sub-radius must be in 0..={MAX_KERNEL_RADIUS}, got {bad}"
            )));
        }
        let mut sub_radii: Vec<f32> = radii.iter().copied().filter(|&r| r > 0.0).collect();
        if sub_radii.is_empty() {
            return Err(ShadowError::config("combo needs at least one non-zero sub-radius"));
        }
        sub_radii.sort_by(f32::total_cmp);
        let radii_sum = sub_radii.iter().map(|&r| box_extent(r)).sum();
        Ok(Combo {
            sub_radii,
            radii_sum,
        })
    }

    /// Non-zero sub-radii, ascending.
    pub fn sub_radii(&self) -> &[f32] {
        &self.sub_radii
    }

    /// Total margin added by all passes.
    pub fn radii_sum(&self) -> usize {
        self.radii_sum
    }

    /// Normalised composition of the box kernels.
    fn normalized_kernel(&self) -> Vec<f64> {
        self.sub_radii
            .iter()
            .fold(vec![1.0], |acc, &r| convolve(&acc, &box_weights(r)))
    }
}

// ============================================================================
// ComboTable
// ============================================================================

/// Ordered map from target radius to [`Combo`].
#[derive(Clone, Debug, PartialEq)]
pub struct ComboTable {
    entries: Vec<(f32, Combo)>,
}

impl ComboTable {
    /// Parse a table with 2-4 sub-radii per row.
    pub fn parse(text: &str) -> Result<Self> {
        ComboTable::parse_rows(text, COMPOSITE_PASSES)
    }

    /// Parse a table with exactly 2 sub-radii per row.
    pub fn parse_double_box(text: &str) -> Result<Self> {
        ComboTable::parse_rows(text, DOUBLE_BOX_PASSES)
    }

    fn parse_rows(text: &str, passes: RangeInclusive<usize>) -> Result<Self> {
        let mut entries: Vec<(f32, Combo)> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let values = line
                .split(',')
                .map(|field| field.trim().parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| ShadowError::config(format!("line {line_no}: {e}")))?;

            let (&radius, sub_radii) = values
                .split_first()
                .ok_or_else(|| ShadowError::config(format!("line {line_no}: empty row")))?;
            if !passes.contains(&sub_radii.len()) {
                return Err(ShadowError::config(format!(
                    "line {line_no}: expected {}-{} sub-radii, got {}",
                    passes.start(),
                    passes.end(),
                    sub_radii.len()
                )));
            }
            if !radius.is_finite() || radius < 0.0 {
                return Err(ShadowError::config(format!(
                    "line {line_no}: invalid radius {radius}"
                )));
            }
            if let Some(&(previous, _)) = entries.last() {
                if radius <= previous {
                    return Err(ShadowError::config(format!(
                        "line {line_no}: radius {radius} does not follow {previous}"
                    )));
                }
            }

            let combo = Combo::new(sub_radii)
                .map_err(|e| ShadowError::config(format!("line {line_no}: {}", reason(&e))))?;
            entries.push((radius, combo));
        }

        if entries.is_empty() {
            return Err(ShadowError::config("table has no rows"));
        }
        Ok(ComboTable { entries })
    }

    /// Combo of the nearest entry at or below `radius`.
    ///
    /// `None` when `radius` lies outside the table's range.
    pub fn lookup(&self, radius: f32) -> Option<&Combo> {
        let (last, _) = self.entries.last()?;
        if radius > *last {
            return None;
        }
        let idx = self.entries.partition_point(|(r, _)| *r <= radius);
        idx.checked_sub(1).map(|i| &self.entries[i].1)
    }

    /// Target radii of all rows, ascending.
    pub fn radii(&self) -> impl Iterator<Item = f32> + '_ {
        self.entries.iter().map(|(radius, _)| *radius)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Smallest and largest radius covered.
    pub fn range(&self) -> (f32, f32) {
        match (self.entries.first(), self.entries.last()) {
            (Some((lo, _)), Some((hi, _))) => (*lo, *hi),
            _ => (0.0, 0.0),
        }
    }
}

/// Error text without the variant prefix.
fn reason(e: &ShadowError) -> String {
    match e {
        ShadowError::Config(msg) | ShadowError::Bounds(msg) => msg.clone(),
        other => other.to_string(),
    }
}

type SharedTable = std::result::Result<Arc<ComboTable>, ShadowError>;

fn load_table(name: &str, text: &str, passes: RangeInclusive<usize>) -> SharedTable {
    match ComboTable::parse_rows(text, passes) {
        Ok(table) => {
            let (lo, hi) = table.range();
            log::debug!("loaded {name} table: {} rows, radius {lo}-{hi}", table.len());
            Ok(Arc::new(table))
        }
        Err(e) => {
            log::error!("{name} table is unusable, shadows fall back to gaussian: {e}");
            Err(ShadowError::config(format!(
                "no approximation table available: {}",
                reason(&e)
            )))
        }
    }
}

fn builtin_table(kind: RendererKind) -> SharedTable {
    static COMPOSITE: OnceLock<SharedTable> = OnceLock::new();
    static DOUBLE_BOX: OnceLock<SharedTable> = OnceLock::new();

    match kind {
        RendererKind::DoubleBox => DOUBLE_BOX
            .get_or_init(|| load_table("double-box", DOUBLE_BOX_TABLE, DOUBLE_BOX_PASSES))
            .clone(),
        _ => COMPOSITE
            .get_or_init(|| load_table("composite", COMPOSITE_TABLE, COMPOSITE_PASSES))
            .clone(),
    }
}

// ============================================================================
// Renderer
// ============================================================================

#[derive(Clone, Debug)]
pub struct CompositeShadowRenderer {
    kind: RendererKind,
    table: SharedTable,
    boxes: BoxShadowRenderer,
    fallback: GaussianShadowRenderer,
}

impl Default for CompositeShadowRenderer {
    fn default() -> Self {
        CompositeShadowRenderer::new()
    }
}

impl CompositeShadowRenderer {
    /// Renderer using the built-in 2-4 pass table.
    pub fn new() -> Self {
        CompositeShadowRenderer::from_table(RendererKind::Composite, builtin_table(RendererKind::Composite))
    }

    /// Renderer using the built-in two-pass table.
    pub fn double_box() -> Self {
        CompositeShadowRenderer::from_table(RendererKind::DoubleBox, builtin_table(RendererKind::DoubleBox))
    }

    /// Renderer using a caller-supplied table.
    pub fn with_table(table: ComboTable) -> Self {
        CompositeShadowRenderer::from_table(RendererKind::Composite, Ok(Arc::new(table)))
    }

    /// Renderer loading its table from `text` the way the built-in ones load.
    #[cfg(test)]
    fn from_table_text(kind: RendererKind, text: &str) -> Self {
        let passes = match kind {
            RendererKind::DoubleBox => DOUBLE_BOX_PASSES,
            _ => COMPOSITE_PASSES,
        };
        CompositeShadowRenderer::from_table(kind, load_table(kind.name(), text, passes))
    }

    fn from_table(kind: RendererKind, table: SharedTable) -> Self {
        CompositeShadowRenderer {
            kind,
            table,
            boxes: BoxShadowRenderer::new(),
            fallback: GaussianShadowRenderer::new(),
        }
    }

    /// Replace the engine used outside the table's range.
    pub fn with_fallback(mut self, fallback: GaussianShadowRenderer) -> Self {
        self.fallback = fallback;
        self
    }

    /// The table in use, or the error that prevented loading it.
    pub fn table(&self) -> Result<&ComboTable> {
        match &self.table {
            Ok(table) => Ok(table.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Combo for `radius`, or `None` when the Gaussian fallback applies.
    pub fn combo(&self, radius: f32) -> Option<&Combo> {
        let table = self.table.as_ref().ok()?;
        let combo = table.lookup(radius);
        if combo.is_none() {
            log::debug!(
                "radius {radius} outside the {} table, using gaussian",
                self.kind
            );
        }
        combo
    }
}

impl ShadowRenderer for CompositeShadowRenderer {
    fn kind(&self) -> RendererKind {
        self.kind
    }

    fn padding(&self, attr: &ShadowAttributes) -> Result<usize> {
        attr.validate()?;
        match self.combo(attr.kernel_radius()) {
            Some(combo) => Ok(combo.radii_sum()),
            None => self.fallback.padding(attr),
        }
    }

    /// Composition of the box kernels, scaled to `0x10000`.
    ///
    /// Each box pass rounds to 8 bits, so the rendered shadow only follows
    /// this kernel approximately.
    fn kernel(&self, attr: &ShadowAttributes) -> Result<GaussianKernel> {
        attr.validate()?;
        match self.combo(attr.kernel_radius()) {
            Some(combo) => GaussianKernel::from_normalized(&combo.normalized_kernel()),
            None => self.fallback.kernel(attr),
        }
    }

    fn create_shadow_into(
        &self,
        src: &PixelBuffer,
        dst: &mut PixelBuffer,
        attr: &ShadowAttributes,
    ) -> Result<()> {
        check_source(src)?;
        attr.validate()?;
        let Some(combo) = self.combo(attr.kernel_radius()) else {
            return self.fallback.create_shadow_into(src, dst, attr);
        };

        let margin = combo.radii_sum();
        let (mut w, mut h) = (src.width(), src.height());
        let (out_w, out_h) = padded_size(w, h, margin)?;
        check_destination(dst, out_w, out_h)?;
        log::trace!(
            "{} shadow: radius {} as passes {:?}",
            self.kind,
            attr.kernel_radius(),
            combo.sub_radii()
        );

        let radii = combo.sub_radii();
        let last = radii.len() - 1;
        let opaque = attr.with_color(attr.color().opaque());
        // Only the final pass applies the shadow opacity.
        let pass = |i: usize| {
            let base = if i == last { *attr } else { opaque };
            base.with_kernel_radius(radii[i])
        };

        self.boxes
            .create_shadow_at(src, dst, margin, margin, &pass(0))?;
        let grow = box_extent(radii[0]);
        let (mut x, mut y) = (margin - grow, margin - grow);
        w += 2 * grow;
        h += 2 * grow;

        for (i, &radius) in radii.iter().enumerate().skip(1) {
            self.boxes.apply_shadow(dst, x, y, w, h, &pass(i))?;
            let grow = box_extent(radius);
            x -= grow;
            y -= grow;
            w += 2 * grow;
            h += 2 * grow;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Rgba;

    #[test]
    fn test_combo_drops_zeros_and_sorts() {
        let combo = Combo::new(&[2.5, 0.0, 1.2]).unwrap();
        assert_eq!(combo.sub_radii(), &[1.2, 2.5]);
        assert_eq!(combo.radii_sum(), 5);

        assert!(Combo::new(&[0.0, 0.0]).unwrap_err().is_config());
        assert!(Combo::new(&[1.0, -1.0]).is_err());
        assert!(Combo::new(&[1.0, f32::NAN]).is_err());
    }

    #[test]
    fn test_parse_table() {
        let text = "# header\n\n1.0, 0, 0.5\n2.0,1.0,1.0,0.5\n 4.0,1.5,1.5,1.5,1.5 \n";
        let table = ComboTable::parse(text).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.range(), (1.0, 4.0));
        assert_eq!(table.lookup(1.0).unwrap().sub_radii(), &[0.5]);
        assert_eq!(table.lookup(3.9).unwrap().sub_radii(), &[0.5, 1.0, 1.0]);
        assert_eq!(table.lookup(4.0).unwrap().radii_sum(), 8);
        assert!(table.lookup(0.9).is_none());
        assert!(table.lookup(4.1).is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_tables() {
        let bad = [
            "",
            "# only comments\n",
            "1.0,0.5\n",
            "1.0,1,1,1,1,1\n",
            "1.0,0,0\n",
            "1.0,0.5,x\n",
            "2.0,1,1\n1.0,1,1\n",
            "1.0,1,1\n1.0,1,1\n",
            "-1.0,1,1\n",
            "1.0,1,5000\n",
        ];
        for text in bad {
            assert!(ComboTable::parse(text).unwrap_err().is_config(), "{text:?}");
        }
        assert!(ComboTable::parse_double_box("1.0,0.5,0.5,0.5\n").is_err());
        assert!(ComboTable::parse_double_box("1.0,0.5,0.5\n").is_ok());
    }

    #[test]
    fn test_builtin_tables_load() {
        let composite = CompositeShadowRenderer::new();
        let table = composite.table().unwrap();
        assert_eq!(table.len(), 199);
        assert_eq!(table.range(), (1.0, 100.0));

        let double = CompositeShadowRenderer::double_box();
        assert_eq!(double.kind(), RendererKind::DoubleBox);
        let table = double.table().unwrap();
        assert_eq!(table.len(), 199);
        assert!(table.entries.iter().all(|(_, c)| c.sub_radii().len() <= 2));
        let radii: Vec<f32> = table.radii().collect();
        assert_eq!(radii.len(), 199);
        assert_eq!(radii[1] - radii[0], 0.5);
    }

    #[test]
    fn test_broken_table_falls_back_to_gaussian() {
        let gaussian = GaussianShadowRenderer::new();
        let src = PixelBuffer::filled(6, 6, 0xff00_0000);
        let attr = ShadowAttributes::with_opacity(4.0, 0.75);

        for (kind, text) in [
            (RendererKind::Composite, "1.0,0.5,oops\n"),
            (RendererKind::DoubleBox, "1.0,0.5,0.5,0.5\n"),
        ] {
            let renderer = CompositeShadowRenderer::from_table_text(kind, text);
            let err = renderer.table().unwrap_err();
            assert!(err.is_config());
            assert!(
                err.to_string().contains("no approximation table available: line 1"),
                "{err}"
            );

            assert!(renderer.combo(4.0).is_none());
            assert_eq!(renderer.padding(&attr), gaussian.padding(&attr));
            assert_eq!(renderer.kernel(&attr), gaussian.kernel(&attr));
            assert_eq!(
                renderer.create_shadow(&src, &attr).unwrap(),
                gaussian.create_shadow(&src, &attr).unwrap()
            );
        }
    }

    #[test]
    fn test_single_pass_matches_box() {
        let table = ComboTable::parse("5.0,0,3.0\n").unwrap();
        let renderer = CompositeShadowRenderer::with_table(table);
        let src = PixelBuffer::filled(6, 4, 0xff00_0000);
        let attr = ShadowAttributes::new(5.0, Rgba::new(9, 8, 7, 150));

        let composite = renderer.create_shadow(&src, &attr).unwrap();
        let boxed = BoxShadowRenderer::new()
            .create_shadow(&src, &attr.with_kernel_radius(3.0))
            .unwrap();
        assert_eq!(composite, boxed);
    }

    #[test]
    fn test_passes_grow_the_shadow() {
        let table = ComboTable::parse("4.0,2.0,1.0\n").unwrap();
        let renderer = CompositeShadowRenderer::with_table(table);
        let attr = ShadowAttributes::with_opacity(4.0, 1.0);
        assert_eq!(renderer.padding(&attr).unwrap(), 3);
        assert_eq!(renderer.kernel(&attr).unwrap().len(), 7);

        let src = PixelBuffer::filled(8, 8, 0xff00_0000);
        let shadow = renderer.create_shadow(&src, &attr).unwrap();
        assert_eq!((shadow.width(), shadow.height()), (14, 14));
        assert!(shadow.alpha(0, 7) > 0);
        assert_eq!(shadow.alpha(7, 7), 255);
    }

    #[test]
    fn test_out_of_range_falls_back_to_gaussian() {
        let renderer = CompositeShadowRenderer::new();
        let gaussian = GaussianShadowRenderer::new();
        let src = PixelBuffer::filled(5, 5, 0xff00_0000);

        for radius in [0.6, 120.0] {
            let attr = ShadowAttributes::with_opacity(radius, 0.5);
            assert!(renderer.combo(radius).is_none());
            assert_eq!(renderer.padding(&attr), gaussian.padding(&attr));
            assert_eq!(
                renderer.create_shadow(&src, &attr).unwrap(),
                gaussian.create_shadow(&src, &attr).unwrap()
            );
        }
    }

    #[test]
    fn test_kernel_is_normalised_composition() {
        let renderer = CompositeShadowRenderer::new();
        let attr = ShadowAttributes::with_opacity(12.0, 1.0);
        let kernel = renderer.kernel(&attr).unwrap();
        let combo = renderer.combo(12.0).unwrap();

        assert_eq!(kernel.kernel_radius(), combo.radii_sum());
        assert!((kernel.sum() as i64 - 65536).abs() < kernel.len() as i64);
        let w = kernel.weights();
        let centre = kernel.kernel_radius();
        assert!(w[centre] >= w[0]);
        assert_eq!(w[centre - 1], w[centre + 1]);
    }

    #[test]
    fn test_in_place_is_unsupported() {
        let renderer = CompositeShadowRenderer::double_box();
        let mut buffer = PixelBuffer::new(20, 20);
        let err = renderer
            .apply_shadow(&mut buffer, 5, 5, 5, 5, &ShadowAttributes::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "DoubleBoxShadowRenderer does not support apply_shadow"
        );
    }
}
