//! Discrete blur kernels.
//!
//! Weights are integers in a 16.16 fixed-point scale (`0x10000` ~ 1.0), so
//! the pixel loops only ever multiply and add `u32`s.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::attributes::MAX_KERNEL_RADIUS;
use crate::error::{Result, ShadowError};

/// Fixed-point scale of kernel weights.
pub const KERNEL_SCALE: f64 = 65536.0;

/// A symmetric, odd-length integer kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GaussianKernel {
    weights: Vec<u32>,
    sum: u32,
}

impl GaussianKernel {
    /// Build a kernel from raw weights.
    ///
    /// # Errors
    /// `Config` if the weight count is even, the weights sum to zero, or the
    /// sum is too large to accumulate a full 8-bit line in `u32`.
    pub fn from_weights(weights: Vec<u32>) -> Result<Self> {
        if weights.len() % 2 == 0 {
            return Err(ShadowError::config(format!(
                "kernel must have an odd number of weights, got {}",
                weights.len()
            )));
        }
        let sum: u64 = weights.iter().map(|&w| w as u64).sum();
        if sum == 0 {
            return Err(ShadowError::config("kernel weights sum to zero"));
        }
        if sum > (u32::MAX / 256) as u64 {
            return Err(ShadowError::config(format!(
                "kernel weight sum {sum} overflows the accumulator"
            )));
        }
        Ok(GaussianKernel {
            weights,
            sum: sum as u32,
        })
    }

    /// The single-tap kernel: no blur.
    pub fn identity() -> Self {
        GaussianKernel {
            weights: vec![KERNEL_SCALE as u32],
            sum: KERNEL_SCALE as u32,
        }
    }

    /// Gaussian kernel for a shadow radius.
    ///
    /// The kernel radius is `round(radius)` and `sigma = radius / 3`, so the
    /// taps reach three standard deviations out.
    ///
    /// # Errors
    /// `Config` for a negative or non-finite radius.
    pub fn gaussian(radius: f32) -> Result<Self> {
        if !(0.0..=MAX_KERNEL_RADIUS).contains(&radius) {
            return Err(ShadowError::config(format!(
                "kernel radius must be in 0..={MAX_KERNEL_RADIUS}, got {radius}"
            )));
        }
        let k = gaussian_extent(radius);
        if k == 0 {
            return Ok(GaussianKernel::identity());
        }

        let sigma = radius as f64 / 3.0;
        let denom = 2.0 * sigma * sigma;
        let exps: Vec<f64> = (0..=2 * k)
            .map(|i| {
                let x = i as f64 - k as f64;
                (-x * x / denom).exp()
            })
            .collect();
        let total: f64 = exps.iter().sum();

        let weights = exps
            .iter()
            .map(|e| (KERNEL_SCALE * e / total).round() as u32)
            .collect();
        GaussianKernel::from_weights(weights)
    }

    /// Like [`GaussianKernel::gaussian`], but shared through a process-wide
    /// cache keyed by the radius.
    pub fn cached(radius: f32) -> Result<Arc<Self>> {
        static CACHE: OnceLock<RwLock<HashMap<u32, Arc<GaussianKernel>>>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));
        let key = radius.to_bits();

        if let Ok(map) = cache.read() {
            if let Some(kernel) = map.get(&key) {
                return Ok(Arc::clone(kernel));
            }
        }

        let kernel = Arc::new(GaussianKernel::gaussian(radius)?);
        log::trace!("caching gaussian kernel for radius {radius} ({} taps)", kernel.len());
        match cache.write() {
            Ok(mut map) => Ok(Arc::clone(map.entry(key).or_insert(kernel))),
            // A poisoned cache only loses sharing, never correctness.
            Err(_) => Ok(kernel),
        }
    }

    /// Scale normalised weights (summing to ~1.0) to the fixed-point range.
    ///
    /// # Errors
    /// Same as [`GaussianKernel::from_weights`].
    pub fn from_normalized(weights: &[f64]) -> Result<Self> {
        GaussianKernel::from_weights(
            weights
                .iter()
                .map(|w| (w.max(0.0) * KERNEL_SCALE).round() as u32)
                .collect(),
        )
    }

    #[inline]
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    #[inline]
    pub fn sum(&self) -> u32 {
        self.sum
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Taps on each side of the centre.
    #[inline]
    pub fn kernel_radius(&self) -> usize {
        (self.weights.len() - 1) / 2
    }

    /// Weights divided by their sum.
    pub fn normalized(&self) -> Vec<f64> {
        let sum = self.sum as f64;
        self.weights.iter().map(|&w| w as f64 / sum).collect()
    }
}

/// Kernel radius used by the Gaussian engine for a shadow radius.
#[inline]
pub(crate) fn gaussian_extent(radius: f32) -> usize {
    (radius + 0.5) as usize
}

/// Full discrete convolution of two 1D kernels.
///
/// The result has `a.len() + b.len() - 1` taps.
pub fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_kernel_shape() {
        let kernel = GaussianKernel::gaussian(3.0).unwrap();
        assert_eq!(kernel.len(), 7);
        assert_eq!(kernel.kernel_radius(), 3);

        let w = kernel.weights();
        for i in 0..3 {
            assert_eq!(w[i], w[6 - i], "kernel must be symmetric");
            assert!(w[i] < w[i + 1], "kernel must rise toward the centre");
        }
        assert!((kernel.sum() as i64 - 65536).abs() <= 4);
    }

    #[test]
    fn test_radius_rounds_to_extent() {
        assert_eq!(GaussianKernel::gaussian(2.4).unwrap().kernel_radius(), 2);
        assert_eq!(GaussianKernel::gaussian(2.5).unwrap().kernel_radius(), 3);
        assert_eq!(GaussianKernel::gaussian(0.4).unwrap(), GaussianKernel::identity());
        assert_eq!(GaussianKernel::gaussian(0.0).unwrap().weights(), &[65536]);
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(GaussianKernel::gaussian(-1.0).unwrap_err().is_config());
        assert!(GaussianKernel::gaussian(f32::NAN).is_err());
        assert!(GaussianKernel::gaussian(1e20).unwrap_err().is_config());
        assert!(GaussianKernel::from_weights(vec![1, 2]).is_err());
        assert!(GaussianKernel::from_weights(vec![0, 0, 0]).is_err());
        assert!(GaussianKernel::from_weights(vec![u32::MAX]).is_err());
    }

    #[test]
    fn test_cache_shares_instances() {
        let a = GaussianKernel::cached(4.25).unwrap();
        let b = GaussianKernel::cached(4.25).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, GaussianKernel::gaussian(4.25).unwrap());
    }

    #[test]
    fn test_convolve_boxes() {
        let third = 1.0 / 3.0;
        let tri = convolve(&[third; 3], &[third; 3]);
        assert_eq!(tri.len(), 5);
        let expected = [1.0, 2.0, 3.0, 2.0, 1.0];
        for (got, want) in tri.iter().zip(expected) {
            assert!((got - want / 9.0).abs() < 1e-12);
        }
        assert!(convolve(&[], &[1.0]).is_empty());

        let kernel = GaussianKernel::from_normalized(&tri).unwrap();
        assert_eq!(kernel.weights()[2], 21845);
        assert_eq!(kernel.kernel_radius(), 2);
    }
}
