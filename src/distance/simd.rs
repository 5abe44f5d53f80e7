//! SIMD distance implementations with runtime feature detection.
//!
//! - **AVX2+FMA** (x86_64): 8 floats per iteration
//! - **NEON** (aarch64): 4 floats per iteration
//! - **Scalar**: fallback for all other platforms
//!
//! The public entry points pick the fastest available path at runtime and
//! match the scalar reference to within floating-point reassociation error.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

use super::scalar;

// =============================================================================
// AVX2+FMA implementations (x86_64)
// =============================================================================

/// Squared Euclidean distance using AVX2 with fused multiply-add.
///
/// # Safety
/// The caller must ensure the CPU supports AVX2 and FMA.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
#[inline]
pub unsafe fn euclidean_distance_squared_avx2(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let mut i = 0;
    let mut sum = _mm256_setzero_ps();

    while i + 8 <= len {
        let va = _mm256_loadu_ps(a.as_ptr().add(i));
        let vb = _mm256_loadu_ps(b.as_ptr().add(i));
        let diff = _mm256_sub_ps(va, vb);
        sum = _mm256_fmadd_ps(diff, diff, sum);
        i += 8;
    }

    let mut total = horizontal_sum_avx2(sum);

    while i < len {
        let diff = a[i] - b[i];
        total += diff * diff;
        i += 1;
    }

    total
}

/// Manhattan distance using AVX2.
///
/// # Safety
/// The caller must ensure the CPU supports AVX2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
pub unsafe fn manhattan_distance_avx2(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let mut i = 0;
    let mut sum = _mm256_setzero_ps();
    // Clears the sign bit, giving |x|.
    let abs_mask = _mm256_castsi256_ps(_mm256_set1_epi32(0x7fff_ffff));

    while i + 8 <= len {
        let va = _mm256_loadu_ps(a.as_ptr().add(i));
        let vb = _mm256_loadu_ps(b.as_ptr().add(i));
        let diff = _mm256_sub_ps(va, vb);
        sum = _mm256_add_ps(sum, _mm256_and_ps(diff, abs_mask));
        i += 8;
    }

    let mut total = horizontal_sum_avx2(sum);

    while i < len {
        total += (a[i] - b[i]).abs();
        i += 1;
    }

    total
}

/// Horizontal sum of all 8 lanes of a 256-bit register.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn horizontal_sum_avx2(v: __m256) -> f32 {
    let hi = _mm256_extractf128_ps(v, 1);
    let lo = _mm256_castps256_ps128(v);
    let sum128 = _mm_add_ps(lo, hi);
    let sum64 = _mm_add_ps(sum128, _mm_movehl_ps(sum128, sum128));
    let sum32 = _mm_add_ss(sum64, _mm_shuffle_ps(sum64, sum64, 1));
    _mm_cvtss_f32(sum32)
}

// =============================================================================
// NEON implementations (aarch64)
// =============================================================================

/// Squared Euclidean distance using NEON.
///
/// # Safety
/// NEON is mandatory on aarch64, so this is always safe to call there.
#[cfg(target_arch = "aarch64")]
#[inline]
pub unsafe fn euclidean_distance_squared_neon(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let mut i = 0;
    let mut sum = vdupq_n_f32(0.0);

    while i + 4 <= len {
        let va = vld1q_f32(a.as_ptr().add(i));
        let vb = vld1q_f32(b.as_ptr().add(i));
        let diff = vsubq_f32(va, vb);
        sum = vfmaq_f32(sum, diff, diff);
        i += 4;
    }

    let mut total = vaddvq_f32(sum);

    while i < len {
        let diff = a[i] - b[i];
        total += diff * diff;
        i += 1;
    }

    total
}

/// Manhattan distance using NEON.
///
/// # Safety
/// NEON is mandatory on aarch64, so this is always safe to call there.
#[cfg(target_arch = "aarch64")]
#[inline]
pub unsafe fn manhattan_distance_neon(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let mut i = 0;
    let mut sum = vdupq_n_f32(0.0);

    while i + 4 <= len {
        let va = vld1q_f32(a.as_ptr().add(i));
        let vb = vld1q_f32(b.as_ptr().add(i));
        sum = vaddq_f32(sum, vabdq_f32(va, vb));
        i += 4;
    }

    let mut total = vaddvq_f32(sum);

    while i < len {
        total += (a[i] - b[i]).abs();
        i += 1;
    }

    total
}

// =============================================================================
// Auto-dispatching public API
// =============================================================================

/// Euclidean distance with automatic SIMD dispatch.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    euclidean_distance_squared(a, b).sqrt()
}

/// Squared Euclidean distance with automatic SIMD dispatch.
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            // SAFETY: feature support verified above.
            return unsafe { euclidean_distance_squared_avx2(a, b) };
        }
        return scalar::euclidean_distance_squared(a, b);
    }

    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: NEON is mandatory on aarch64.
        return unsafe { euclidean_distance_squared_neon(a, b) };
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    scalar::euclidean_distance_squared(a, b)
}

/// Manhattan distance with automatic SIMD dispatch.
#[inline]
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            // SAFETY: feature support verified above.
            return unsafe { manhattan_distance_avx2(a, b) };
        }
        return scalar::manhattan_distance(a, b);
    }

    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: NEON is mandatory on aarch64.
        return unsafe { manhattan_distance_neon(a, b) };
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    scalar::manhattan_distance(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        let a = vec![0.0; 8];
        let mut b = vec![0.0; 8];
        b[0] = 3.0;
        b[1] = 4.0;

        assert!((euclidean_distance(&a, &b) - 5.0).abs() < 1e-5);
        assert!((euclidean_distance_squared(&a, &b) - 25.0).abs() < 1e-5);
        assert!((manhattan_distance(&a, &b) - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_tail_handling() {
        // Lengths that exercise both the vectorized body and the scalar tail.
        for dim in [1usize, 3, 7, 8, 9, 15, 16, 17, 64, 100] {
            let a: Vec<f32> = (0..dim).map(|i| i as f32 * 0.5).collect();
            let b: Vec<f32> = (0..dim).map(|i| (dim - i) as f32 * 0.25).collect();

            let diff_l2 =
                (euclidean_distance_squared(&a, &b) - scalar::euclidean_distance_squared(&a, &b))
                    .abs();
            let diff_l1 = (manhattan_distance(&a, &b) - scalar::manhattan_distance(&a, &b)).abs();

            assert!(diff_l2 < 1e-3, "L2 mismatch at dim {dim}: {diff_l2}");
            assert!(diff_l1 < 1e-3, "L1 mismatch at dim {dim}: {diff_l1}");
        }
    }
}
