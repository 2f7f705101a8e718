use super::Complex;

include!(concat!(env!("OUT_DIR"), "/twiddle_table.rs"));

/// Largest supported transform length.
pub const MAX_LEN: usize = 1 << TWIDDLE_DEPTH;

/// In-place forward complex FFT.
///
/// Iterative decimation-in-time radix-2 transform with bit-reversed input
/// reordering and natural order output. Unnormalized:
/// `X[k] = sum_n x[n] exp(-2 pi i k n / N)`.
///
/// # Args
/// * `x` - Data to transform. The length must be a power of two no larger
///   than [`MAX_LEN`].
///
/// # Panics
/// If the length is not supported.
pub fn fft(x: &mut [Complex<f32>]) {
    let n = x.len();
    assert!(n.is_power_of_two() && n <= MAX_LEN);
    if n < 2 {
        return;
    }
    bit_reverse(x);

    let mut len = 2;
    while len <= n {
        let half = len >> 1;
        let stride = MAX_LEN / len;
        for chunk in x.chunks_exact_mut(len) {
            let (lo, hi) = chunk.split_at_mut(half);
            for (k, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                let (re, im) = TWIDDLE[k * stride];
                let t = *b * Complex(re, im);
                *b = *a - t;
                *a = *a + t;
            }
        }
        len <<= 1;
    }
}

fn bit_reverse(x: &mut [Complex<f32>]) {
    let shift = usize::BITS - x.len().trailing_zeros();
    for i in 0..x.len() {
        let j = i.reverse_bits() >> shift;
        if j > i {
            x.swap(i, j);
        }
    }
}
