use crate::layers::conv::ConvParam;
use crate::layers::pool::PoolParam;
use crate::math::element::Element;
use crate::math::tensor::Tensor;

/// The numerical kernels the layer primitives are built on.
///
/// Every primitive goes through this trait, so a different backend (blocked
/// loops, BLAS, an accelerator) can be dropped in without touching the
/// layers or the network. Implementations must be deterministic: the same
/// inputs produce bit-identical outputs.
///
/// Shapes handed to these methods have already been validated by the caller;
/// implementations may panic on inconsistent shapes.
pub trait TensorOps<T: Element> {
    /// (m, k) · (k, n) → (m, n)
    fn matmul(&self, a: &Tensor<T>, b: &Tensor<T>) -> Tensor<T>;

    /// (k, m)ᵀ · (k, n) → (m, n)
    fn matmul_tn(&self, a: &Tensor<T>, b: &Tensor<T>) -> Tensor<T>;

    /// (m, k) · (n, k)ᵀ → (m, n)
    fn matmul_nt(&self, a: &Tensor<T>, b: &Tensor<T>) -> Tensor<T>;

    /// Cross-correlation of `x` (N, C, H, W) with filters `w` (F, C, HH, WW)
    /// plus a per-filter bias `b` (F,).
    fn conv2d(&self, x: &Tensor<T>, w: &Tensor<T>, b: &Tensor<T>, param: ConvParam) -> Tensor<T>;

    /// Returns (dx, dw, db) for the convolution above.
    fn conv2d_backward(
        &self,
        dout: &Tensor<T>,
        x: &Tensor<T>,
        w: &Tensor<T>,
        param: ConvParam,
    ) -> (Tensor<T>, Tensor<T>, Tensor<T>);

    /// Windowed max over the spatial axes of `x` (N, C, H, W). Returns the
    /// pooled tensor and, for every output element, the flat index into `x`
    /// of the value that was selected.
    fn max_pool(&self, x: &Tensor<T>, param: PoolParam) -> (Tensor<T>, Vec<usize>);

    /// Routes `dout` back onto the recorded argmax positions of an input of
    /// shape `input_shape`; every other position gets zero.
    fn max_pool_backward(&self, dout: &Tensor<T>, argmax: &[usize], input_shape: &[usize]) -> Tensor<T>;
}

/// Straightforward nested-loop backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveOps;

fn dims2<T: Element>(t: &Tensor<T>) -> (usize, usize) {
    assert_eq!(t.ndim(), 2, "expected a matrix, got shape {:?}", t.shape());
    (t.shape()[0], t.shape()[1])
}

fn dims4<T: Element>(t: &Tensor<T>) -> (usize, usize, usize, usize) {
    assert_eq!(t.ndim(), 4, "expected a 4-d tensor, got shape {:?}", t.shape());
    let s = t.shape();
    (s[0], s[1], s[2], s[3])
}

/// Maps an output coordinate plus kernel offset back to an unpadded input
/// coordinate, or `None` when it lands in the zero padding.
fn source_index(out: usize, offset: usize, stride: usize, pad: usize, size: usize) -> Option<usize> {
    let pos = out * stride + offset;
    if pos < pad || pos - pad >= size {
        None
    } else {
        Some(pos - pad)
    }
}

impl<T: Element> TensorOps<T> for NaiveOps {
    fn matmul(&self, a: &Tensor<T>, b: &Tensor<T>) -> Tensor<T> {
        let (m, k) = dims2(a);
        let (k2, n) = dims2(b);
        if k != k2 {
            panic!("matrices are of incorrect sizes: {:?} x {:?}", a.shape(), b.shape())
        }

        let (av, bv) = (a.values(), b.values());
        let mut res = Tensor::zeros(&[m, n]);
        let out = res.values_mut();
        for i in 0..m {
            for j in 0..n {
                let mut sum = T::ZERO;
                for p in 0..k {
                    sum += av[i * k + p] * bv[p * n + j];
                }
                out[i * n + j] = sum;
            }
        }

        res
    }

    fn matmul_tn(&self, a: &Tensor<T>, b: &Tensor<T>) -> Tensor<T> {
        let (k, m) = dims2(a);
        let (k2, n) = dims2(b);
        if k != k2 {
            panic!("matrices are of incorrect sizes: {:?}ᵀ x {:?}", a.shape(), b.shape())
        }

        let (av, bv) = (a.values(), b.values());
        let mut res = Tensor::zeros(&[m, n]);
        let out = res.values_mut();
        for i in 0..m {
            for j in 0..n {
                let mut sum = T::ZERO;
                for p in 0..k {
                    sum += av[p * m + i] * bv[p * n + j];
                }
                out[i * n + j] = sum;
            }
        }

        res
    }

    fn matmul_nt(&self, a: &Tensor<T>, b: &Tensor<T>) -> Tensor<T> {
        let (m, k) = dims2(a);
        let (n, k2) = dims2(b);
        if k != k2 {
            panic!("matrices are of incorrect sizes: {:?} x {:?}ᵀ", a.shape(), b.shape())
        }

        let (av, bv) = (a.values(), b.values());
        let mut res = Tensor::zeros(&[m, n]);
        let out = res.values_mut();
        for i in 0..m {
            for j in 0..n {
                let mut sum = T::ZERO;
                for p in 0..k {
                    sum += av[i * k + p] * bv[j * k + p];
                }
                out[i * n + j] = sum;
            }
        }

        res
    }

    fn conv2d(&self, x: &Tensor<T>, w: &Tensor<T>, b: &Tensor<T>, param: ConvParam) -> Tensor<T> {
        let (n, c, h, wd) = dims4(x);
        let (f, c2, hh, ww) = dims4(w);
        assert_eq!(c, c2, "input has {c} channels but filters expect {c2}");
        assert_eq!(b.shape(), &[f], "bias must have one entry per filter");

        let h_out = param.output_dim(h, hh);
        let w_out = param.output_dim(wd, ww);
        let mut out = Tensor::zeros(&[n, f, h_out, w_out]);

        for ni in 0..n {
            for fi in 0..f {
                let bias = b.values()[fi];
                for i in 0..h_out {
                    for j in 0..w_out {
                        let mut acc = bias;
                        for ci in 0..c {
                            for di in 0..hh {
                                let Some(hi) = source_index(i, di, param.stride, param.pad, h) else {
                                    continue;
                                };
                                for dj in 0..ww {
                                    let Some(wi) = source_index(j, dj, param.stride, param.pad, wd) else {
                                        continue;
                                    };
                                    acc += x[[ni, ci, hi, wi]] * w[[fi, ci, di, dj]];
                                }
                            }
                        }
                        out[[ni, fi, i, j]] = acc;
                    }
                }
            }
        }

        out
    }

    fn conv2d_backward(
        &self,
        dout: &Tensor<T>,
        x: &Tensor<T>,
        w: &Tensor<T>,
        param: ConvParam,
    ) -> (Tensor<T>, Tensor<T>, Tensor<T>) {
        let (n, c, h, wd) = dims4(x);
        let (f, _, hh, ww) = dims4(w);
        let (_, _, h_out, w_out) = dims4(dout);

        let mut dx = Tensor::zeros(x.shape());
        let mut dw = Tensor::zeros(w.shape());
        let mut db = Tensor::zeros(&[f]);

        for ni in 0..n {
            for fi in 0..f {
                for i in 0..h_out {
                    for j in 0..w_out {
                        let d = dout[[ni, fi, i, j]];
                        db[[fi]] += d;
                        for ci in 0..c {
                            for di in 0..hh {
                                let Some(hi) = source_index(i, di, param.stride, param.pad, h) else {
                                    continue;
                                };
                                for dj in 0..ww {
                                    let Some(wi) = source_index(j, dj, param.stride, param.pad, wd) else {
                                        continue;
                                    };
                                    dw[[fi, ci, di, dj]] += d * x[[ni, ci, hi, wi]];
                                    dx[[ni, ci, hi, wi]] += d * w[[fi, ci, di, dj]];
                                }
                            }
                        }
                    }
                }
            }
        }

        (dx, dw, db)
    }

    fn max_pool(&self, x: &Tensor<T>, param: PoolParam) -> (Tensor<T>, Vec<usize>) {
        let (n, c, h, wd) = dims4(x);
        let (h_out, w_out) = param
            .output_dims(h, wd)
            .unwrap_or_else(|| panic!("pool window does not fit input of shape {:?}", x.shape()));

        let mut out = Tensor::zeros(&[n, c, h_out, w_out]);
        let mut argmax = Vec::with_capacity(out.len());
        let xv = x.values();

        for ni in 0..n {
            for ci in 0..c {
                let plane = (ni * c + ci) * h * wd;
                for i in 0..h_out {
                    for j in 0..w_out {
                        let mut best = plane + i * param.stride * wd + j * param.stride;
                        for di in 0..param.pool_height {
                            for dj in 0..param.pool_width {
                                let idx = plane + (i * param.stride + di) * wd + j * param.stride + dj;
                                // Strict comparison keeps the first maximum on ties.
                                if xv[idx] > xv[best] {
                                    best = idx;
                                }
                            }
                        }
                        out[[ni, ci, i, j]] = xv[best];
                        argmax.push(best);
                    }
                }
            }
        }

        (out, argmax)
    }

    fn max_pool_backward(&self, dout: &Tensor<T>, argmax: &[usize], input_shape: &[usize]) -> Tensor<T> {
        assert_eq!(dout.len(), argmax.len(), "one argmax entry per pooled value");

        let mut dx = Tensor::zeros(input_shape);
        let dxv = dx.values_mut();
        for (&idx, &d) in argmax.iter().zip(dout.values()) {
            dxv[idx] += d;
        }

        dx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(shape: &[usize], data: Vec<f64>) -> Tensor<f64> {
        Tensor::from_vec(shape, data).unwrap()
    }

    #[test]
    fn matmul_variants_agree() {
        let a = t(&[2, 3], vec![1., 2., 3., 4., 5., 6.]);
        let b = t(&[3, 2], vec![7., 8., 9., 10., 11., 12.]);
        let ab = NaiveOps.matmul(&a, &b);
        assert_eq!(ab.values(), &[58., 64., 139., 154.]);

        // aᵀ stored as (3, 2), bᵀ stored as (2, 3)
        let a_t = t(&[3, 2], vec![1., 4., 2., 5., 3., 6.]);
        let b_t = t(&[2, 3], vec![7., 9., 11., 8., 10., 12.]);
        assert_eq!(NaiveOps.matmul_tn(&a_t, &b), ab);
        assert_eq!(NaiveOps.matmul_nt(&a, &b_t), ab);
    }

    #[test]
    #[should_panic]
    fn matmul_rejects_bad_inner_dim() {
        let a = Tensor::<f64>::zeros(&[2, 3]);
        NaiveOps.matmul(&a, &a);
    }

    #[test]
    fn conv_with_centre_tap_is_identity() {
        let x = t(&[1, 1, 3, 3], (1..=9).map(f64::from).collect());
        let mut w = Tensor::zeros(&[1, 1, 3, 3]);
        w[[0, 0, 1, 1]] = 1.0;
        let b = t(&[1], vec![0.5]);

        let out = NaiveOps.conv2d(&x, &w, &b, ConvParam::same(3));
        assert_eq!(out.shape(), &[1, 1, 3, 3]);
        let expected: Vec<f64> = (1..=9).map(|v| v as f64 + 0.5).collect();
        assert_eq!(out.values(), expected.as_slice());
    }

    #[test]
    fn conv_sums_over_padded_window() {
        let x = t(&[1, 1, 2, 2], vec![1., 2., 3., 4.]);
        let w = t(&[1, 1, 3, 3], vec![1.0; 9]);
        let b = t(&[1], vec![0.0]);

        // Every output sees the whole 2x2 input through the padding.
        let out = NaiveOps.conv2d(&x, &w, &b, ConvParam::same(3));
        assert_eq!(out.values(), &[10., 10., 10., 10.]);
    }

    #[test]
    fn conv_backward_bias_sums_upstream() {
        let x = Tensor::<f64>::zeros(&[2, 1, 3, 3]);
        let w = Tensor::zeros(&[2, 1, 3, 3]);
        let dout = Tensor::from_vec(&[2, 2, 3, 3], vec![1.0; 36]).unwrap();

        let (dx, dw, db) = NaiveOps.conv2d_backward(&dout, &x, &w, ConvParam::same(3));
        assert_eq!(dx.shape(), x.shape());
        assert_eq!(dw.shape(), w.shape());
        assert_eq!(db.values(), &[18., 18.]);
    }

    #[test]
    fn max_pool_picks_window_max_and_first_tie() {
        let x = t(
            &[1, 1, 4, 4],
            vec![
                1., 3., 2., 2., //
                0., 2., 2., 2., //
                5., 1., 0., 0., //
                1., 1., 0., 9.,
            ],
        );
        let (out, argmax) = NaiveOps.max_pool(&x, PoolParam::halving());
        assert_eq!(out.values(), &[3., 2., 5., 9.]);
        assert_eq!(argmax, vec![1, 2, 8, 15]);

        let dout = t(&[1, 1, 2, 2], vec![1., 2., 3., 4.]);
        let dx = NaiveOps.max_pool_backward(&dout, &argmax, x.shape());
        let mut expected = vec![0.0; 16];
        expected[1] = 1.0;
        expected[2] = 2.0;
        expected[8] = 3.0;
        expected[15] = 4.0;
        assert_eq!(dx.values(), expected.as_slice());
    }

    #[test]
    fn max_pool_drops_odd_edge() {
        let x = Tensor::<f64>::zeros(&[1, 2, 5, 5]);
        let (out, argmax) = NaiveOps.max_pool(&x, PoolParam::halving());
        assert_eq!(out.shape(), &[1, 2, 2, 2]);
        assert_eq!(argmax.len(), 8);
    }
}
