use crate::math::{element::Element, ops::TensorOps, tensor::Tensor};

/// Flattened input plus a borrow of the weights used in the forward call.
#[derive(Debug)]
pub struct AffineCache<'a, T> {
    x: Tensor<T>,
    input_shape: Vec<usize>,
    w: &'a Tensor<T>,
}

/// Computes `x · w + b`.
///
/// `x` has shape (N, d1, ..., dk) and is flattened to (N, D) with
/// D = d1 · ... · dk; `w` is (D, M) and `b` is (M,). Output is (N, M).
pub fn affine_forward<'a, T: Element, O: TensorOps<T>>(
    ops: &O,
    x: &Tensor<T>,
    w: &'a Tensor<T>,
    b: &Tensor<T>,
) -> (Tensor<T>, AffineCache<'a, T>) {
    let n = x.shape()[0];
    let d = if n == 0 { 0 } else { x.len() / n };
    let flat = x.clone().reshaped(&[n, d]);

    let mut out = ops.matmul(&flat, w);
    let m = b.len();
    for row in out.values_mut().chunks_mut(m) {
        for (o, &bias) in row.iter_mut().zip(b.values()) {
            *o += bias;
        }
    }

    let cache = AffineCache {
        x: flat,
        input_shape: x.shape().to_vec(),
        w,
    };
    (out, cache)
}

/// Returns (dx, dw, db); `dx` has the original, unflattened input shape.
pub fn affine_backward<T: Element, O: TensorOps<T>>(
    ops: &O,
    dout: &Tensor<T>,
    cache: AffineCache<'_, T>,
) -> (Tensor<T>, Tensor<T>, Tensor<T>) {
    let dx = ops.matmul_nt(dout, cache.w).reshaped(&cache.input_shape);
    let dw = ops.matmul_tn(&cache.x, dout);

    let m = dout.shape()[1];
    let mut db = Tensor::zeros(&[m]);
    for row in dout.values().chunks(m) {
        for (acc, &d) in db.values_mut().iter_mut().zip(row) {
            *acc += d;
        }
    }

    (dx, dw, db)
}
