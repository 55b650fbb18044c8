//! Convenience pairs that chain several primitives and carry their caches
//! together.

use crate::activation::relu::{relu_backward, relu_forward, ReluCache};
use crate::layers::affine::{affine_backward, affine_forward, AffineCache};
use crate::layers::conv::{conv_backward, conv_forward, ConvCache, ConvParam};
use crate::layers::pool::{max_pool_backward, max_pool_forward, PoolCache, PoolParam};
use crate::math::{element::Element, ops::TensorOps, tensor::Tensor};

#[derive(Debug)]
pub struct AffineReluCache<'a, T> {
    affine: AffineCache<'a, T>,
    relu: ReluCache<T>,
}

pub fn affine_relu_forward<'a, T: Element, O: TensorOps<T>>(
    ops: &O,
    x: &Tensor<T>,
    w: &'a Tensor<T>,
    b: &Tensor<T>,
) -> (Tensor<T>, AffineReluCache<'a, T>) {
    let (z, affine) = affine_forward(ops, x, w, b);
    let (out, relu) = relu_forward(z);
    (out, AffineReluCache { affine, relu })
}

/// Returns (dx, dw, db).
pub fn affine_relu_backward<T: Element, O: TensorOps<T>>(
    ops: &O,
    dout: &Tensor<T>,
    cache: AffineReluCache<'_, T>,
) -> (Tensor<T>, Tensor<T>, Tensor<T>) {
    let dz = relu_backward(dout, cache.relu);
    affine_backward(ops, &dz, cache.affine)
}

#[derive(Debug)]
pub struct ConvReluPoolCache<'a, T> {
    conv: ConvCache<'a, T>,
    relu: ReluCache<T>,
    pool: PoolCache,
}

/// conv → ReLU → max pool.
pub fn conv_relu_pool_forward<'a, T: Element, O: TensorOps<T>>(
    ops: &O,
    x: &'a Tensor<T>,
    w: &'a Tensor<T>,
    b: &Tensor<T>,
    conv_param: ConvParam,
    pool_param: PoolParam,
) -> (Tensor<T>, ConvReluPoolCache<'a, T>) {
    let (z, conv) = conv_forward(ops, x, w, b, conv_param);
    let (a, relu) = relu_forward(z);
    let (out, pool) = max_pool_forward(ops, &a, pool_param);
    (out, ConvReluPoolCache { conv, relu, pool })
}

/// Returns (dx, dw, db).
pub fn conv_relu_pool_backward<T: Element, O: TensorOps<T>>(
    ops: &O,
    dout: &Tensor<T>,
    cache: ConvReluPoolCache<'_, T>,
) -> (Tensor<T>, Tensor<T>, Tensor<T>) {
    let da = max_pool_backward(ops, dout, cache.pool);
    let dz = relu_backward(&da, cache.relu);
    conv_backward(ops, &dz, cache.conv)
}
