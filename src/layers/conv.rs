use serde::{Deserialize, Serialize};

use crate::math::{element::Element, ops::TensorOps, tensor::Tensor};

/// Stride and symmetric zero padding of a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvParam {
    pub stride: usize,
    pub pad: usize,
}

impl ConvParam {
    /// Stride 1 with pad (k-1)/2: output spatial size equals input size for
    /// odd `filter_size`.
    pub fn same(filter_size: usize) -> ConvParam {
        ConvParam {
            stride: 1,
            pad: filter_size.saturating_sub(1) / 2,
        }
    }

    /// Output length along one spatial axis for a kernel of size `kernel`.
    pub fn output_dim(&self, input: usize, kernel: usize) -> usize {
        let padded = input + 2 * self.pad;
        assert!(padded >= kernel, "kernel {kernel} larger than padded input {padded}");
        (padded - kernel) / self.stride + 1
    }
}

/// What `conv_backward` needs from the forward call. Borrows the input and
/// filters, so it cannot outlive the call that produced it.
#[derive(Debug)]
pub struct ConvCache<'a, T> {
    x: &'a Tensor<T>,
    w: &'a Tensor<T>,
    param: ConvParam,
}

pub fn conv_forward<'a, T: Element, O: TensorOps<T>>(
    ops: &O,
    x: &'a Tensor<T>,
    w: &'a Tensor<T>,
    b: &Tensor<T>,
    param: ConvParam,
) -> (Tensor<T>, ConvCache<'a, T>) {
    let out = ops.conv2d(x, w, b, param);
    (out, ConvCache { x, w, param })
}

/// Returns (dx, dw, db).
pub fn conv_backward<T: Element, O: TensorOps<T>>(
    ops: &O,
    dout: &Tensor<T>,
    cache: ConvCache<'_, T>,
) -> (Tensor<T>, Tensor<T>, Tensor<T>) {
    ops.conv2d_backward(dout, cache.x, cache.w, cache.param)
}
