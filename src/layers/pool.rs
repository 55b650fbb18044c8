use serde::{Deserialize, Serialize};

use crate::math::{element::Element, ops::TensorOps, tensor::Tensor};

/// Max-pool window and stride. No padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParam {
    pub pool_height: usize,
    pub pool_width: usize,
    pub stride: usize,
}

impl PoolParam {
    /// 2x2 window, stride 2.
    pub fn halving() -> PoolParam {
        PoolParam {
            pool_height: 2,
            pool_width: 2,
            stride: 2,
        }
    }

    /// Pooled (height, width), or `None` when the window does not fit.
    pub fn output_dims(&self, height: usize, width: usize) -> Option<(usize, usize)> {
        if self.stride == 0 || height < self.pool_height || width < self.pool_width {
            return None;
        }
        Some((
            (height - self.pool_height) / self.stride + 1,
            (width - self.pool_width) / self.stride + 1,
        ))
    }
}

#[derive(Debug)]
pub struct PoolCache {
    input_shape: Vec<usize>,
    argmax: Vec<usize>,
}

pub fn max_pool_forward<T: Element, O: TensorOps<T>>(
    ops: &O,
    x: &Tensor<T>,
    param: PoolParam,
) -> (Tensor<T>, PoolCache) {
    let (out, argmax) = ops.max_pool(x, param);
    let cache = PoolCache {
        input_shape: x.shape().to_vec(),
        argmax,
    };
    (out, cache)
}

pub fn max_pool_backward<T: Element, O: TensorOps<T>>(
    ops: &O,
    dout: &Tensor<T>,
    cache: PoolCache,
) -> Tensor<T> {
    ops.max_pool_backward(dout, &cache.argmax, &cache.input_shape)
}
