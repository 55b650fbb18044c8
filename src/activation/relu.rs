use crate::math::{element::Element, tensor::Tensor};

/// Pre-activation values kept for the backward pass.
#[derive(Debug)]
pub struct ReluCache<T> {
    z: Tensor<T>,
}

fn relu<T: Element>(x: T) -> T {
    if x > T::ZERO { x } else { T::ZERO }
}

fn relu_derivative<T: Element>(z: T) -> T {
    if z > T::ZERO { T::ONE } else { T::ZERO }
}

/// max(0, x) element-wise. Takes ownership of `x` since it becomes the cache.
pub fn relu_forward<T: Element>(x: Tensor<T>) -> (Tensor<T>, ReluCache<T>) {
    let out = x.map(relu);
    (out, ReluCache { z: x })
}

/// Gradient flows only where the pre-activation was strictly positive.
pub fn relu_backward<T: Element>(dout: &Tensor<T>, cache: ReluCache<T>) -> Tensor<T> {
    dout.zip_map(&cache.z, |d, z| d * relu_derivative(z))
}
