//! Finite-difference gradient checking.
//!
//! Analytic gradients from the backward chain are compared against central
//! differences `(f(x + h) - f(x - h)) / 2h`, one element at a time. This is
//! slow and only meant for small networks in tests.

use crate::error::Result;
use crate::math::{element::Element, ops::TensorOps, tensor::Tensor};
use crate::network::convnet::ThreeLayerConvNet;
use crate::network::params::ParamName;

/// Central-difference gradient of a scalar function of one tensor.
pub fn numerical_gradient<T, F>(mut f: F, x: &Tensor<T>, h: f64) -> Tensor<T>
where
    T: Element,
    F: FnMut(&Tensor<T>) -> T,
{
    let step = T::from_f64(h);
    let two_h = T::from_f64(2.0 * h);
    let mut probe = x.clone();
    let mut grad = Tensor::zeros(x.shape());

    for i in 0..x.len() {
        let old = x.values()[i];

        probe.values_mut()[i] = old + step;
        let plus = f(&probe);
        probe.values_mut()[i] = old - step;
        let minus = f(&probe);
        probe.values_mut()[i] = old;

        grad.values_mut()[i] = (plus - minus) / two_h;
    }

    grad
}

/// Central-difference gradient of the network's total loss with respect to
/// one parameter. The parameter is perturbed in place and restored.
pub fn numerical_param_gradient<T, O>(
    net: &mut ThreeLayerConvNet<T, O>,
    name: ParamName,
    x: &Tensor<T>,
    labels: &[usize],
    h: f64,
) -> Result<Tensor<T>>
where
    T: Element,
    O: TensorOps<T>,
{
    let step = T::from_f64(h);
    let two_h = T::from_f64(2.0 * h);
    let mut grad = Tensor::zeros(net.params().get(name).shape());

    for i in 0..grad.len() {
        let old = net.params().get(name).values()[i];

        net.params_mut().values_mut(name)[i] = old + step;
        let plus = net.loss_value(x, labels);
        net.params_mut().values_mut(name)[i] = old - step;
        let minus = net.loss_value(x, labels);
        net.params_mut().values_mut(name)[i] = old;

        grad.values_mut()[i] = (plus? - minus?) / two_h;
    }

    Ok(grad)
}

/// `max|a - b| / max(1e-8, max|a| + max|b|)`.
///
/// Normalizing by the largest magnitudes in each tensor keeps entries that
/// are legitimately close to zero from dominating the comparison.
pub fn rel_error<T: Element>(a: &Tensor<T>, b: &Tensor<T>) -> f64 {
    let diff = a.zip_map(b, |x, y| x - y).max_abs().to_f64();
    let scale = a.max_abs().to_f64() + b.max_abs().to_f64();
    diff / scale.max(1e-8)
}

/// Relative error between analytic and numerical gradients for every
/// parameter, in `ParamName::ALL` order.
pub fn check_gradients<T, O>(
    net: &mut ThreeLayerConvNet<T, O>,
    x: &Tensor<T>,
    labels: &[usize],
    h: f64,
) -> Result<Vec<(ParamName, f64)>>
where
    T: Element,
    O: TensorOps<T>,
{
    let (_, grads) = net.loss_and_gradients(x, labels)?;

    ParamName::ALL
        .iter()
        .map(|&name| {
            let numeric = numerical_param_gradient(net, name, x, labels, h)?;
            Ok((name, rel_error(grads.get(name), &numeric)))
        })
        .collect()
}
