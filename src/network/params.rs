use rand::Rng;
use std::fmt;

use crate::error::{NetError, Result};
use crate::math::{element::Element, tensor::Tensor};
use crate::network::config::ConvNetConfig;

/// Names of the six learnable tensors, `{W,b}{1,2,3}` for the conv, hidden
/// and output layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    W1,
    B1,
    W2,
    B2,
    W3,
    B3,
}

impl ParamName {
    pub const ALL: [ParamName; 6] = [
        ParamName::W1,
        ParamName::B1,
        ParamName::W2,
        ParamName::B2,
        ParamName::W3,
        ParamName::B3,
    ];

    pub const WEIGHTS: [ParamName; 3] = [ParamName::W1, ParamName::W2, ParamName::W3];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::W1 => "W1",
            ParamName::B1 => "b1",
            ParamName::W2 => "W2",
            ParamName::B2 => "b2",
            ParamName::W3 => "W3",
            ParamName::B3 => "b3",
        }
    }

    /// Weights are regularized, biases are not.
    pub fn is_weight(&self) -> bool {
        matches!(self, ParamName::W1 | ParamName::W2 | ParamName::W3)
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The network's learnable tensors, one field per parameter.
///
/// Shapes are checked against the config when the set enters a network and
/// cannot change afterwards: mutation goes through `values_mut`, which only
/// hands out the element buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet<T> {
    w1: Tensor<T>,
    b1: Tensor<T>,
    w2: Tensor<T>,
    b2: Tensor<T>,
    w3: Tensor<T>,
    b3: Tensor<T>,
}

/// ∂loss/∂parameter, keyed and shaped exactly like `ParameterSet`.
pub type GradientSet<T> = ParameterSet<T>;

impl<T: Element> ParameterSet<T> {
    pub fn new(
        w1: Tensor<T>,
        b1: Tensor<T>,
        w2: Tensor<T>,
        b2: Tensor<T>,
        w3: Tensor<T>,
        b3: Tensor<T>,
    ) -> ParameterSet<T> {
        ParameterSet { w1, b1, w2, b2, w3, b3 }
    }

    /// Gaussian(0, weight_scale) weights and zero biases.
    ///
    /// Weights are drawn in W1, W2, W3 order, so a fixed seed always yields
    /// the same set.
    pub fn init<R: Rng + ?Sized>(config: &ConvNetConfig, rng: &mut R) -> Result<ParameterSet<T>> {
        config.validate()?;
        let [w1, b1, w2, b2, w3, b3] = Self::expected_shapes(config)?;
        let scale = config.weight_scale;

        let w1 = Tensor::randn(&w1, scale, rng)?;
        let w2 = Tensor::randn(&w2, scale, rng)?;
        let w3 = Tensor::randn(&w3, scale, rng)?;

        Ok(ParameterSet {
            w1,
            b1: Tensor::zeros(&b1),
            w2,
            b2: Tensor::zeros(&b2),
            w3,
            b3: Tensor::zeros(&b3),
        })
    }

    /// Shapes in `ParamName::ALL` order:
    /// (F, C, k, k), (F,), (F·H2·W2, H_d), (H_d,), (H_d, K), (K,).
    pub fn expected_shapes(config: &ConvNetConfig) -> Result<[Vec<usize>; 6]> {
        let f = config.num_filters;
        let k = config.filter_size;
        let c = config.input_dim.channels;
        let hidden = config.hidden_dim;
        let classes = config.num_classes;
        let pooled = config.pooled_features()?;

        Ok([
            vec![f, c, k, k],
            vec![f],
            vec![pooled, hidden],
            vec![hidden],
            vec![hidden, classes],
            vec![classes],
        ])
    }

    /// Fails with `ShapeMismatch` on the first tensor whose shape disagrees
    /// with `config`.
    pub fn check_shapes(&self, config: &ConvNetConfig) -> Result<()> {
        let expected = Self::expected_shapes(config)?;
        for ((name, tensor), shape) in self.iter().zip(expected) {
            if tensor.shape() != shape.as_slice() {
                return Err(NetError::ShapeMismatch {
                    what: name.as_str(),
                    got: tensor.shape().to_vec(),
                    expected: shape,
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, name: ParamName) -> &Tensor<T> {
        match name {
            ParamName::W1 => &self.w1,
            ParamName::B1 => &self.b1,
            ParamName::W2 => &self.w2,
            ParamName::B2 => &self.b2,
            ParamName::W3 => &self.w3,
            ParamName::B3 => &self.b3,
        }
    }

    pub fn values_mut(&mut self, name: ParamName) -> &mut [T] {
        let tensor = match name {
            ParamName::W1 => &mut self.w1,
            ParamName::B1 => &mut self.b1,
            ParamName::W2 => &mut self.w2,
            ParamName::B2 => &mut self.b2,
            ParamName::W3 => &mut self.w3,
            ParamName::B3 => &mut self.b3,
        };
        tensor.values_mut()
    }

    /// (name, tensor) pairs in `ParamName::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (ParamName, &Tensor<T>)> + '_ {
        ParamName::ALL.into_iter().map(move |name| (name, self.get(name)))
    }

    /// Total number of scalars across all six tensors.
    pub fn num_values(&self) -> usize {
        self.iter().map(|(_, t)| t.len()).sum()
    }

    /// Converts every tensor to another precision.
    pub fn cast<U: Element>(&self) -> ParameterSet<U> {
        ParameterSet {
            w1: self.w1.cast(),
            b1: self.b1.cast(),
            w2: self.w2.cast(),
            b2: self.b2.cast(),
            w3: self.w3.cast(),
            b3: self.b3.cast(),
        }
    }
}
