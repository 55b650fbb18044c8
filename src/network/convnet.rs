use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{NetError, Result};
use crate::layers::affine::{affine_backward, affine_forward, AffineCache};
use crate::layers::conv::ConvParam;
use crate::layers::fused::{
    affine_relu_backward, affine_relu_forward, conv_relu_pool_backward, conv_relu_pool_forward,
    AffineReluCache, ConvReluPoolCache,
};
use crate::layers::pool::PoolParam;
use crate::loss::softmax::softmax_loss;
use crate::math::{element::Element, ops::NaiveOps, ops::TensorOps, tensor::Tensor};
use crate::network::config::ConvNetConfig;
use crate::network::params::{GradientSet, ParamName, ParameterSet};

/// What `ThreeLayerConvNet::loss` returns, depending on whether labels were
/// supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum LossOutput<T> {
    /// (N, K) class scores; no backward pass was run.
    Scores(Tensor<T>),
    /// Data loss plus L2 penalty, and the gradient of that total.
    Training { loss: T, grads: GradientSet<T> },
}

/// Caches of one forward pass, alive only until the matching backward pass.
struct ForwardCaches<'a, T> {
    conv: ConvReluPoolCache<'a, T>,
    hidden: AffineReluCache<'a, T>,
    output: AffineCache<'a, T>,
}

/// conv - relu - 2x2 max pool - affine - relu - affine - softmax
///
/// Operates on minibatches of shape (N, C, H, W). The precision is the type
/// parameter `T`; `O` is the backend that runs the numerical kernels.
#[derive(Debug, Clone)]
pub struct ThreeLayerConvNet<T, O = NaiveOps> {
    config: ConvNetConfig,
    params: ParameterSet<T>,
    reg: T,
    conv_param: ConvParam,
    pool_param: PoolParam,
    ops: O,
}

impl<T: Element> ThreeLayerConvNet<T, NaiveOps> {
    /// Builds a network with freshly initialized parameters. Uses
    /// `config.seed` when present, OS entropy otherwise.
    pub fn new(config: ConvNetConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, &mut rng)
    }

    pub fn with_rng<R: Rng + ?Sized>(config: ConvNetConfig, rng: &mut R) -> Result<Self> {
        Self::with_ops(config, NaiveOps, rng)
    }

    /// Wraps an existing parameter set, e.g. one produced by an optimizer.
    pub fn from_params(config: ConvNetConfig, params: ParameterSet<T>) -> Result<Self> {
        Self::from_params_with_ops(config, params, NaiveOps)
    }
}

impl<T: Element, O: TensorOps<T>> ThreeLayerConvNet<T, O> {
    pub fn with_ops<R: Rng + ?Sized>(config: ConvNetConfig, ops: O, rng: &mut R) -> Result<Self> {
        let params = ParameterSet::init(&config, rng)?;
        Self::from_params_with_ops(config, params, ops)
    }

    pub fn from_params_with_ops(config: ConvNetConfig, params: ParameterSet<T>, ops: O) -> Result<Self> {
        config.validate()?;
        params.check_shapes(&config)?;

        debug!(
            "initialized ThreeLayerConvNet<{}>: W1 {:?}, W2 {:?}, W3 {:?}, reg {}",
            T::NAME,
            params.get(ParamName::W1).shape(),
            params.get(ParamName::W2).shape(),
            params.get(ParamName::W3).shape(),
            config.reg
        );

        Ok(ThreeLayerConvNet {
            reg: T::from_f64(config.reg),
            conv_param: config.conv_param(),
            pool_param: config.pool_param(),
            config,
            params,
            ops,
        })
    }

    pub fn config(&self) -> &ConvNetConfig {
        &self.config
    }

    pub fn params(&self) -> &ParameterSet<T> {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterSet<T> {
        &mut self.params
    }

    pub fn into_params(self) -> ParameterSet<T> {
        self.params
    }

    pub fn reg(&self) -> T {
        self.reg
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Scores for `x` when `labels` is `None`; otherwise the regularized loss
    /// and the gradient of every parameter.
    pub fn loss(&self, x: &Tensor<T>, labels: Option<&[usize]>) -> Result<LossOutput<T>> {
        match labels {
            None => self.scores(x).map(LossOutput::Scores),
            Some(labels) => {
                let (loss, grads) = self.loss_and_gradients(x, labels)?;
                Ok(LossOutput::Training { loss, grads })
            }
        }
    }

    /// Forward pass only; returns (N, K) class scores.
    pub fn scores(&self, x: &Tensor<T>) -> Result<Tensor<T>> {
        self.check_input(x)?;
        let (scores, _) = self.forward(x);
        trace!("scored a batch of {}", x.shape()[0]);
        Ok(scores)
    }

    /// Index of the highest score for every image in the batch.
    pub fn predict(&self, x: &Tensor<T>) -> Result<Vec<usize>> {
        let scores = self.scores(x)?;
        let k = self.config.num_classes;
        Ok(scores.values().chunks(k).map(argmax).collect())
    }

    /// Total loss (data loss + 0.5·reg·Σ‖W‖²) without the backward pass.
    /// Takes the same path as `loss_and_gradients`, so both return the same
    /// value for the same inputs.
    pub fn loss_value(&self, x: &Tensor<T>, labels: &[usize]) -> Result<T> {
        self.check_input(x)?;
        let (scores, _) = self.forward(x);
        let (data_loss, _) = softmax_loss(&scores, labels)?;
        Ok(data_loss + self.regularization())
    }

    pub fn loss_and_gradients(&self, x: &Tensor<T>, labels: &[usize]) -> Result<(T, GradientSet<T>)> {
        self.check_input(x)?;
        let (scores, caches) = self.forward(x);
        let (data_loss, dscores) = softmax_loss(&scores, labels)?;

        let (dhidden, mut dw3, db3) = affine_backward(&self.ops, &dscores, caches.output);
        let (dpooled, mut dw2, db2) = affine_relu_backward(&self.ops, &dhidden, caches.hidden);
        let (_, mut dw1, db1) = conv_relu_pool_backward(&self.ops, &dpooled, caches.conv);

        dw1 += &self.params.get(ParamName::W1).scale(self.reg);
        dw2 += &self.params.get(ParamName::W2).scale(self.reg);
        dw3 += &self.params.get(ParamName::W3).scale(self.reg);

        let reg_loss = self.regularization();
        let loss = data_loss + reg_loss;
        debug!(
            "batch of {}: data loss {data_loss}, regularization {reg_loss}, total {loss}",
            labels.len()
        );

        Ok((loss, GradientSet::new(dw1, db1, dw2, db2, dw3, db3)))
    }

    fn forward<'a>(&'a self, x: &'a Tensor<T>) -> (Tensor<T>, ForwardCaches<'a, T>) {
        let p = &self.params;
        let (pooled, conv) = conv_relu_pool_forward(
            &self.ops,
            x,
            p.get(ParamName::W1),
            p.get(ParamName::B1),
            self.conv_param,
            self.pool_param,
        );
        let (hidden, hidden_cache) =
            affine_relu_forward(&self.ops, &pooled, p.get(ParamName::W2), p.get(ParamName::B2));
        let (scores, output) =
            affine_forward(&self.ops, &hidden, p.get(ParamName::W3), p.get(ParamName::B3));

        let caches = ForwardCaches {
            conv,
            hidden: hidden_cache,
            output,
        };
        (scores, caches)
    }

    /// 0.5 · reg · (‖W1‖² + ‖W2‖² + ‖W3‖²), summed in that order.
    fn regularization(&self) -> T {
        let squares = ParamName::WEIGHTS
            .iter()
            .fold(T::ZERO, |acc, &name| acc + self.params.get(name).sum_squares());
        T::from_f64(0.5) * self.reg * squares
    }

    fn check_input(&self, x: &Tensor<T>) -> Result<()> {
        let dim = self.config.input_dim;
        let n = x.shape().first().copied().unwrap_or(0);
        let expected = vec![n.max(1), dim.channels, dim.height, dim.width];
        if x.shape() != expected.as_slice() {
            return Err(NetError::ShapeMismatch {
                what: "input batch",
                got: x.shape().to_vec(),
                expected,
            });
        }
        Ok(())
    }
}

/// Index of the maximum element in a slice.
fn argmax<T: Element>(v: &[T]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
