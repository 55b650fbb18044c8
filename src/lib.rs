pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod network;
pub mod gradcheck;

// Convenience re-exports
pub use error::{ErrorKind, NetError, Result};
pub use math::{Element, NaiveOps, Tensor, TensorOps};
pub use loss::softmax_loss;
pub use network::{
    ConvNetConfig, GradientSet, InputDim, LossOutput, ParamName, ParameterSet, ThreeLayerConvNet,
};
