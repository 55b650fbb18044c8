pub mod config;
pub mod convnet;
pub mod params;

pub use config::{ConvNetConfig, InputDim};
pub use convnet::{LossOutput, ThreeLayerConvNet};
pub use params::{GradientSet, ParamName, ParameterSet};
