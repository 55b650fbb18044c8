use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::layers::{conv::ConvParam, pool::PoolParam};

/// Shape of one input image: channels × height × width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDim {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl InputDim {
    pub fn new(channels: usize, height: usize, width: usize) -> InputDim {
        InputDim {
            channels,
            height,
            width,
        }
    }
}

/// Hyperparameters of a `ThreeLayerConvNet`.
///
/// They fix every parameter shape and never change after the network is
/// built. Can be stored as JSON independently of any trained weights.
///
/// Fields:
/// - `input_dim`    — (C, H, W) of one image
/// - `num_filters`  — filters in the convolutional layer
/// - `filter_size`  — side of the square filters; must be odd so that the
///                    stride-1, (k-1)/2-padded convolution keeps H and W
/// - `hidden_dim`   — units in the hidden fully-connected layer
/// - `num_classes`  — scores produced by the output layer
/// - `weight_scale` — standard deviation of the Gaussian weight init
/// - `reg`          — L2 regularization strength
/// - `seed`         — optional RNG seed for reproducible initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvNetConfig {
    pub input_dim: InputDim,
    pub num_filters: usize,
    pub filter_size: usize,
    pub hidden_dim: usize,
    pub num_classes: usize,
    pub weight_scale: f64,
    pub reg: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ConvNetConfig {
    fn default() -> Self {
        ConvNetConfig {
            input_dim: InputDim::new(3, 32, 32),
            num_filters: 32,
            filter_size: 7,
            hidden_dim: 100,
            num_classes: 10,
            weight_scale: 1e-3,
            reg: 0.0,
            seed: None,
        }
    }
}

impl ConvNetConfig {
    /// Rejects hyperparameters that cannot produce a consistent network.
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("input channels", self.input_dim.channels),
            ("input height", self.input_dim.height),
            ("input width", self.input_dim.width),
            ("num_filters", self.num_filters),
            ("filter_size", self.filter_size),
            ("hidden_dim", self.hidden_dim),
            ("num_classes", self.num_classes),
        ];
        if let Some((name, _)) = dims.iter().find(|(_, v)| *v == 0) {
            return Err(NetError::Configuration(format!("{name} must be positive")));
        }

        if self.filter_size % 2 == 0 {
            return Err(NetError::Configuration(format!(
                "filter_size {} is even; same padding needs an odd filter",
                self.filter_size
            )));
        }

        for (name, value) in [("weight_scale", self.weight_scale), ("reg", self.reg)] {
            if !value.is_finite() || value < 0.0 {
                return Err(NetError::Configuration(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        self.pooled_dims().map(|_| ())
    }

    pub fn conv_param(&self) -> ConvParam {
        ConvParam::same(self.filter_size)
    }

    pub fn pool_param(&self) -> PoolParam {
        PoolParam::halving()
    }

    /// Spatial size after conv (same padding) and 2x2/stride-2 pooling:
    /// `1 + (H - 2) / 2` by `1 + (W - 2) / 2`.
    pub fn pooled_dims(&self) -> Result<(usize, usize)> {
        let conv = self.conv_param();
        let (h, w) = (self.input_dim.height, self.input_dim.width);
        if h.min(w) + 2 * conv.pad < self.filter_size {
            return Err(NetError::Configuration(format!(
                "filter_size {} does not fit a padded {h}x{w} input",
                self.filter_size
            )));
        }
        let conv_h = conv.output_dim(h, self.filter_size);
        let conv_w = conv.output_dim(w, self.filter_size);
        if (conv_h, conv_w) != (h, w) {
            return Err(NetError::Configuration(format!(
                "convolution maps {h}x{w} to {conv_h}x{conv_w}; expected same-size output"
            )));
        }

        self.pool_param().output_dims(conv_h, conv_w).ok_or_else(|| {
            NetError::Configuration(format!(
                "input {h}x{w} is smaller than the 2x2 pooling window"
            ))
        })
    }

    /// Length of the flattened pooled feature map, F · H2 · W2.
    pub fn pooled_features(&self) -> Result<usize> {
        let (h2, w2) = self.pooled_dims()?;
        Ok(self.num_filters * h2 * w2)
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Deserializes a `ConvNetConfig` from a JSON file.
    pub fn load_json(path: &str) -> std::io::Result<ConvNetConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
