pub mod affine;
pub mod conv;
pub mod fused;
pub mod pool;

pub use affine::{affine_backward, affine_forward, AffineCache};
pub use conv::{conv_backward, conv_forward, ConvCache, ConvParam};
pub use fused::{
    affine_relu_backward, affine_relu_forward, conv_relu_pool_backward, conv_relu_pool_forward,
    AffineReluCache, ConvReluPoolCache,
};
pub use pool::{max_pool_backward, max_pool_forward, PoolCache, PoolParam};
