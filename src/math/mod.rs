pub mod element;
pub mod ops;
pub mod tensor;

pub use element::Element;
pub use ops::{NaiveOps, TensorOps};
pub use tensor::Tensor;
