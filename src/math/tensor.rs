use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::ops::{Add, AddAssign, Index, IndexMut, Sub};

use crate::error::{NetError, Result};
use crate::math::element::Element;

/// Dense row-major n-dimensional array.
///
/// The shape of a tensor is fixed once it is built; only the values can be
/// written through `values_mut` or indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Element> Tensor<T> {
    pub fn zeros(shape: &[usize]) -> Tensor<T> {
        Tensor {
            shape: shape.to_vec(),
            data: vec![T::ZERO; shape.iter().product()],
        }
    }

    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Tensor<T>> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(NetError::ShapeMismatch {
                what: "tensor buffer",
                got: vec![data.len()],
                expected: vec![expected],
            });
        }

        Ok(Tensor {
            shape: shape.to_vec(),
            data,
        })
    }

    /// Samples every element i.i.d. from N(0, std_dev²).
    ///
    /// Values are drawn in `f64` and cast to `T`, so the same seed yields the
    /// same parameters regardless of precision (up to rounding).
    pub fn randn<R: Rng + ?Sized>(shape: &[usize], std_dev: f64, rng: &mut R) -> Result<Tensor<T>> {
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(NetError::Configuration(format!(
                "standard deviation must be finite and non-negative, got {std_dev}"
            )));
        }
        let normal = Normal::new(0.0, std_dev).map_err(|e| {
            NetError::Configuration(format!("cannot sample with std dev {std_dev}: {e}"))
        })?;
        let len: usize = shape.iter().product();
        let data = (0..len).map(|_| T::from_f64(normal.sample(&mut *rng))).collect();

        Ok(Tensor {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.data
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Reinterprets the buffer with a new shape of the same element count.
    pub fn reshaped(self, shape: &[usize]) -> Tensor<T> {
        let len: usize = shape.iter().product();
        if len != self.data.len() {
            panic!("cannot reshape {:?} into {:?}", self.shape, shape)
        }

        Tensor {
            shape: shape.to_vec(),
            data: self.data,
        }
    }

    pub fn map<F>(&self, functor: F) -> Tensor<T>
    where
        F: Fn(T) -> T,
    {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Element-wise combination of two same-shape tensors.
    pub fn zip_map<F>(&self, other: &Tensor<T>, functor: F) -> Tensor<T>
    where
        F: Fn(T, T) -> T,
    {
        assert_eq!(self.shape, other.shape, "tensors are of incorrect shapes");
        Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| functor(a, b))
                .collect(),
        }
    }

    pub fn scale(&self, factor: T) -> Tensor<T> {
        self.map(|x| x * factor)
    }

    /// Sum of squared elements, accumulated front to back.
    pub fn sum_squares(&self) -> T {
        self.data.iter().fold(T::ZERO, |acc, &x| acc + x * x)
    }

    pub fn sum(&self) -> T {
        self.data.iter().fold(T::ZERO, |acc, &x| acc + x)
    }

    pub fn max_abs(&self) -> T {
        self.data.iter().fold(T::ZERO, |acc, &x| acc.max(x.abs()))
    }

    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    pub fn cast<U: Element>(&self) -> Tensor<U> {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|x| U::from_f64(x.to_f64())).collect(),
        }
    }

    fn offset(&self, index: &[usize]) -> usize {
        assert_eq!(
            index.len(),
            self.shape.len(),
            "index {index:?} does not match shape {:?}",
            self.shape
        );
        index
            .iter()
            .zip(self.shape.iter())
            .fold(0, |acc, (&i, &dim)| {
                assert!(i < dim, "index {index:?} out of bounds for shape {:?}", self.shape);
                acc * dim + i
            })
    }
}

impl<T: Element> Default for Tensor<T> {
    fn default() -> Self {
        Tensor { shape: vec![0], data: vec![] }
    }
}

impl<T: Element, const D: usize> Index<[usize; D]> for Tensor<T> {
    type Output = T;

    fn index(&self, index: [usize; D]) -> &T {
        &self.data[self.offset(&index)]
    }
}

impl<T: Element, const D: usize> IndexMut<[usize; D]> for Tensor<T> {
    fn index_mut(&mut self, index: [usize; D]) -> &mut T {
        let offset = self.offset(&index);
        &mut self.data[offset]
    }
}

impl<T: Element> Add for Tensor<T> {
    type Output = Tensor<T>;

    fn add(self, rhs: Self) -> Self::Output {
        self.zip_map(&rhs, |a, b| a + b)
    }
}

impl<T: Element> Sub for Tensor<T> {
    type Output = Tensor<T>;

    fn sub(self, rhs: Self) -> Self::Output {
        self.zip_map(&rhs, |a, b| a - b)
    }
}

impl<T: Element> AddAssign<&Tensor<T>> for Tensor<T> {
    fn add_assign(&mut self, rhs: &Tensor<T>) {
        assert_eq!(self.shape, rhs.shape, "tensors are of incorrect shapes");
        for (a, &b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a += b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = Tensor::<f64>::from_vec(&[2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, NetError::ShapeMismatch { .. }));
    }

    #[test]
    fn indexing_is_row_major() {
        let t = Tensor::<f64>::from_vec(&[2, 3], vec![0., 1., 2., 3., 4., 5.]).unwrap();
        assert_eq!(t[[0, 2]], 2.0);
        assert_eq!(t[[1, 0]], 3.0);

        let mut u = Tensor::<f32>::zeros(&[2, 2, 2, 2]);
        u[[1, 0, 1, 1]] = 7.0;
        assert_eq!(u.values()[8 + 2 + 1], 7.0);
    }

    #[test]
    fn randn_is_seeded_and_scaled() {
        let a = Tensor::<f64>::randn(&[4, 5], 0.1, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = Tensor::<f64>::randn(&[4, 5], 0.1, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
        assert!(a.max_abs() < 1.0);

        let big = Tensor::<f64>::randn(&[10_000], 2.0, &mut StdRng::seed_from_u64(5)).unwrap();
        let var = big.sum_squares() / big.len() as f64;
        assert!((var - 4.0).abs() < 0.3, "variance {var}");
    }

    #[test]
    fn randn_rejects_invalid_scale() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Tensor::<f32>::randn(&[2], f64::NAN, &mut rng).is_err());
        assert!(Tensor::<f32>::randn(&[2], -1.0, &mut rng).is_err());
    }

    #[test]
    fn arithmetic() {
        let a = Tensor::<f64>::from_vec(&[3], vec![1., -2., 3.]).unwrap();
        let b = Tensor::<f64>::from_vec(&[3], vec![0.5, 0.5, 0.5]).unwrap();
        assert_eq!((a.clone() + b.clone()).values(), &[1.5, -1.5, 3.5]);
        assert_eq!((a.clone() - b.clone()).values(), &[0.5, -2.5, 2.5]);
        assert_eq!(a.sum_squares(), 14.0);

        let mut c = a.clone();
        c += &b;
        assert_eq!(c, a + b);
    }

    #[test]
    #[should_panic]
    fn reshape_checks_length() {
        Tensor::<f64>::zeros(&[2, 3]).reshaped(&[4, 2]);
    }
}
