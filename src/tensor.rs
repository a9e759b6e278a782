use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FixtureError, Result};
use crate::storage::Storage;

/// Dense `f32` tensor. Row-major, immutable once built.
#[derive(Clone)]
pub struct Tensor {
    pub(crate) inner: Arc<TensorInner>,
}

#[derive(Serialize, Deserialize)]
struct TensorSerde {
    data: Vec<f32>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("numel", &self.numel())
            .finish()
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.data() == other.data()
    }
}

impl Serialize for Tensor {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let payload = TensorSerde {
            data: self.data().to_vec(),
            shape: self.shape().to_vec(),
            strides: self.strides().to_vec(),
        };
        payload.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let payload = TensorSerde::deserialize(deserializer)?;
        let inner = TensorInner::new_with_strides(payload.data, &payload.shape, &payload.strides)
            .map_err(|err| D::Error::custom(err.to_string()))?;
        inner
            .validate_layout("tensor.deserialize")
            .map_err(|err| D::Error::custom(err.to_string()))?;
        Ok(Tensor {
            inner: Arc::new(inner),
        })
    }
}

impl Tensor {
    /// Wrap `v` as a contiguous tensor. Panics if `v.len()` does not match `shape`.
    pub fn from_vec_f32(v: Vec<f32>, shape: &[usize]) -> Self {
        Self::try_from_vec_f32(v, shape).expect("from_vec_f32: data length does not match shape")
    }

    pub fn try_from_vec_f32(v: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let strides = TensorInner::contiguous_strides(shape);
        let inner = TensorInner::new_with_strides(v, shape, &strides)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_vec_f32(vec![0.0; shape.iter().product()], shape)
    }

    pub fn shape(&self) -> &[usize] {
        &self.inner.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.inner.strides
    }

    pub fn numel(&self) -> usize {
        self.inner.numel()
    }

    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    pub fn data(&self) -> &[f32] {
        self.inner.storage.data.as_slice()
    }

    /// Smallest and largest element, `None` for an empty tensor.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        crate::ops::min_max(self.data())
    }

    pub fn validate_layout(&self, op: &'static str) -> Result<()> {
        self.inner.validate_layout(op)
    }

    /// Error unless the tensor has exactly `expected` as its shape.
    pub fn expect_shape(&self, expected: &[usize], op: &'static str) -> Result<()> {
        if self.shape() != expected {
            return Err(FixtureError::ShapeMismatch {
                op,
                expected: expected.to_vec(),
                actual: self.shape().to_vec(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TensorInner {
    pub storage: Storage,
    pub shape: Vec<usize>,
    pub strides: Vec<usize>,
}

impl TensorInner {
    fn new_with_strides(v: Vec<f32>, shape: &[usize], strides: &[usize]) -> Result<Self> {
        Self::validate_layout_fields(shape, strides, v.len(), "from_vec_f32")?;
        Ok(Self {
            storage: Storage::new(v),
            shape: shape.to_vec(),
            strides: strides.to_vec(),
        })
    }

    pub(crate) fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
        if shape.is_empty() {
            return Vec::new();
        }
        let mut strides = vec![0; shape.len()];
        let mut stride: usize = 1;
        for (idx, dim) in shape.iter().enumerate().rev() {
            strides[idx] = stride;
            stride = stride.saturating_mul(*dim);
        }
        strides
    }

    fn validate_layout_fields(
        shape: &[usize],
        strides: &[usize],
        storage_len: usize,
        op: &'static str,
    ) -> Result<()> {
        let layout_err = |msg: String| FixtureError::InvalidLayout {
            op,
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            msg,
        };
        if shape.len() != strides.len() {
            return Err(layout_err(format!(
                "shape rank {} does not match strides rank {}",
                shape.len(),
                strides.len()
            )));
        }
        let numel = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| layout_err("element count overflow".to_string()))?;
        if storage_len != numel {
            return Err(layout_err(format!(
                "storage length {storage_len} does not match element count {numel}"
            )));
        }
        Ok(())
    }

    fn validate_layout(&self, op: &'static str) -> Result<()> {
        Self::validate_layout_fields(&self.shape, &self.strides, self.storage.data.len(), op)?;
        let expected = Self::contiguous_strides(&self.shape);
        if self.strides != expected {
            return Err(FixtureError::InvalidLayout {
                op,
                shape: self.shape.clone(),
                strides: self.strides.clone(),
                msg: format!("expected contiguous strides {expected:?}"),
            });
        }
        Ok(())
    }

    fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Product of `shape`, or `InvalidArgument` if it overflows `usize`.
pub(crate) fn checked_numel(shape: &[usize], op: &'static str) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| FixtureError::InvalidArgument {
            op,
            msg: format!("element count of shape {shape:?} overflows usize"),
        })
}
