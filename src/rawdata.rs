//! Headerless `f32` dumps: the bytes of a contiguous tensor and nothing else.
//! Shape and dtype are a contract between writer and reader.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{FixtureError, Result};
use crate::storage::Storage;
use crate::tensor::{checked_numel, Tensor};

/// Write `tensor` to `path` as little-endian `f32`. Returns the byte count.
pub fn write_raw_f32<P: AsRef<Path>>(path: P, tensor: &Tensor) -> Result<usize> {
    let path = path.as_ref();
    tensor.validate_layout("write_raw_f32")?;
    let bytes = tensor.storage().to_le_bytes();
    let mut file = File::create(path).map_err(|err| FixtureError::io("write_raw_f32", path, err))?;
    file.write_all(&bytes)
        .map_err(|err| FixtureError::io("write_raw_f32", path, err))?;
    file.flush()
        .map_err(|err| FixtureError::io("write_raw_f32", path, err))?;
    Ok(bytes.len())
}

/// Read a dump written by [`write_raw_f32`] and attach `shape` to it.
pub fn read_raw_f32<P: AsRef<Path>>(path: P, shape: &[usize]) -> Result<Tensor> {
    let path = path.as_ref();
    let bytes = read_bytes(path)?;
    let storage = Storage::from_le_bytes(&bytes, "read_raw_f32")?;
    let expected = checked_numel(shape, "read_raw_f32")?;
    if storage.data.len() != expected {
        return Err(FixtureError::ShapeMismatch {
            op: "read_raw_f32",
            expected: shape.to_vec(),
            actual: vec![storage.data.len()],
        });
    }
    Tensor::try_from_vec_f32(storage.data, shape)
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|err| FixtureError::io("read_raw_f32", path, err))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|err| FixtureError::io("read_raw_f32", path, err))?;
    Ok(bytes)
}
