use crate::error::{FixtureError, Result};

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Clone, Debug, PartialEq)]
pub struct Storage {
    pub data: Vec<f32>,
}

impl Storage {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len() * F32_BYTES
    }

    /// Flat little-endian IEEE-754 encoding, no header.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(self.len_bytes());
        for value in self.data.iter() {
            encoded.extend_from_slice(&value.to_le_bytes());
        }
        encoded
    }

    pub fn from_le_bytes(bytes: &[u8], op: &'static str) -> Result<Self> {
        if bytes.len() % F32_BYTES != 0 {
            return Err(FixtureError::Format {
                op,
                msg: format!(
                    "byte length {} is not a multiple of {F32_BYTES}",
                    bytes.len()
                ),
            });
        }
        let mut data = Vec::with_capacity(bytes.len() / F32_BYTES);
        for chunk in bytes.chunks_exact(F32_BYTES) {
            let array: [u8; F32_BYTES] = chunk.try_into().map_err(|_| FixtureError::Format {
                op,
                msg: "chunk decode failed".to_string(),
            })?;
            data.push(f32::from_le_bytes(array));
        }
        Ok(Self { data })
    }
}
