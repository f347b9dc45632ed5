//! Computation engine collaborator.
//!
//! The engine performs the actual arithmetic over encrypted payloads; its
//! numeric and cryptographic internals live in an external library.
//! Ciphertexts are opaque bytes end to end, the service never inspects
//! them.

use ::opal_common::{
    anyhow::anyhow,
    error::{OpalError, Result},
    task::{Operation, TaskParams},
};

/// Seam between the compute node service and the arithmetic backend.
///
/// A shared engine instance serves concurrent requests; implementations
/// must not mutate engine-global configuration while a computation is in
/// flight.
pub trait ComputationEngine: Send + Sync + 'static {
    /// Encrypt a plaintext vector into an opaque ciphertext.
    fn encrypt(&self, plaintext: &[f64]) -> Result<Vec<u8>>;

    /// Decrypt a ciphertext produced by this engine.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<f64>>;

    /// Run `operation` over `ciphertext`. An operation the engine does not
    /// support, or a malformed ciphertext, is an engine failure, never a
    /// panic.
    fn compute(
        &self,
        ciphertext: &[u8],
        operation: Operation,
        params: &TaskParams,
    ) -> Result<Vec<u8>>;
}

/// Development engine computing over unencrypted little-endian f64
/// vectors. A stand-in for the homomorphic backend: the wire and service
/// contracts are identical, only the "ciphertext" is readable.
#[derive(Debug, Default, Clone)]
pub struct ClearTextEngine;

impl ClearTextEngine {
    fn decode(bytes: &[u8]) -> Result<Vec<f64>> {
        if bytes.len() % 8 != 0 {
            return Err(OpalError::engine_failure(anyhow!(
                "Ciphertext length {} is not a multiple of 8",
                bytes.len()
            )));
        }
        let mut values = Vec::with_capacity(bytes.len() / 8);
        for chunk in bytes.chunks_exact(8) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            values.push(f64::from_le_bytes(buf));
        }
        Ok(values)
    }

    fn encode(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// The scalar operand for add/multiply: 8 little-endian bytes under the
    /// `value` key, or the operation's neutral default when absent.
    fn param_value(params: &TaskParams, default: f64) -> Result<f64> {
        match params.get("value") {
            None => Ok(default),
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Ok(f64::from_le_bytes(buf))
            }
            Some(bytes) => Err(OpalError::engine_failure(anyhow!(
                "Parameter `value` must be 8 little-endian bytes, got {}",
                bytes.len()
            ))),
        }
    }
}

impl ComputationEngine for ClearTextEngine {
    fn encrypt(&self, plaintext: &[f64]) -> Result<Vec<u8>> {
        Ok(Self::encode(plaintext))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<f64>> {
        Self::decode(ciphertext)
    }

    fn compute(
        &self,
        ciphertext: &[u8],
        operation: Operation,
        params: &TaskParams,
    ) -> Result<Vec<u8>> {
        let values = Self::decode(ciphertext)?;
        if values.is_empty() {
            return Err(OpalError::engine_failure(anyhow!("Empty payload")));
        }
        let result = match operation {
            Operation::Add => {
                let operand = Self::param_value(params, 0.0)?;
                values.iter().map(|v| v + operand).collect()
            }
            Operation::Multiply => {
                let operand = Self::param_value(params, 1.0)?;
                values.iter().map(|v| v * operand).collect()
            }
            Operation::Mean => vec![values.iter().sum::<f64>() / values.len() as f64],
            Operation::Sum => vec![values.iter().sum::<f64>()],
        };
        Ok(Self::encode(&result))
    }
}
