//! Client side of the external proving/execution service.
//!
//! The service executes named circuits and answers with
//! `{ok, code, data: {outputs, public_inputs, proof, witness}}`. Everything
//! past that envelope is circuit specific and parsed by the caller through
//! [`CircuitOutput::parse_outputs`].

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod circuits;
mod http;

pub use circuits::*;
pub use http::HttpProver;

/// Which endpoint a circuit call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofMode {
    /// `POST /execute`: run the circuit, no proof.
    Execute,
    /// `POST /prove`: run the circuit and return a proof.
    Prove,
}

impl ProofMode {
    pub fn path(self) -> &'static str {
        match self {
            ProofMode::Execute => "execute",
            ProofMode::Prove => "prove",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    #[error("proving service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("proving service answered HTTP {status} for {circuit}")]
    Http { circuit: &'static str, status: u16 },
    #[error("circuit {circuit} was rejected (code {code})")]
    Rejected { circuit: &'static str, code: i64 },
    #[error("circuit {circuit} returned malformed output: {reason}")]
    MalformedOutput {
        circuit: &'static str,
        reason: String,
    },
    #[error("failed to encode {circuit} input: {source}")]
    Encode {
        circuit: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ProverError {
    pub fn malformed(circuit: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            circuit,
            reason: reason.into(),
        }
    }
}

/// Request body: `{circuit_name, data}`.
///
/// `data` may carry a secret key, so `Debug` only prints the circuit name.
#[derive(Clone, Serialize)]
pub struct CircuitRequest {
    pub circuit_name: &'static str,
    pub data: Value,
}

impl CircuitRequest {
    pub fn new<C: Circuit>(input: &C) -> Result<Self, ProverError> {
        let data = serde_json::to_value(input).map_err(|source| ProverError::Encode {
            circuit: C::NAME,
            source,
        })?;
        Ok(Self {
            circuit_name: C::NAME,
            data,
        })
    }
}

impl fmt::Debug for CircuitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitRequest")
            .field("circuit_name", &self.circuit_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProverResponse {
    pub ok: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub data: Option<CircuitOutput>,
}

/// Successful circuit result. Proof and public inputs are opaque blobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitOutput {
    #[serde(default)]
    pub outputs: Value,
    #[serde(default)]
    pub public_inputs: Value,
    #[serde(default)]
    pub proof: Value,
    #[serde(default)]
    pub witness: Value,
}

impl CircuitOutput {
    pub fn parse_outputs<T: DeserializeOwned>(&self, circuit: &'static str) -> Result<T, ProverError> {
        serde_json::from_value(self.outputs.clone())
            .map_err(|err| ProverError::malformed(circuit, err.to_string()))
    }
}

impl ProverResponse {
    /// Collapse the envelope into the circuit output or a typed failure.
    pub fn into_output(self, circuit: &'static str) -> Result<CircuitOutput, ProverError> {
        if !self.ok {
            return Err(ProverError::Rejected {
                circuit,
                code: self.code,
            });
        }
        self.data
            .ok_or_else(|| ProverError::malformed(circuit, "response is missing `data`"))
    }
}

/// Seam between the protocol components and the proving service.
#[async_trait]
pub trait ProverClient: Send + Sync {
    async fn call(
        &self,
        mode: ProofMode,
        request: CircuitRequest,
    ) -> Result<CircuitOutput, ProverError>;
}
