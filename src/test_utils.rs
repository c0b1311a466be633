//! Common test utilities: an in-memory proving service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::prover::{CircuitOutput, CircuitRequest, ProofMode, ProverClient, ProverError};

type Handler = Box<dyn Fn(&Value) -> Result<CircuitOutput, ProverError> + Send + Sync>;

/// A recorded call to the scripted prover.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub mode: ProofMode,
    pub circuit: &'static str,
    pub data: Value,
}

/// Answers circuit calls from per-circuit handlers and records every call.
///
/// A circuit can be gated: its calls block until the test releases permits.
#[derive(Default)]
pub struct ScriptedProver {
    handlers: HashMap<&'static str, Handler>,
    gates: HashMap<&'static str, Arc<Semaphore>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, circuit: &'static str, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<CircuitOutput, ProverError> + Send + Sync + 'static,
    {
        self.handlers.insert(circuit, Box::new(handler));
        self
    }

    /// Answer `circuit` with fixed outputs and a dummy proof.
    pub fn respond(self, circuit: &'static str, outputs: Value) -> Self {
        self.on(circuit, move |_| Ok(output_with(outputs.clone())))
    }

    pub fn fail(self, circuit: &'static str, code: i64) -> Self {
        self.on(circuit, move |_| Err(ProverError::Rejected { circuit, code }))
    }

    /// Block calls to `circuit` until permits are added to the returned semaphore.
    pub fn gate(&mut self, circuit: &'static str) -> Arc<Semaphore> {
        self.gates
            .entry(circuit)
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, circuit: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.circuit == circuit)
            .collect()
    }
}

pub fn output_with(outputs: Value) -> CircuitOutput {
    CircuitOutput {
        outputs,
        public_inputs: json!(["0x01"]),
        proof: json!("0xproof"),
        witness: Value::Null,
    }
}

#[async_trait]
impl ProverClient for ScriptedProver {
    async fn call(
        &self,
        mode: ProofMode,
        request: CircuitRequest,
    ) -> Result<CircuitOutput, ProverError> {
        self.calls.lock().unwrap().push(RecordedCall {
            mode,
            circuit: request.circuit_name,
            data: request.data.clone(),
        });
        if let Some(gate) = self.gates.get(request.circuit_name) {
            gate.acquire().await.unwrap().forget();
        }
        match self.handlers.get(request.circuit_name) {
            Some(handler) => handler(&request.data),
            None => Err(ProverError::malformed(
                request.circuit_name,
                "no scripted handler",
            )),
        }
    }
}

/// Shuffle handler that returns the submitted deck reversed, padding rows untouched.
pub fn reversing_shuffle(real_rows: usize) -> impl Fn(&Value) -> Result<CircuitOutput, ProverError> {
    move |data: &Value| {
        let deck = data["deck"].as_array().cloned().unwrap_or_default();
        let mut shuffled: Vec<Value> = deck[..real_rows].iter().rev().cloned().collect();
        shuffled.extend_from_slice(&deck[real_rows..]);
        Ok(output_with(json!({ "shuffledDeck": shuffled })))
    }
}
