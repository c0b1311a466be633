use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::{CircuitOutput, CircuitRequest, ProofMode, ProverClient, ProverError, ProverResponse};
use crate::config::ProverConfig;

const LOG_TARGET: &str = "prover::http";

/// `reqwest` client for the proving service.
#[derive(Debug, Clone)]
pub struct HttpProver {
    client: Client,
    base_url: Url,
}

impl HttpProver {
    pub fn new(cfg: &ProverConfig) -> Result<Self, ProverError> {
        let client = Client::builder().timeout(cfg.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
        })
    }

    fn endpoint(&self, mode: ProofMode) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            mode.path()
        )
    }
}

#[async_trait]
impl ProverClient for HttpProver {
    async fn call(
        &self,
        mode: ProofMode,
        request: CircuitRequest,
    ) -> Result<CircuitOutput, ProverError> {
        let circuit = request.circuit_name;
        debug!(target = LOG_TARGET, circuit, mode = mode.path(), "calling proving service");

        let response = self
            .client
            .post(self.endpoint(mode))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let parsed = match serde_json::from_slice::<ProverResponse>(&bytes) {
            Ok(parsed) => parsed,
            Err(err) if status.is_success() => {
                return Err(ProverError::malformed(circuit, err.to_string()));
            }
            Err(_) => {
                warn!(target = LOG_TARGET, circuit, status = status.as_u16(), "proving service error");
                return Err(ProverError::Http {
                    circuit,
                    status: status.as_u16(),
                });
            }
        };

        let output = parsed.into_output(circuit)?;
        debug!(target = LOG_TARGET, circuit, "proving service call succeeded");
        Ok(output)
    }
}
