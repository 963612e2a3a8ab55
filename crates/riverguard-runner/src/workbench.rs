//! NATS-based workbench bridge.
//!
//! [`NatsWorkbench`] implements [`ModelProvider`] and [`EvaluatorFactory`]
//! by sending JSON requests to a workbench service that owns the dike
//! model, the parallel evaluator, and the optimizer. Each call is one NATS
//! request/reply round trip.
//!
//! # Subject Convention
//!
//! With the default prefix `workbench`:
//!
//! - **Load model:** `workbench.model.load`
//! - **Open evaluator:** `workbench.evaluator.open`
//! - **Close evaluator:** `workbench.evaluator.close`
//! - **Experiment batch:** `workbench.experiments.perform`
//! - **Optimization:** `workbench.optimize`
//!
//! Replies are `{"ok": <payload>}` or `{"error": {"message": "..."}}`.
//!
//! # Sync/Async Bridge
//!
//! The collaborator traits are synchronous, but NATS operations are async.
//! Calls block on the runtime [`Handle`] captured at connect time, so they
//! must run on a blocking thread (`spawn_blocking`), never on a runtime
//! worker.

use std::time::Duration;

use async_nats::client::RequestErrorKind;
use riverguard_core::config::InfrastructureConfig;
use riverguard_core::evaluator::{
    Evaluator, EvaluatorError, EvaluatorFactory, ExperimentRequest, ModelProvider,
    OptimizationRequest,
};
use riverguard_core::formulation::ProblemFormulation;
use riverguard_types::{
    ExperimentResults, LoadedModel, ModelDescription, OptimizationResult, SessionId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Subject names under a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Subjects {
    prefix: String,
}

impl Subjects {
    fn model_load(&self) -> String {
        format!("{}.model.load", self.prefix)
    }

    fn evaluator_open(&self) -> String {
        format!("{}.evaluator.open", self.prefix)
    }

    fn evaluator_close(&self) -> String {
        format!("{}.evaluator.close", self.prefix)
    }

    fn experiments(&self) -> String {
        format!("{}.experiments.perform", self.prefix)
    }

    fn optimize(&self) -> String {
        format!("{}.optimize", self.prefix)
    }
}

/// Reply envelope sent back by the workbench service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Reply<T> {
    Ok(T),
    Error { message: String },
}

#[derive(Debug, Serialize)]
struct LoadModelBody {
    formulation: ProblemFormulation,
}

#[derive(Debug, Serialize)]
struct SessionBody<'a> {
    session: SessionId,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct ExperimentsBody<'a> {
    session: SessionId,
    model: &'a str,
    #[serde(flatten)]
    request: &'a ExperimentRequest,
}

#[derive(Debug, Serialize)]
struct OptimizeBody<'a> {
    session: SessionId,
    model: &'a str,
    #[serde(flatten)]
    request: &'a OptimizationRequest,
}

/// Connection to a workbench service over NATS.
pub struct NatsWorkbench {
    client: async_nats::Client,
    handle: Handle,
    subjects: Subjects,
    timeout: Duration,
}

impl NatsWorkbench {
    /// Connect to the NATS server named in the infrastructure config.
    ///
    /// Must be called from within a tokio runtime; the runtime handle is
    /// kept for the sync bridge.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluatorError::Transport`] if the connection fails.
    pub async fn connect(config: &InfrastructureConfig) -> Result<Self, EvaluatorError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = async_nats::ConnectOptions::new()
            .request_timeout(Some(timeout))
            .connect(config.nats_url.as_str())
            .await
            .map_err(|e| EvaluatorError::Transport {
                message: format!("failed to connect to NATS at {}: {e}", config.nats_url),
            })?;
        let handle = Handle::try_current().map_err(|e| EvaluatorError::Transport {
            message: format!("no tokio runtime available: {e}"),
        })?;
        Ok(Self {
            client,
            handle,
            subjects: Subjects {
                prefix: config.subject_prefix.clone(),
            },
            timeout,
        })
    }
}

impl std::fmt::Debug for NatsWorkbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsWorkbench")
            .field("prefix", &self.subjects.prefix)
            .field("timeout_ms", &self.timeout.as_millis())
            .finish_non_exhaustive()
    }
}

impl ModelProvider for NatsWorkbench {
    fn load_model(
        &mut self,
        formulation: ProblemFormulation,
    ) -> Result<LoadedModel, EvaluatorError> {
        let subject = self.subjects.model_load();
        self.handle.block_on(request(
            &self.client,
            subject,
            &LoadModelBody { formulation },
            provider_failure,
        ))
    }
}

impl EvaluatorFactory for NatsWorkbench {
    type Evaluator = NatsEvaluator;

    fn open(&mut self, model: &ModelDescription) -> Result<NatsEvaluator, EvaluatorError> {
        let session = SessionId::new();
        let subject = self.subjects.evaluator_open();
        self.handle.block_on(request::<_, ()>(
            &self.client,
            subject,
            &SessionBody {
                session,
                model: &model.name,
            },
            evaluation_failure,
        ))?;
        debug!(session = %session, model = model.name, "Evaluator opened");

        Ok(NatsEvaluator {
            client: self.client.clone(),
            handle: self.handle.clone(),
            subjects: self.subjects.clone(),
            session,
            model: model.name.clone(),
        })
    }
}

/// An evaluator session held open on the workbench service.
pub struct NatsEvaluator {
    client: async_nats::Client,
    handle: Handle,
    subjects: Subjects,
    session: SessionId,
    model: String,
}

impl std::fmt::Debug for NatsEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsEvaluator")
            .field("session", &self.session)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Evaluator for NatsEvaluator {
    fn perform_experiments(
        &mut self,
        model: &ModelDescription,
        request: &ExperimentRequest,
    ) -> Result<ExperimentResults, EvaluatorError> {
        let subject = self.subjects.experiments();
        let body = ExperimentsBody {
            session: self.session,
            model: &model.name,
            request,
        };
        self.handle
            .block_on(self::request(&self.client, subject, &body, evaluation_failure))
    }

    fn optimize(
        &mut self,
        model: &ModelDescription,
        request: &OptimizationRequest,
    ) -> Result<OptimizationResult, EvaluatorError> {
        let subject = self.subjects.optimize();
        let body = OptimizeBody {
            session: self.session,
            model: &model.name,
            request,
        };
        self.handle
            .block_on(self::request(&self.client, subject, &body, optimization_failure))
    }

    fn shutdown(&mut self) {
        let subject = self.subjects.evaluator_close();
        let body = SessionBody {
            session: self.session,
            model: &self.model,
        };
        let closed = self.handle.block_on(request::<_, ()>(
            &self.client,
            subject,
            &body,
            evaluation_failure,
        ));
        match closed {
            Ok(()) => debug!(session = %self.session, "Evaluator closed"),
            Err(e) => warn!(
                session = %self.session,
                error = %e,
                "Failed to close evaluator session"
            ),
        }
    }
}

fn provider_failure(message: String) -> EvaluatorError {
    EvaluatorError::Provider { message }
}

fn evaluation_failure(message: String) -> EvaluatorError {
    EvaluatorError::Evaluation { message }
}

fn optimization_failure(message: String) -> EvaluatorError {
    EvaluatorError::Optimization { message }
}

/// Send one request and decode its reply envelope.
///
/// `failure` maps an error reply from the service onto the error kind of
/// the calling collaborator.
async fn request<Q, R>(
    client: &async_nats::Client,
    subject: String,
    body: &Q,
    failure: fn(String) -> EvaluatorError,
) -> Result<R, EvaluatorError>
where
    Q: Serialize,
    R: DeserializeOwned,
{
    let payload = serde_json::to_vec(body).map_err(|e| EvaluatorError::Transport {
        message: format!("failed to serialize request for {subject}: {e}"),
    })?;

    debug!(subject, bytes = payload.len(), "Sending workbench request");
    let message = client
        .request(subject.clone(), payload.into())
        .await
        .map_err(|e| {
            if matches!(e.kind(), RequestErrorKind::TimedOut) {
                EvaluatorError::Timeout {
                    subject: subject.clone(),
                }
            } else {
                EvaluatorError::Transport {
                    message: format!("request on {subject} failed: {e}"),
                }
            }
        })?;

    decode_reply(&subject, &message.payload, failure)
}

/// Decode a reply envelope.
fn decode_reply<R: DeserializeOwned>(
    subject: &str,
    payload: &[u8],
    failure: fn(String) -> EvaluatorError,
) -> Result<R, EvaluatorError> {
    let reply: Reply<R> =
        serde_json::from_slice(payload).map_err(|e| EvaluatorError::Transport {
            message: format!("malformed reply on {subject}: {e}"),
        })?;
    match reply {
        Reply::Ok(value) => Ok(value),
        Reply::Error { message } => Err(failure(message)),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use riverguard_core::config::SearchOver;
    use riverguard_core::epsilon::derive_epsilons;
    use riverguard_core::evaluator::ScenarioSource;
    use riverguard_types::{OutcomeBatch, ParameterValue, Scenario};
    use serde_json::json;

    use super::*;

    fn subjects() -> Subjects {
        Subjects {
            prefix: "workbench".to_owned(),
        }
    }

    #[test]
    fn subjects_share_the_prefix() {
        let subjects = subjects();
        assert_eq!(subjects.model_load(), "workbench.model.load");
        assert_eq!(subjects.evaluator_open(), "workbench.evaluator.open");
        assert_eq!(subjects.evaluator_close(), "workbench.evaluator.close");
        assert_eq!(subjects.experiments(), "workbench.experiments.perform");
        assert_eq!(subjects.optimize(), "workbench.optimize");
    }

    #[test]
    fn ok_reply_yields_payload() {
        let payload = br#"{"ok": {"model": {"name": "dikesnet"}, "planning_steps": 3}}"#;
        let loaded: LoadedModel =
            decode_reply("workbench.model.load", payload, provider_failure).unwrap();
        assert_eq!(loaded.model.name, "dikesnet");
        assert_eq!(loaded.planning_steps, 3);
    }

    #[test]
    fn unit_ok_reply_decodes() {
        let result: Result<(), _> =
            decode_reply("workbench.evaluator.open", br#"{"ok": null}"#, evaluation_failure);
        assert!(result.is_ok());
    }

    #[test]
    fn error_reply_maps_to_caller_kind() {
        let payload = br#"{"error": {"message": "optimizer diverged"}}"#;
        let result: Result<OptimizationResult, _> =
            decode_reply("workbench.optimize", payload, optimization_failure);
        assert!(matches!(
            result,
            Err(EvaluatorError::Optimization { ref message }) if message == "optimizer diverged"
        ));
    }

    #[test]
    fn malformed_reply_is_a_transport_error() {
        let result: Result<LoadedModel, _> =
            decode_reply("workbench.model.load", b"not json", provider_failure);
        assert!(matches!(result, Err(EvaluatorError::Transport { .. })));
    }

    #[test]
    fn experiments_body_flattens_the_request() {
        let session = SessionId::new();
        let request = ExperimentRequest {
            scenarios: ScenarioSource::Sampled(50),
            policies: 4,
        };
        let body = ExperimentsBody {
            session,
            model: "dikesnet",
            request: &request,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "session": session.to_string(),
                "model": "dikesnet",
                "scenarios": { "sampled": 50 },
                "policies": 4,
            })
        );
    }

    #[test]
    fn optimize_body_carries_epsilons_and_reference() {
        let outcomes: OutcomeBatch = [("cost", vec![0.0, 10.0]), ("risk", vec![5.0, 5.0])]
            .into_iter()
            .collect();
        let epsilons = derive_epsilons(&outcomes, &Default::default()).unwrap();
        let mut parameters = BTreeMap::new();
        parameters.insert("A.1_Bmax".to_owned(), ParameterValue::Real(190.0));
        let request = OptimizationRequest {
            nfe: 20,
            search_over: SearchOver::Levers,
            epsilons,
            reference: Scenario::new("reference", parameters),
        };
        let body = OptimizeBody {
            session: SessionId::new(),
            model: "dikesnet",
            request: &request,
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["nfe"], 20);
        assert_eq!(value["search_over"], "levers");
        assert_eq!(value["epsilons"], json!([2.0, 1e-5]));
        assert_eq!(value["reference"]["name"], "reference");
        assert_eq!(value["reference"]["parameters"]["A.1_Bmax"], 190.0);
    }

    #[test]
    fn load_body_sends_formulation_index() {
        let body = LoadModelBody {
            formulation: ProblemFormulation::PerLocation,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "formulation": 3 })
        );
    }

    /// Connecting to an address with nothing listening fails cleanly.
    #[tokio::test]
    async fn connect_failure_is_a_transport_error() {
        let config = InfrastructureConfig {
            nats_url: "nats://127.0.0.1:1".to_owned(),
            ..InfrastructureConfig::default()
        };
        let result = NatsWorkbench::connect(&config).await;
        assert!(matches!(result, Err(EvaluatorError::Transport { .. })));
    }
}
