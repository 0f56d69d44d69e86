//! NDJSON request/response loop: one `RequestEnvelope` per line in, one
//! `ResponseEnvelope` per line out (spec section 6).

use std::collections::HashMap;

use codify_core::{ControllerError, Value};
use codify_schemas::{
    ApplyRequest, ApplyResponse, GetResourceInfoRequest, ImportRequest, InitializeResponse,
    PlanRequest, RequestEnvelope, ResponseBody, ResponseEnvelope, ValidateRequest, ValidateResponse,
};
use serde::Deserialize;
use serde_json::Value as Json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::Plugin;

/// A line of input is the tagged `RequestEnvelope` plus a correlation id
/// that isn't part of the command/payload tagging, so it's captured
/// separately and the rest flattened into the envelope.
#[derive(Debug, Deserialize)]
struct IncomingLine {
    #[serde(rename = "requestId")]
    request_id: String,
    #[serde(flatten)]
    envelope: RequestEnvelope,
}

fn to_value_map(json: HashMap<String, Json>) -> HashMap<String, Value> {
    json.into_iter().map(|(k, v)| (k, Value::from_json(&v))).collect()
}

/// Read NDJSON requests from `input` until EOF, dispatching each to
/// `plugin` and writing one NDJSON response per request to `output`.
pub async fn run<R, W>(plugin: &Plugin, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let (request_id, result) = match serde_json::from_str::<IncomingLine>(&line) {
            Ok(incoming) => {
                let request_id = incoming.request_id;
                let result = dispatch(plugin, incoming.envelope).await;
                (request_id, result)
            }
            Err(e) => {
                log::warn!("failed to parse request line: {e}");
                ("unknown".to_string(), Err(format!("malformed request: {e}")))
            }
        };

        let response = ResponseEnvelope {
            request_id,
            body: match result {
                Ok(result) => ResponseBody::Ok { result },
                Err(message) => ResponseBody::Error { message },
            },
        };

        let mut serialized = serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                "{{\"requestId\":\"unknown\",\"status\":\"error\",\"message\":\"failed to serialize response: {e}\"}}"
            )
        });
        serialized.push('\n');
        output.write_all(serialized.as_bytes()).await?;
        output.flush().await?;
    }

    Ok(())
}

async fn dispatch(plugin: &Plugin, envelope: RequestEnvelope) -> Result<Json, String> {
    match envelope {
        RequestEnvelope::Initialize => {
            let resources = plugin.initialize();
            to_json(InitializeResponse { resources })
        }
        RequestEnvelope::GetResourceInfo(GetResourceInfoRequest { type_id }) => plugin
            .get_resource_info(&type_id)
            .map_err(|e| e.to_string())
            .and_then(to_json),
        RequestEnvelope::Validate(ValidateRequest { core_parameters, parameters }) => {
            let desired = to_value_map(parameters);
            let result = plugin
                .validate(&core_parameters, &desired)
                .await
                .map_err(|e| e.to_string())?;
            to_json(ValidateResponse {
                is_valid: result.is_valid,
                errors: if result.errors.is_empty() { None } else { Some(result.errors) },
            })
        }
        RequestEnvelope::Plan(PlanRequest { core_parameters, desired, state, stateful_mode }) => {
            let desired = desired.map(to_value_map);
            let state = state.map(to_value_map);
            let plan = plugin
                .plan(core_parameters, desired, state, stateful_mode)
                .await
                .map_err(|e| e.to_string())?;
            to_json(plan.to_wire())
        }
        RequestEnvelope::Apply(ApplyRequest { plan_id, plan, stateful_mode }) => {
            let outcome = match (plan_id, plan) {
                (Some(id), _) => {
                    let id = Uuid::parse_str(&id).map_err(|e| format!("invalid planId: {e}"))?;
                    plugin.apply_by_id(id).await
                }
                (None, Some(wire)) => plugin.apply_wire(&wire, stateful_mode).await,
                (None, None) => Err(ControllerError::Other(
                    "apply requires either planId or an inline plan".to_string(),
                )),
            };
            outcome.map_err(|e| e.to_string())?;
            to_json(ApplyResponse { applied: true })
        }
        RequestEnvelope::Import(ImportRequest { core_parameters, parameters }) => {
            let parameters = to_value_map(parameters);
            let response = plugin
                .import(&core_parameters, &parameters)
                .await
                .map_err(|e| e.to_string())?;
            to_json(response)
        }
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Json, String> {
    serde_json::to_value(value).map_err(|e| format!("failed to serialize response: {e}"))
}
