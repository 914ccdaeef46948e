//! Path lease executor
//!
//! Acquire, break, renew, release and change leases on a storage path with a
//! bodyless POST carrying `x-ms-lease-*` headers.

use lakeflow_domain::constants::DEFAULT_LEASE_DURATION_SECS;
use lakeflow_domain::{FlowMessage, LeaseAction, LeaseParams};
use reqwest::header::CONTENT_LENGTH;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use super::context::{body_value, header_map, target_url, ActionContext};
use super::error::ActionError;

const LEASE_ACTION: &str = "x-ms-lease-action";
const LEASE_DURATION: &str = "x-ms-lease-duration";
const LEASE_ID: &str = "x-ms-lease-id";
const PROPOSED_LEASE_ID: &str = "x-ms-proposed-lease-id";

pub struct LeaseExecutor {
    ctx: ActionContext,
    defaults: LeaseParams,
}

impl LeaseExecutor {
    #[must_use]
    pub fn new(ctx: ActionContext, defaults: LeaseParams) -> Self {
        Self { ctx, defaults }
    }

    /// Run one lease operation.
    ///
    /// # Errors
    /// `InvalidInput` for a missing URL, action or lease id; otherwise the
    /// token or request failure.
    #[tracing::instrument(skip(self, msg), fields(node = "lease"))]
    pub async fn execute(&self, msg: FlowMessage) -> Result<FlowMessage, ActionError> {
        let params = msg.params::<LeaseParams>().map_err(|err| ActionError::invalid(err.to_string()))?;
        let params = params.or(&self.defaults);

        let url = target_url(params.url.as_deref())?;
        let action = parse_action(params.action.as_deref())?;
        let headers = lease_headers(action, &params)?;

        let token = self.ctx.token().await?;

        let mut request = self
            .ctx
            .request(Method::POST, &url, &token)
            .header(CONTENT_LENGTH, 0)
            .header(LEASE_ACTION, action.to_string())
            .body(Vec::new());
        for (name, value) in &headers {
            request = request.header(*name, value.as_str());
        }

        let outcome = self.ctx.send(request).await;
        self.ctx.completed();
        let response = outcome.inspect_err(|err| error!(%action, error = %err, "lease request failed"))?;

        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let body = body_value(response).await?;
        info!(%action, status, "lease request completed");

        Ok(msg.with_payload(json!({
            "statusCode": status,
            "body": body,
            "headers": Value::Object(headers),
        })))
    }
}

fn parse_action(raw: Option<&str>) -> Result<LeaseAction, ActionError> {
    let raw = raw.filter(|raw| !raw.trim().is_empty()).ok_or_else(|| ActionError::invalid("Action is required"))?;
    raw.parse().map_err(ActionError::InvalidInput)
}

/// Per-action lease headers, in addition to `x-ms-lease-action`.
fn lease_headers(
    action: LeaseAction,
    params: &LeaseParams,
) -> Result<Vec<(&'static str, String)>, ActionError> {
    let duration = || params.lease_duration.unwrap_or(DEFAULT_LEASE_DURATION_SECS).to_string();
    let lease_id = || {
        params
            .lease_id
            .clone()
            .ok_or_else(|| ActionError::invalid(format!("Lease ID is required to {action} a lease")))
    };

    Ok(match action {
        LeaseAction::Acquire => vec![
            (LEASE_DURATION, duration()),
            (
                PROPOSED_LEASE_ID,
                params.proposed_lease_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
        ],
        LeaseAction::Break => Vec::new(),
        LeaseAction::Renew => vec![(LEASE_DURATION, duration()), (LEASE_ID, lease_id()?)],
        LeaseAction::Release => vec![(LEASE_ID, lease_id()?)],
        LeaseAction::Change => vec![
            (LEASE_ID, lease_id()?),
            (
                PROPOSED_LEASE_ID,
                params.proposed_lease_id.clone().ok_or_else(|| {
                    ActionError::invalid("Proposed lease ID is required to change a lease")
                })?,
            ),
        ],
    })
}
