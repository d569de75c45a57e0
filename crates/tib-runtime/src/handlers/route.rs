//! `memsroute` – query and apply switch routes.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tib_kernel::RouteError;
use tib_kernel::switching::MAX_ACTIVE_ROUTES;
use tib_types::{Command, Response};
use tracing::error;

use super::parse_body;
use crate::context::InstrumentContext;
use crate::protocol::{error_response, ok_response, status_ok};

#[derive(Deserialize)]
struct RouteRequest {
    input: String,
    output: String,
}

/// `{"active_routes":{"<input>":"<output>",...}}` in declaration order.
pub fn get(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let routes: Map<String, Value> = ctx
        .router
        .active_routes(MAX_ACTIVE_ROUTES)
        .into_iter()
        .map(|k| (k.input.clone(), Value::from(k.output.clone())))
        .collect();
    ok_response(cmd, json!({ "active_routes": routes }))
}

/// Apply the route named by `{"input":..,"output":..}`.
pub fn set(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let Some(req) = parse_body::<RouteRequest>(cmd) else {
        return error_response(cmd, "Failed to parse JSON input or output");
    };

    match ctx.router.apply_route(&req.input, &req.output) {
        Ok(()) => status_ok(cmd),
        Err(RouteError::NoSuchRoute { .. }) => error_response(cmd, "Invalid Route"),
        Err(RouteError::StepFailed { switch, target, .. }) => {
            error_response(cmd, &format!("Setting switch {switch} to {target} failed"))
        }
        Err(e) => {
            error!(error = %e, "internal route error");
            error_response(cmd, "Internal route error")
        }
    }
}
