//! `power`, `status` and `sleep` – the laser driver power rail.

use serde_json::json;
use tib_types::{Command, Response};

use super::{ValueRequest, parse_body};
use crate::context::InstrumentContext;
use crate::protocol::{error_response, ok_response, status_ok};

fn rail_state(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    match ctx.devices.power_enabled() {
        Ok(on) => ok_response(cmd, json!({ "power": on })),
        Err(_) => error_response(cmd, "Power control failed"),
    }
}

fn drive_rail(ctx: &mut InstrumentContext, cmd: &Command, on: bool) -> Response {
    match ctx.devices.ensure_power(on) {
        Ok(_) => status_ok(cmd),
        Err(_) => error_response(cmd, "Power control failed"),
    }
}

/// `{"power":bool}`.
pub fn get(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    rail_state(ctx, cmd)
}

/// `{"value":bool}` switches the rail.
pub fn set(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let Some(req) = parse_body::<ValueRequest<bool>>(cmd) else {
        return error_response(cmd, "Missing setting value");
    };
    drive_rail(ctx, cmd, req.value)
}

pub fn status(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    rail_state(ctx, cmd)
}

/// `{"value":true}` powers the laser drivers down; `false` leaves them as
/// they are.
pub fn sleep(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let Some(req) = parse_body::<ValueRequest<bool>>(cmd) else {
        return error_response(cmd, "Missing setting value");
    };
    if req.value {
        drive_rail(ctx, cmd, false)
    } else {
        status_ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Rig;
    use serde_json::json;
    use tib_hal::sim::SimBench;
    use tib_types::ResponseKind;

    #[test]
    fn power_toggle_round_trip() {
        let mut rig = Rig::new();
        assert_eq!(rig.get("power").payload(), r#"{"power":false}"#);

        let r = rig.set("power", json!({"value": true}));
        assert_eq!(r.kind(), ResponseKind::Ok);
        assert_eq!(r.payload(), r#"{"status":"OK"}"#);
        assert_eq!(rig.get("power").payload(), r#"{"power":true}"#);
        assert_eq!(rig.get("status").payload(), r#"{"power":true}"#);
    }

    #[test]
    fn repeated_request_is_a_no_op() {
        let mut rig = Rig::new();
        rig.set("power", json!({"value": true}));
        rig.set("power", json!({"value": true}));
        assert_eq!(rig.bench.power.toggles(), 1);
    }

    #[test]
    fn sleep_powers_down() {
        let mut rig = Rig::with_bench(SimBench::new().with_power_on().build());
        let r = rig.set("sleep", json!({"value": false}));
        assert_eq!(r.kind(), ResponseKind::Ok);
        assert!(rig.bench.power.enabled());

        let r = rig.set("sleep", json!({"value": true}));
        assert_eq!(r.kind(), ResponseKind::Ok);
        assert!(!rig.bench.power.enabled());
    }

    #[test]
    fn bad_bodies_and_faults() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.set("power", json!({"value": "on"})).payload(),
            r#"{"error":"Missing setting value"}"#
        );
        assert_eq!(
            rig.set("sleep", json!({})).payload(),
            r#"{"error":"Missing setting value"}"#
        );

        rig.bench.power.set_faulty(true);
        assert_eq!(
            rig.set("power", json!({"value": true})).payload(),
            r#"{"error":"Power control failed"}"#
        );
    }
}
