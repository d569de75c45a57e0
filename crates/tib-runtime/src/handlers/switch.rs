//! `mems/<switch>` – read or actuate a single switch.

use serde_json::json;
use tib_kernel::SwitchError;
use tib_types::{Command, Response, SwitchPosition};

use super::{ValueRequest, parse_body};
use crate::context::InstrumentContext;
use crate::protocol::{error_response, ok_response, parse_key_pair, status_ok};

pub fn get(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let Ok((_, name)) = parse_key_pair(cmd.key()) else {
        return error_response(cmd, "Failed to parse mems switch name");
    };
    let Some(sw) = ctx.router.find_switch(name) else {
        return error_response(cmd, "Invalid switch name");
    };
    ok_response(cmd, json!({ "value": sw.state().to_string() }))
}

pub fn set(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let Ok((_, name)) = parse_key_pair(cmd.key()) else {
        return error_response(cmd, "Failed to parse mems switch name");
    };
    let Some(req) = parse_body::<ValueRequest<String>>(cmd) else {
        return error_response(cmd, "Failed to parse switch state");
    };
    if ctx.router.find_switch(name).is_none() {
        return error_response(cmd, "Invalid switch name");
    }
    let Some(target) = SwitchPosition::parse_target(&req.value) else {
        return error_response(cmd, "Invalid switch state");
    };

    match ctx.router.set_switch(name, target) {
        Ok(()) => status_ok(cmd),
        Err(SwitchError::InvalidState(_)) => error_response(cmd, "Invalid switch state"),
        Err(SwitchError::NotFound(_)) => error_response(cmd, "Invalid switch name"),
        Err(SwitchError::Actuation { .. }) => {
            error_response(cmd, &format!("Setting switch {name} to {target} failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Rig;
    use serde_json::json;
    use tib_types::{ResponseKind, SwitchPosition};

    #[test]
    fn set_then_get() {
        let mut rig = Rig::new();
        let r = rig.set("mems/yj_cal_laser", json!({"value":"A"}));
        assert_eq!(r.kind(), ResponseKind::Ok);
        assert_eq!(r.payload(), r#"{"status":"OK"}"#);
        assert_eq!(
            rig.ctx.router.find_switch("yj_cal_laser").unwrap().state(),
            SwitchPosition::A
        );

        let r = rig.get("mems/yj_cal_laser");
        assert_eq!(r.payload(), r#"{"value":"A"}"#);
    }

    #[test]
    fn untouched_switch_reads_unknown() {
        let mut rig = Rig::new();
        assert_eq!(rig.get("mems/hk_forward_retro").payload(), r#"{"value":"U"}"#);
    }

    #[test]
    fn pulse_reaches_the_expander() {
        let mut rig = Rig::new();
        rig.set("mems/hk_mm_sm", json!({"value":"B"}));
        assert_eq!(rig.bench.gpio.writes(), vec![(15, false), (15, true), (15, false)]);
    }

    #[test]
    fn error_messages() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.get("mems").payload(),
            r#"{"error":"Failed to parse mems switch name"}"#
        );
        assert_eq!(
            rig.get("mems/nope").payload(),
            r#"{"error":"Invalid switch name"}"#
        );
        assert_eq!(
            rig.set("mems/yj_mm_sm", json!({"value": 1})).payload(),
            r#"{"error":"Failed to parse switch state"}"#
        );
        assert_eq!(
            rig.set("mems/nope", json!({"value":"A"})).payload(),
            r#"{"error":"Invalid switch name"}"#
        );
        assert_eq!(
            rig.set("mems/yj_mm_sm", json!({"value":"C"})).payload(),
            r#"{"error":"Invalid switch state"}"#
        );
        assert!(rig.bench.gpio.writes().is_empty());
    }

    #[test]
    fn actuation_failure() {
        let mut rig = Rig::new();
        rig.bench.gpio.fail_pin(12);
        let r = rig.set("mems/yj_mm_sm", json!({"value":"A"}));
        assert_eq!(r.payload(), r#"{"error":"Setting switch yj_mm_sm to A failed"}"#);
        assert_eq!(rig.get("mems/yj_mm_sm").payload(), r#"{"value":"U"}"#);
    }
}
