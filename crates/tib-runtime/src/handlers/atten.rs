//! `atten<name>/<setting>` – attenuator calibration and level.
//!
//! Settings (case-insensitive): `coeff` for the calibration polynomials,
//! `value` for the level in volts and `valuedb` for the level in dB.  The
//! attenuator serving a laser is indexed by that laser's bus node.

use serde::Deserialize;
use serde_json::json;
use tib_hal::laser::laser_node;
use tib_hal::{Calibration, Units};
use tib_types::{Command, Response};

use super::{ValueRequest, parse_body};
use crate::context::InstrumentContext;
use crate::protocol::{error_response, ok_response, parse_key_pair, split_family, status_ok};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    Coeff,
    Volts,
    Decibels,
}

impl Setting {
    fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("coeff") {
            Some(Setting::Coeff)
        } else if raw.eq_ignore_ascii_case("value") {
            Some(Setting::Volts)
        } else if raw.eq_ignore_ascii_case("valuedb") {
            Some(Setting::Decibels)
        } else {
            None
        }
    }
}

#[derive(Deserialize)]
struct CoeffRequest {
    db2volt: [f64; 3],
    volt2db: [f64; 3],
}

/// Attenuator index and raw setting name for `cmd`.
fn resolve<'a>(cmd: &'a Command, parse_error: &str) -> Result<(usize, &'a str), Response> {
    let (device, setting) =
        parse_key_pair(cmd.key()).map_err(|_| error_response(cmd, parse_error))?;
    let node = split_family(device)
        .1
        .and_then(laser_node)
        .ok_or_else(|| error_response(cmd, "Invalid attenuator"))?;
    Ok((usize::from(node), setting))
}

pub fn get(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let (index, setting) = match resolve(cmd, "Failed to parse atten/setting") {
        Ok(r) => r,
        Err(r) => return r,
    };
    let Some(att) = ctx.attenuators.get(index) else {
        return error_response(cmd, "Invalid attenuator");
    };

    match Setting::parse(setting) {
        Some(Setting::Coeff) => {
            let cal = att.calibration();
            ok_response(
                cmd,
                json!({ "db2volt": cal.db_to_volt, "volt2db": cal.volt_to_db }),
            )
        }
        Some(Setting::Volts | Setting::Decibels) => ok_response(
            cmd,
            json!({ "voltage": att.voltage(), "db": att.decibels() }),
        ),
        None => error_response(cmd, "Invalid setting"),
    }
}

pub fn set(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let (index, setting) = match resolve(cmd, "Failed to parse atten/setting") {
        Ok(r) => r,
        Err(r) => return r,
    };
    let Some(att) = ctx.attenuators.get_mut(index) else {
        return error_response(cmd, "Invalid attenuator");
    };
    let dac = ctx.devices.dac();

    let written = match Setting::parse(setting) {
        Some(Setting::Coeff) => {
            let Some(req) = parse_body::<CoeffRequest>(cmd) else {
                return error_response(cmd, "Improper arguments");
            };
            let cal = Calibration {
                db_to_volt: req.db2volt,
                volt_to_db: req.volt2db,
            };
            att.recalibrate(dac, cal)
        }
        Some(s @ (Setting::Volts | Setting::Decibels)) => {
            let Some(req) = parse_body::<ValueRequest<f64>>(cmd) else {
                return error_response(cmd, "Missing setting value");
            };
            let units = if s == Setting::Volts {
                Units::Volts
            } else {
                Units::Decibels
            };
            att.set(dac, req.value, units)
        }
        None => return error_response(cmd, "Invalid setting"),
    };

    match written {
        Ok(volts) => {
            tracing::debug!(attenuator = index, volts, "attenuator updated");
            status_ok(cmd)
        }
        Err(e) => {
            tracing::error!(attenuator = index, error = %e, "attenuator write failed");
            error_response(cmd, "Attenuator write failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{Rig, body};
    use serde_json::json;
    use tib_types::ResponseKind;

    #[test]
    fn fresh_attenuator_is_uncalibrated() {
        let mut rig = Rig::new();
        let r = rig.get("atten1028y/coeff");
        assert_eq!(
            body(&r),
            json!({"db2volt":[0.0,0.0,0.0],"volt2db":[0.0,0.0,0.0]})
        );
        let r = rig.get("atten1028y/VALUE");
        assert_eq!(body(&r), json!({"voltage":0.0,"db":0.0}));
    }

    #[test]
    fn volts_are_written_to_the_node_channel() {
        let mut rig = Rig::new();
        let r = rig.set("atten1510h/value", json!({"value": 2.048}));
        assert_eq!(r.payload(), r#"{"status":"OK"}"#);
        assert_eq!(rig.bench.dac.last_code(4), Some(2047));

        let v = body(&rig.get("atten1510h/value"));
        assert!((v["voltage"].as_f64().unwrap() - 2.048).abs() < 1e-9);
    }

    #[test]
    fn decibels_use_calibration() {
        let mut rig = Rig::new();
        let r = rig.set(
            "atten1430yj/coeff",
            json!({"db2volt":[0.0,-0.1,0.0],"volt2db":[0.0,-10.0,0.0]}),
        );
        assert_eq!(r.kind(), ResponseKind::Ok);

        rig.set("atten1430yj/valuedb", json!({"value": -20.0}));
        let v = body(&rig.get("atten1430yj/valuedb"));
        assert!((v["voltage"].as_f64().unwrap() - 2.0).abs() < 1e-9);
        assert!((v["db"].as_f64().unwrap() + 20.0).abs() < 1e-9);
    }

    #[test]
    fn recalibration_keeps_db_level() {
        let mut rig = Rig::new();
        rig.set(
            "atten2330k/coeff",
            json!({"db2volt":[0.0,-0.1,0.0],"volt2db":[0.0,-10.0,0.0]}),
        );
        rig.set("atten2330k/valuedb", json!({"value": -10.0}));
        rig.set(
            "atten2330k/coeff",
            json!({"db2volt":[0.0,-0.2,0.0],"volt2db":[0.0,-5.0,0.0]}),
        );
        let v = body(&rig.get("atten2330k/value"));
        assert!((v["voltage"].as_f64().unwrap() - 2.0).abs() < 1e-9);
        assert!((v["db"].as_f64().unwrap() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn error_messages() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.get("atten1028y").payload(),
            r#"{"error":"Failed to parse atten/setting"}"#
        );
        assert_eq!(
            rig.get("atten42q/value").payload(),
            r#"{"error":"Invalid attenuator"}"#
        );
        assert_eq!(
            rig.get("atten1028y/gain").payload(),
            r#"{"error":"Invalid setting"}"#
        );
        assert_eq!(
            rig.set("atten1028y/coeff", json!({"db2volt":[1.0,2.0],"volt2db":[0.0,0.0,0.0]}))
                .payload(),
            r#"{"error":"Improper arguments"}"#
        );
        assert_eq!(
            rig.set("atten1028y/value", json!({"value":"high"})).payload(),
            r#"{"error":"Missing setting value"}"#
        );
        assert!(rig.bench.dac.writes().is_empty());
    }

    #[test]
    fn dac_failure_is_reported() {
        let mut rig = Rig::new();
        rig.set("atten1028y/value", json!({"value": 1.0}));
        rig.bench.dac.set_ready(false);
        let r = rig.set("atten1028y/value", json!({"value": 3.0}));
        assert_eq!(r.payload(), r#"{"error":"Attenuator write failed"}"#);

        let v = body(&rig.get("atten1028y/value"));
        assert!((v["voltage"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    }
}
