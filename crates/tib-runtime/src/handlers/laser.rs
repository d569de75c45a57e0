//! `laser<name>/<register>` – read and write laser controller registers.
//!
//! The laser and register are resolved before anything else happens, so a
//! request for an unknown laser never reaches the bus or the power rail.
//! The driver rail is switched on before the first access; after a cold
//! start the controllers get the boot wait before they are addressed.

use std::thread;

use serde_json::{Map, Value};
use tib_hal::LaserDriver;
use tib_hal::laser::{laser_node, register_address, to_signed};
use tib_types::{Command, Response};
use tracing::info;

use super::{ValueRequest, parse_body};
use crate::context::InstrumentContext;
use crate::protocol::{error_response, ok_response, parse_key_pair, split_family, status_ok};

/// Resolved target of a laser request.
struct Target<'a> {
    driver: LaserDriver,
    address: u16,
    setting: &'a str,
}

fn resolve(cmd: &Command) -> Result<Target<'_>, Response> {
    let (device, setting) = parse_key_pair(cmd.key())
        .map_err(|_| error_response(cmd, "Failed to parse laser/setting"))?;
    let node = split_family(device)
        .1
        .and_then(laser_node)
        .ok_or_else(|| error_response(cmd, "Invalid laser"))?;
    let address =
        register_address(setting).ok_or_else(|| error_response(cmd, "Invalid laser setting"))?;
    Ok(Target {
        driver: LaserDriver::new(node),
        address,
        setting,
    })
}

/// Switch the driver rail on if needed and wait for the controllers to boot.
fn power_up(ctx: &mut InstrumentContext) -> bool {
    match ctx.devices.ensure_power(true) {
        Ok(true) => {
            info!(wait_ms = ctx.laser_boot_wait.as_millis() as u64, "waiting for laser boot");
            thread::sleep(ctx.laser_boot_wait);
            true
        }
        Ok(false) => true,
        Err(_) => false,
    }
}

/// `{"<register>":<signed 16-bit value>}`.
pub fn get(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let target = match resolve(cmd) {
        Ok(t) => t,
        Err(r) => return r,
    };
    if !power_up(ctx) {
        return error_response(cmd, "Power control failed");
    }
    let Ok(raw) = target.driver.read_u16(ctx.devices.bus(), target.address) else {
        return error_response(cmd, "get_driver_setting failed");
    };

    let mut body = Map::new();
    body.insert(target.setting.to_string(), Value::from(to_signed(raw)));
    ok_response(cmd, Value::Object(body))
}

/// Write `{"value":<u16>}` to the register.
pub fn set(ctx: &mut InstrumentContext, cmd: &Command) -> Response {
    let target = match resolve(cmd) {
        Ok(t) => t,
        Err(r) => return r,
    };
    let Some(req) = parse_body::<ValueRequest<u16>>(cmd) else {
        return error_response(cmd, "Missing setting value");
    };
    if !power_up(ctx) {
        return error_response(cmd, "Power control failed");
    }
    if target
        .driver
        .write_u16(ctx.devices.bus(), target.address, req.value)
        .is_err()
    {
        return error_response(cmd, "set_driver_setting failed");
    }
    status_ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Rig;
    use serde_json::json;
    use tib_hal::sim::{BusOp, SimBench};
    use tib_types::ResponseKind;

    #[test]
    fn unknown_laser_touches_nothing() {
        let mut rig = Rig::new();
        let r = rig.set("laser9999x/current", json!({"value": 10}));
        assert_eq!(r.kind(), ResponseKind::Error);
        assert_eq!(r.payload(), r#"{"error":"Invalid laser"}"#);
        assert!(rig.bench.bus.operations().is_empty());
        assert_eq!(rig.bench.power.toggles(), 0);
    }

    #[test]
    fn get_reads_signed_register() {
        let bench = SimBench::new().with_register(2, 0x1000, 0xFFF6).build();
        let mut rig = Rig::with_bench(bench);
        let r = rig.get("laser1430yj/tec_temperature_measured");
        assert_eq!(r.kind(), ResponseKind::Ok);
        assert_eq!(r.payload(), r#"{"tec_temperature_measured":-10}"#);
        assert!(rig.bench.power.enabled());
        assert_eq!(
            rig.bench.bus.operations(),
            vec![BusOp::Read { node: 2, address: 0x1000 }]
        );
    }

    #[test]
    fn set_writes_register() {
        let mut rig = Rig::new();
        let r = rig.set("laser2330K/CURRENT", json!({"value": 1500}));
        assert_eq!(r.payload(), r#"{"status":"OK"}"#);
        assert_eq!(rig.bench.bus.register(5, 0x1004), Some(1500));
    }

    #[test]
    fn hk_1430_has_its_own_node() {
        let mut rig = Rig::new();
        rig.set("laser1430hk/current", json!({"value": 7}));
        assert_eq!(rig.bench.bus.register(3, 0x1004), Some(7));
    }

    #[test]
    fn power_is_enabled_once() {
        let mut rig = Rig::new();
        rig.get("laser1028y/current");
        rig.get("laser1028y/current");
        assert_eq!(rig.bench.power.toggles(), 1);
    }

    #[test]
    fn error_messages() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.get("laser1028y").payload(),
            r#"{"error":"Failed to parse laser/setting"}"#
        );
        assert_eq!(rig.get("laser/current").payload(), r#"{"error":"Invalid laser"}"#);
        assert_eq!(
            rig.get("laser1028y/flux").payload(),
            r#"{"error":"Invalid laser setting"}"#
        );
        assert_eq!(
            rig.set("laser1028y/current", json!({"value": -1})).payload(),
            r#"{"error":"Missing setting value"}"#
        );
        assert_eq!(
            rig.set("laser1028y/current", json!({})).payload(),
            r#"{"error":"Missing setting value"}"#
        );
        assert!(rig.bench.bus.operations().is_empty());
    }

    #[test]
    fn bus_failures() {
        let mut rig = Rig::new();
        rig.bench.bus.set_offline(true);
        assert_eq!(
            rig.get("laser1510h/current").payload(),
            r#"{"error":"get_driver_setting failed"}"#
        );
        assert_eq!(
            rig.set("laser1510h/current", json!({"value": 1})).payload(),
            r#"{"error":"set_driver_setting failed"}"#
        );
    }

    #[test]
    fn power_failure() {
        let mut rig = Rig::new();
        rig.bench.power.set_faulty(true);
        assert_eq!(
            rig.get("laser1510h/current").payload(),
            r#"{"error":"Power control failed"}"#
        );
        assert!(rig.bench.bus.operations().is_empty());
    }
}
