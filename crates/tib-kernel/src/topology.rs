//! The bench's switch fabric: eight switches and the sixteen routes through
//! them, mirrored across the YJ and HK bands.

use tib_types::SwitchPosition::{self, A, B};

use crate::switching::{RouteError, RouteStep, Router, SwitchLines};

/// Switch names and their `(A, B)` control lines on the GPIO expander.
pub const SWITCHES: [(&str, SwitchLines); 8] = [
    ("yj_cal_laser", SwitchLines { a: 0, b: 1 }),
    ("hk_cal_laser", SwitchLines { a: 2, b: 3 }),
    ("yj_ao_fei", SwitchLines { a: 4, b: 5 }),
    ("hk_ao_fei", SwitchLines { a: 6, b: 7 }),
    ("yj_forward_retro", SwitchLines { a: 8, b: 9 }),
    ("hk_forward_retro", SwitchLines { a: 10, b: 11 }),
    ("yj_mm_sm", SwitchLines { a: 12, b: 13 }),
    ("hk_mm_sm", SwitchLines { a: 14, b: 15 }),
];

type Step = (&'static str, SwitchPosition);
type RouteSpec = (&'static str, &'static str, &'static [Step]);

/// Route table, in declaration order.
pub const ROUTES: [RouteSpec; 16] = [
    ("yj_1430", "yj_ao", &[("yj_cal_laser", B), ("yj_forward_retro", A), ("yj_ao_fei", A)]),
    ("yj_1430", "yj_fei", &[("yj_cal_laser", B), ("yj_forward_retro", A), ("yj_ao_fei", B)]),
    ("yj_cal", "yj_ao", &[("yj_cal_laser", A), ("yj_ao_fei", A)]),
    ("yj_cal", "yj_fei", &[("yj_cal_laser", A), ("yj_ao_fei", B)]),
    ("yj_laser", "yj_ao", &[("yj_cal_laser", B), ("yj_ao_fei", A)]),
    ("yj_laser", "yj_fei", &[("yj_cal_laser", B), ("yj_ao_fei", B)]),
    ("yj_mm", "yj_pd", &[("yj_mm_sm", A)]),
    ("yj_sm", "yj_pd", &[("yj_mm_sm", B)]),
    ("hk_1430", "hk_ao", &[("hk_cal_laser", B), ("hk_forward_retro", A), ("hk_ao_fei", A)]),
    ("hk_1430", "hk_fei", &[("hk_cal_laser", B), ("hk_forward_retro", A), ("hk_ao_fei", B)]),
    ("hk_cal", "hk_ao", &[("hk_cal_laser", A), ("hk_ao_fei", A)]),
    ("hk_cal", "hk_fei", &[("hk_cal_laser", A), ("hk_ao_fei", B)]),
    ("hk_laser", "hk_ao", &[("hk_cal_laser", B), ("hk_ao_fei", A)]),
    ("hk_laser", "hk_fei", &[("hk_cal_laser", B), ("hk_ao_fei", B)]),
    ("hk_mm", "hk_pd", &[("hk_mm_sm", A)]),
    ("hk_sm", "hk_pd", &[("hk_mm_sm", B)]),
];

/// Register [`SWITCHES`] and declare [`ROUTES`] on an empty router.
///
/// # Errors
///
/// Any [`RouteError`] from registration, which on an empty router means the
/// tables above are inconsistent.
pub fn install(router: &mut Router) -> Result<(), RouteError> {
    for (name, lines) in SWITCHES {
        router.add_switch(name, lines)?;
    }
    for (input, output, steps) in ROUTES {
        let steps = steps
            .iter()
            .map(|(switch, state)| RouteStep::new(*switch, *state))
            .collect();
        router.define_route(input, output, steps)?;
    }
    tracing::info!(
        switches = router.switches().len(),
        routes = router.routes().len(),
        "switch fabric configured"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switching::MAX_ACTIVE_ROUTES;
    use std::time::Duration;
    use tib_hal::sim::SimGpio;

    fn bench_router() -> Router {
        let mut router = Router::new(Box::new(SimGpio::new()), Duration::ZERO);
        install(&mut router).unwrap();
        router
    }

    #[test]
    fn full_fabric_installs() {
        let router = bench_router();
        assert_eq!(router.switches().len(), 8);
        assert_eq!(router.routes().len(), 16);
        assert_eq!(router.routes()[0].key().input, "yj_1430");
        assert_eq!(router.routes()[15].key().input, "hk_sm");
    }

    #[test]
    fn install_twice_is_rejected() {
        let mut router = bench_router();
        assert!(install(&mut router).is_err());
        assert_eq!(router.routes().len(), 16);
    }

    #[test]
    fn cal_route_enables_only_itself_per_band() {
        let mut router = bench_router();
        router.apply_route("yj_cal", "yj_ao").unwrap();
        let active: Vec<_> = router
            .active_routes(MAX_ACTIVE_ROUTES)
            .into_iter()
            .map(|k| (k.input.clone(), k.output.clone()))
            .collect();
        assert_eq!(active, vec![("yj_cal".to_string(), "yj_ao".to_string())]);
    }

    #[test]
    fn shared_switches_activate_overlapping_routes() {
        let mut router = bench_router();
        router.apply_route("yj_1430", "yj_ao").unwrap();
        let active: Vec<_> = router
            .active_routes(MAX_ACTIVE_ROUTES)
            .into_iter()
            .map(|k| (k.input.as_str(), k.output.as_str()))
            .collect();
        assert_eq!(active, vec![("yj_1430", "yj_ao"), ("yj_laser", "yj_ao")]);
    }
}
