use crate::dto::HealthRes;

/// Health service shared by the standalone plugin server and the host binary.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Reports the service as alive. `component` names the process answering.
    pub fn check_health(component: &str) -> HealthRes {
        HealthRes {
            ok: true,
            message: format!("{component} is alive"),
        }
    }
}
