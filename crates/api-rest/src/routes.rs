//! Named routes of the patient plugin.
//!
//! The plugin contributes three routes under its mount prefix and one override that the host
//! mounts at its site root, replacing the host's own `patients/` list route. Names follow the
//! `app:name` convention used by [`reverse`].

/// Namespace of the plugin's routes.
pub const APP_NAME: &str = "patient_plugin";

/// View served by a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteView {
    PatientList,
    CompactPatientList,
    PatientStats,
}

#[derive(Clone, Copy, Debug)]
pub struct UrlPattern {
    /// Path relative to the mount point, with the trailing slash.
    pub path: &'static str,
    pub name: &'static str,
    pub view: RouteView,
}

/// A replacement for a host route: `pattern.path` is joined onto `prefix` at the site root.
#[derive(Clone, Copy, Debug)]
pub struct UrlOverride {
    pub prefix: &'static str,
    pub pattern: UrlPattern,
}

pub const URL_PATTERNS: [UrlPattern; 3] = [
    UrlPattern {
        path: "patients/",
        name: "patient_list",
        view: RouteView::PatientList,
    },
    UrlPattern {
        path: "patients/compact/",
        name: "compact_patient_list",
        view: RouteView::CompactPatientList,
    },
    UrlPattern {
        path: "patients/stats/",
        name: "patient_stats",
        view: RouteView::PatientStats,
    },
];

pub const URL_OVERRIDES: [UrlOverride; 1] = [UrlOverride {
    prefix: "patients/",
    pattern: UrlPattern {
        path: "",
        name: "list",
        view: RouteView::PatientList,
    },
}];

/// A concrete route: absolute path plus the view serving it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mounted {
    pub path: String,
    pub view: RouteView,
}

/// Every route the plugin serves when mounted at `mount_prefix`, overrides included.
///
/// An override whose path coincides with a plugin route (plugin mounted at the root) is dropped.
pub fn mounted_routes(mount_prefix: &str) -> Vec<Mounted> {
    let mut routes: Vec<Mounted> = URL_PATTERNS
        .iter()
        .map(|p| Mounted {
            path: join(mount_prefix, p.path),
            view: p.view,
        })
        .collect();

    for o in URL_OVERRIDES {
        let path = join("", &format!("{}{}", o.prefix, o.pattern.path));
        if routes.iter().any(|r| r.path == path) {
            tracing::debug!(%path, "override shadowed by plugin route");
            continue;
        }
        routes.push(Mounted {
            path,
            view: o.pattern.view,
        });
    }
    routes
}

/// Resolves a route name to its absolute path.
///
/// `patient_plugin:<name>` resolves among the plugin routes under `mount_prefix`; a bare name
/// resolves among the overrides at the site root.
pub fn reverse(name: &str, mount_prefix: &str) -> Option<String> {
    match name.split_once(':') {
        Some((app, route)) if app == APP_NAME => URL_PATTERNS
            .iter()
            .find(|p| p.name == route)
            .map(|p| join(mount_prefix, p.path)),
        Some(_) => None,
        None => URL_OVERRIDES
            .iter()
            .find(|o| o.pattern.name == name)
            .map(|o| join("", &format!("{}{}", o.prefix, o.pattern.path))),
    }
}

fn join(prefix: &str, path: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), path)
}
