use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::event::SurfaceLaunchInfo;

/// Extras key under which app-link launch data is nested.
pub const APPLINK_KEY: &str = "al_applink_data";

/// How and why the app was launched. Captured on cold start or re-entry and
/// moved into the next Init record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributionSnapshot {
    pub calling_package: Option<String>,
    pub referrer_uri: Option<String>,
    pub launch_parameters: Option<Map<String, Value>>,
    /// Only populated on the process's first Init.
    pub install_referrer: Option<String>,
}

impl AttributionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.calling_package.is_none()
            && self.referrer_uri.is_none()
            && self.launch_parameters.is_none()
            && self.install_referrer.is_none()
    }
}

/// Pure capture from launch info. Never fails: anything missing or unparseable
/// is left out of the snapshot.
pub fn capture(launch: Option<&SurfaceLaunchInfo>) -> AttributionSnapshot {
    let Some(launch) = launch else {
        return AttributionSnapshot::default();
    };

    AttributionSnapshot {
        calling_package: non_empty(launch.calling_package.as_deref()),
        referrer_uri: non_empty(launch.data_uri.as_deref()),
        launch_parameters: launch.extras.as_deref().and_then(applink_parameters),
        install_referrer: None,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Pulls the app-link bundle out of the raw extras and rewraps it under
/// `APPLINK_KEY`, the shape downstream consumers expect.
fn applink_parameters(raw: &str) -> Option<Map<String, Value>> {
    let extras: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("Ignoring unparseable launch extras: {}", e);
            return None;
        }
    };

    let applink = extras.get(APPLINK_KEY)?;
    if !applink.is_object() {
        warn!("Launch extras carry a non-object {} entry, dropping it", APPLINK_KEY);
        return None;
    }

    let mut wrapped = Map::new();
    wrapped.insert(APPLINK_KEY.to_string(), applink.clone());
    Some(wrapped)
}
