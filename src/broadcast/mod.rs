//! Room-scoped event publication after successful mutating requests.
//! The transport is an opaque pub/sub sink behind the [`Broadcaster`]
//! trait; clients join a room named after their force.

use serde_json::Value;

use crate::config::ForceConfig;

pub trait Broadcaster: Send + Sync {
    fn publish(&self, room: &str, event: &str, body: Value);
}

/// Default sink that only logs. Deployments wire a real pub/sub
/// transport in its place.
#[derive(Default)]
pub struct LogBroadcaster;

impl Broadcaster for LogBroadcaster {
    fn publish(&self, room: &str, event: &str, body: Value) {
        tracing::debug!(room, event, %body, "broadcast");
    }
}

/// Publish to the acting force's room and, for patrol events, to every
/// force configured as patrol-compatible with it.
pub fn publish_for_force(
    broadcaster: &dyn Broadcaster,
    config: &ForceConfig,
    force: &str,
    event: &str,
    body: Value,
    patrol: bool,
) {
    broadcaster.publish(force, event, body.clone());
    if patrol {
        if let Some(entry) = config.force(force) {
            for other in &entry.patrol_forces {
                broadcaster.publish(other, event, body.clone());
            }
        }
    }
}
