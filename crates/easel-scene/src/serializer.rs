use easel_types::{SceneNode, Snapshot, SNAPSHOT_VERSION};
use tracing::debug;

use crate::graph::SceneGraph;

fn keep(node: &SceneNode) -> Option<SceneNode> {
    if node.exclude_from_export {
        return None;
    }
    let mut node = node.clone();
    node.prune_transient();
    Some(node)
}

/// Capture the persistable state of `scene` as an immutable snapshot.
///
/// Canvas dimensions, background and overlay are included. Transient nodes
/// are dropped at every nesting level. The result shares nothing with the
/// live scene, so later rewriting passes cannot disturb what the engine is
/// drawing.
pub fn capture(scene: &SceneGraph) -> Snapshot {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        width: scene.width,
        height: scene.height,
        objects: scene.objects.iter().filter_map(keep).collect(),
        background_color: scene.background_color.clone(),
        background_image: scene.background_image.as_ref().and_then(keep).map(Box::new),
        overlay_image: scene.overlay_image.as_ref().and_then(keep).map(Box::new),
    };
    debug!(
        nodes = snapshot.node_count(),
        dropped = scene.node_count() - snapshot.node_count(),
        "scene captured"
    );
    snapshot
}
