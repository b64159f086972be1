use std::sync::Mutex;

use async_trait::async_trait;
use easel_scene::SceneGraph;
use easel_types::Snapshot;
use thiserror::Error;

/// Failure reported by the rendering engine while loading a snapshot.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// The rendering engine, as seen from the editor.
///
/// `scene` is the pull side: the editor asks for the current tree whenever
/// it needs a snapshot. `load` is the push side: it replaces the live scene
/// and resolves once the engine has finished. A failed `load` must leave the
/// previous scene in place.
#[async_trait]
pub trait SceneHost: Send + Sync {
    fn scene(&self) -> SceneGraph;

    async fn load(&self, snapshot: Snapshot) -> Result<(), HostError>;
}

/// A [`SceneHost`] that keeps the scene in memory and renders nothing.
///
/// Useful for headless tools and tests.
#[derive(Debug, Default)]
pub struct MemoryHost {
    scene: Mutex<SceneGraph>,
    fail_loads: Mutex<usize>,
}

impl MemoryHost {
    pub fn new(scene: SceneGraph) -> Self {
        Self {
            scene: Mutex::new(scene),
            fail_loads: Mutex::new(0),
        }
    }

    /// Mutate the live scene, as a user edit would.
    pub fn edit<R>(&self, f: impl FnOnce(&mut SceneGraph) -> R) -> R {
        f(&mut self.scene.lock().expect("lock poisoned"))
    }

    /// Make the next `count` loads fail.
    pub fn fail_next_loads(&self, count: usize) {
        *self.fail_loads.lock().expect("lock poisoned") = count;
    }
}

#[async_trait]
impl SceneHost for MemoryHost {
    fn scene(&self) -> SceneGraph {
        self.scene.lock().expect("lock poisoned").clone()
    }

    async fn load(&self, snapshot: Snapshot) -> Result<(), HostError> {
        {
            let mut failing = self.fail_loads.lock().expect("lock poisoned");
            if *failing > 0 {
                *failing -= 1;
                return Err(HostError("engine refused the scene".into()));
            }
        }
        *self.scene.lock().expect("lock poisoned") = SceneGraph::from_snapshot(snapshot);
        Ok(())
    }
}
