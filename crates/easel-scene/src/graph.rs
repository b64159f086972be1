use easel_types::{AssetRef, SceneNode, Snapshot, SlotRole};

/// The mutable scene tree the rendering engine draws.
///
/// Unlike a [`Snapshot`], a scene graph may hold transient UI nodes and
/// session handles; neither survives [`crate::capture`] followed by
/// stabilization.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneGraph {
    pub width: u32,
    pub height: u32,
    pub objects: Vec<SceneNode>,
    pub background_color: Option<String>,
    pub background_image: Option<SceneNode>,
    pub overlay_image: Option<SceneNode>,
}

impl SceneGraph {
    /// An empty canvas with a white background.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_snapshot(Snapshot::blank(width, height))
    }

    /// Rebuild a live scene from a snapshot, replacing nothing but itself.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            width: snapshot.width,
            height: snapshot.height,
            objects: snapshot.objects,
            background_color: snapshot.background_color,
            background_image: snapshot.background_image.map(|node| *node),
            overlay_image: snapshot.overlay_image.map(|node| *node),
        }
    }

    /// Append a node on top of the stack.
    pub fn add(&mut self, node: SceneNode) {
        self.objects.push(node);
    }

    /// Remove a top-level node by id.
    pub fn remove(&mut self, id: &str) -> Option<SceneNode> {
        let index = self.objects.iter().position(|node| node.id == id)?;
        Some(self.objects.remove(index))
    }

    /// Replace the node with the same id anywhere in the tree, returning the
    /// previous one. Returns `None` and leaves the scene unchanged if no node
    /// carries that id.
    pub fn replace(&mut self, node: SceneNode) -> Option<SceneNode> {
        let slot = self.find_mut(&node.id)?;
        Some(std::mem::replace(slot, node))
    }

    /// Find a node by id: objects first, then background and overlay.
    pub fn find(&self, id: &str) -> Option<&SceneNode> {
        self.objects
            .iter()
            .find_map(|node| node.find(id))
            .or_else(|| self.background_image.as_ref().and_then(|n| n.find(id)))
            .or_else(|| self.overlay_image.as_ref().and_then(|n| n.find(id)))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut SceneNode> {
        let SceneGraph {
            objects,
            background_image,
            overlay_image,
            ..
        } = self;
        for node in objects.iter_mut() {
            if let Some(found) = node.find_mut(id) {
                return Some(found);
            }
        }
        if let Some(found) = background_image.as_mut().and_then(|n| n.find_mut(id)) {
            return Some(found);
        }
        overlay_image.as_mut().and_then(|n| n.find_mut(id))
    }

    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.background_color = Some(color.into());
    }

    pub fn set_background_image(&mut self, image: Option<SceneNode>) {
        self.background_image = image;
    }

    pub fn set_overlay_image(&mut self, image: Option<SceneNode>) {
        self.overlay_image = image;
    }

    /// Visit every asset reference on screen, transient nodes included.
    pub fn visit_refs<F>(&self, mut f: F)
    where
        F: FnMut(&SceneNode, SlotRole, &AssetRef),
    {
        let layers = self
            .background_image
            .iter()
            .chain(&self.objects)
            .chain(self.overlay_image.iter());
        for node in layers {
            node.visit_refs(&mut f);
        }
    }

    /// Number of nodes in the scene, nested ones included.
    pub fn node_count(&self) -> usize {
        self.objects.iter().map(SceneNode::subtree_len).sum::<usize>()
            + self.background_image.as_ref().map_or(0, SceneNode::subtree_len)
            + self.overlay_image.as_ref().map_or(0, SceneNode::subtree_len)
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new(1080, 1080)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SceneGraph {
        let mut scene = SceneGraph::new(400, 300);
        scene.add(SceneNode::rect("r1", "#f00"));
        scene.add(SceneNode::group(
            "g1",
            vec![SceneNode::text("t1", "hi"), SceneNode::rect("r2", "#0f0")],
        ));
        scene.set_overlay_image(Some(SceneNode::image("frame", AssetRef::Empty)));
        scene
    }

    #[test]
    fn find_searches_nested_nodes_and_overlay() {
        let scene = scene();
        assert_eq!(scene.find("r2").unwrap().id, "r2");
        assert_eq!(scene.find("frame").unwrap().id, "frame");
        assert!(scene.find("nope").is_none());
    }

    #[test]
    fn visit_refs_includes_transient_and_overlay() {
        let mut scene = scene();
        scene.add(SceneNode::image("ghost", AssetRef::Empty).transient());
        let mut seen = Vec::new();
        scene.visit_refs(|node, role, _| seen.push((node.id.clone(), role)));
        assert_eq!(
            seen,
            vec![
                ("ghost".to_string(), SlotRole::Source),
                ("frame".to_string(), SlotRole::Source),
            ]
        );
    }

    #[test]
    fn replace_swaps_nested_node() {
        let mut scene = scene();
        let previous = scene
            .replace(SceneNode::text("t1", "bye"))
            .expect("t1 exists");
        assert_eq!(previous.text.as_deref(), Some("hi"));
        assert_eq!(scene.find("t1").unwrap().text.as_deref(), Some("bye"));
    }

    #[test]
    fn replace_unknown_id_changes_nothing() {
        let mut scene = scene();
        let before = scene.clone();
        assert!(scene.replace(SceneNode::rect("ghost", "#000")).is_none());
        assert_eq!(scene, before);
    }

    #[test]
    fn remove_only_touches_top_level() {
        let mut scene = scene();
        assert!(scene.remove("r2").is_none());
        assert_eq!(scene.remove("r1").unwrap().id, "r1");
        assert_eq!(scene.objects.len(), 1);
    }

    #[test]
    fn node_count_includes_overlay() {
        assert_eq!(scene().node_count(), 5);
    }
}
