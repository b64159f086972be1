//! Scene nodes and the asset-slot walk over them.
//!
//! Nodes nest through a small fixed set of containers: group children
//! (`objects`) and clip masks (`clip_path`). Asset references live in three
//! places: an image's `src`, a derived image's `original_src`, and a pattern
//! fill's `source`. [`SceneNode::collect_slots`] and [`SceneNode::visit_refs`]
//! are the only traversals; every resolver pass goes through them so no
//! nesting path can be missed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::AssetRef;

/// Type discriminator of a scene node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Rect,
    Ellipse,
    Path,
    Text,
    Image,
    Group,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rect => "rect",
            Self::Ellipse => "ellipse",
            Self::Path => "path",
            Self::Text => "text",
            Self::Image => "image",
            Self::Group => "group",
        };
        f.write_str(name)
    }
}

/// A repeating image fill.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternFill {
    pub source: AssetRef,
    #[serde(default = "default_repeat")]
    pub repeat: String,
}

fn default_repeat() -> String {
    "repeat".into()
}

/// Fill style: a CSS color string or an image pattern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fill {
    Color(String),
    Pattern(PatternFill),
}

/// Which reference field of a node an [`AssetSlot`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotRole {
    /// An image's displayed content.
    Source,
    /// The pre-edit original of a derived image.
    Original,
    /// The source image of a pattern fill.
    PatternFill,
}

/// Mutable view of one asset reference inside a node tree.
#[derive(Debug)]
pub struct AssetSlot<'a> {
    pub node_id: &'a str,
    pub role: SlotRole,
    pub reference: &'a mut AssetRef,
}

fn one() -> f64 {
    1.0
}

fn is_one(v: &f64) -> bool {
    *v == 1.0
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// One entry of the scene tree.
///
/// Geometry and style fields common to every kind are explicit; properties
/// only the rendering engine understands ride along in `extra` and are
/// round-tripped untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub id: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub angle: f64,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub scale_x: f64,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub scale_y: f64,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<AssetRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_src: Option<AssetRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<SceneNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<Box<SceneNode>>,
    /// Transient UI nodes (selection handles, hover outlines, crop overlays).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclude_from_export: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SceneNode {
    /// A node of `kind` with default geometry and no content.
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            opacity: 1.0,
            fill: None,
            stroke: None,
            text: None,
            src: None,
            original_src: None,
            filters: Vec::new(),
            objects: Vec::new(),
            clip_path: None,
            exclude_from_export: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn rect(id: impl Into<String>, fill: impl Into<String>) -> Self {
        let mut node = Self::new(NodeKind::Rect, id);
        node.fill = Some(Fill::Color(fill.into()));
        node
    }

    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(NodeKind::Text, id);
        node.text = Some(text.into());
        node
    }

    pub fn image(id: impl Into<String>, src: AssetRef) -> Self {
        let mut node = Self::new(NodeKind::Image, id);
        node.src = Some(src);
        node
    }

    pub fn group(id: impl Into<String>, children: Vec<SceneNode>) -> Self {
        let mut node = Self::new(NodeKind::Group, id);
        node.objects = children;
        node
    }

    pub fn with_geometry(mut self, left: f64, top: f64, width: f64, height: f64) -> Self {
        self.left = left;
        self.top = top;
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_clip_path(mut self, clip: SceneNode) -> Self {
        self.clip_path = Some(Box::new(clip));
        self
    }

    pub fn with_pattern_fill(mut self, source: AssetRef) -> Self {
        self.fill = Some(Fill::Pattern(PatternFill {
            source,
            repeat: default_repeat(),
        }));
        self
    }

    pub fn with_original(mut self, original: AssetRef) -> Self {
        self.original_src = Some(original);
        self
    }

    /// Swap a derived image back to the source it was derived from.
    /// Returns `false` if the node carries no original.
    pub fn restore_original(&mut self) -> bool {
        match self.original_src.take() {
            Some(original) => {
                self.src = Some(original);
                true
            }
            None => false,
        }
    }

    /// Mark this node as UI-only; it is dropped when a snapshot is captured.
    pub fn transient(mut self) -> Self {
        self.exclude_from_export = true;
        self
    }

    /// Push a mutable slot for every asset reference in this subtree.
    pub fn collect_slots<'a>(&'a mut self, out: &mut Vec<AssetSlot<'a>>) {
        let SceneNode {
            id,
            fill,
            src,
            original_src,
            objects,
            clip_path,
            ..
        } = self;
        let node_id: &'a String = id;

        if let Some(reference) = src.as_mut() {
            out.push(AssetSlot {
                node_id,
                role: SlotRole::Source,
                reference,
            });
        }
        if let Some(reference) = original_src.as_mut() {
            out.push(AssetSlot {
                node_id,
                role: SlotRole::Original,
                reference,
            });
        }
        if let Some(Fill::Pattern(pattern)) = fill.as_mut() {
            out.push(AssetSlot {
                node_id,
                role: SlotRole::PatternFill,
                reference: &mut pattern.source,
            });
        }
        for child in objects.iter_mut() {
            child.collect_slots(out);
        }
        if let Some(clip) = clip_path.as_deref_mut() {
            clip.collect_slots(out);
        }
    }

    /// Visit every asset reference in this subtree, read-only.
    pub fn visit_refs<F>(&self, f: &mut F)
    where
        F: FnMut(&SceneNode, SlotRole, &AssetRef),
    {
        if let Some(reference) = &self.src {
            f(self, SlotRole::Source, reference);
        }
        if let Some(reference) = &self.original_src {
            f(self, SlotRole::Original, reference);
        }
        if let Some(Fill::Pattern(pattern)) = &self.fill {
            f(self, SlotRole::PatternFill, &pattern.source);
        }
        for child in &self.objects {
            child.visit_refs(f);
        }
        if let Some(clip) = &self.clip_path {
            clip.visit_refs(f);
        }
    }

    /// Drop transient descendants (group children and clip masks).
    ///
    /// A transient clip mask is removed outright.
    pub fn prune_transient(&mut self) {
        self.objects.retain(|child| !child.exclude_from_export);
        for child in &mut self.objects {
            child.prune_transient();
        }
        if self
            .clip_path
            .as_ref()
            .is_some_and(|clip| clip.exclude_from_export)
        {
            self.clip_path = None;
        }
        if let Some(clip) = self.clip_path.as_deref_mut() {
            clip.prune_transient();
        }
    }

    /// Number of nodes in this subtree, including clip masks.
    pub fn subtree_len(&self) -> usize {
        1 + self.objects.iter().map(SceneNode::subtree_len).sum::<usize>()
            + self.clip_path.as_ref().map_or(0, |clip| clip.subtree_len())
    }

    /// Find a node by id in this subtree.
    pub fn find(&self, id: &str) -> Option<&SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.objects
            .iter()
            .find_map(|child| child.find(id))
            .or_else(|| self.clip_path.as_ref().and_then(|clip| clip.find(id)))
    }

    /// Find a node by id in this subtree, mutably.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut SceneNode> {
        if self.id == id {
            return Some(self);
        }
        let SceneNode {
            objects, clip_path, ..
        } = self;
        for child in objects.iter_mut() {
            if let Some(found) = child.find_mut(id) {
                return Some(found);
            }
        }
        clip_path.as_deref_mut().and_then(|clip| clip.find_mut(id))
    }
}
