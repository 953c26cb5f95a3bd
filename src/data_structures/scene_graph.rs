//! Scene graph and hierarchical scene organization.
//!
//! The scene is a tree of [`Node`]s rooted in a [`Scene`]. Nodes may carry a
//! renderable [`Model`] plus a baked world transform; pure container nodes
//! only group children. Attaching a subtree to the scene is a single
//! `add_child` on the root, so asynchronous loader completions can land at
//! any time relative to the render loop without observable intermediate
//! states.

use wgpu::util::DeviceExt;

use crate::data_structures::{mesh::Model, transform::Transform};

/// A scene graph node: a transform, optional renderable content, children.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub local: Transform,
    model: Option<Model>,
    instance_buffer: Option<wgpu::Buffer>,
    pub children: Vec<Node>,
}

impl Node {
    /// Create a container node without renderable content.
    pub fn new(name: impl Into<String>, local: Transform) -> Self {
        Self {
            name: name.into(),
            local,
            model: None,
            instance_buffer: None,
            children: Vec::new(),
        }
    }

    /// Give this node renderable content.
    ///
    /// `world` is the composed ancestor transform including this node's
    /// local one; it is baked into the per-node instance buffer here, which
    /// is what keeps the per-frame draw path free of tree walks.
    pub fn attach_model(&mut self, device: &wgpu::Device, world: &Transform, model: Model) {
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} instance buffer", self.name)),
            contents: bytemuck::cast_slice(&[world.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.model = Some(model);
        self.instance_buffer = Some(instance_buffer);
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Number of meshes in this subtree.
    pub fn mesh_count(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.meshes.len())
            + self.children.iter().map(Node::mesh_count).sum::<usize>()
    }

    fn collect<'a>(&'a self, out: &mut Vec<DrawItem<'a>>) {
        if let (Some(model), Some(instance_buffer)) = (&self.model, &self.instance_buffer) {
            out.push(DrawItem {
                model,
                instance_buffer,
            });
        }
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// One renderable unit for the frame: a model and its baked transform.
pub struct DrawItem<'a> {
    pub model: &'a Model,
    pub instance_buffer: &'a wgpu::Buffer,
}

/// The scene: a root container and the flat background colour.
///
/// `background` is `Some` until the environment panorama is installed;
/// clearing it is what lets the panorama show through.
#[derive(Debug)]
pub struct Scene {
    root: Node,
    pub background: Option<wgpu::Color>,
}

impl Scene {
    pub fn new(background: wgpu::Color) -> Self {
        Self {
            root: Node::new("root", Transform::new()),
            background: Some(background),
        }
    }

    /// Attach a loaded subtree under the root. Atomic with respect to the
    /// render loop: the subtree is either entirely absent or entirely present.
    pub fn attach(&mut self, node: Node) {
        self.root.add_child(node);
    }

    /// Drop the flat background so the installed panorama shows through.
    pub fn clear_background(&mut self) {
        self.background = None;
    }

    pub fn child_count(&self) -> usize {
        self.root.children.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.root.mesh_count()
    }

    pub fn children(&self) -> &[Node] {
        &self.root.children
    }

    /// Flatten the tree into the draw list for one frame.
    pub fn draw_items(&self) -> Vec<DrawItem<'_>> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }
}
