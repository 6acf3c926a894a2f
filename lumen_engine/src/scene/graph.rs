/// Scene graph: an arena of transform nodes.
///
/// Nodes live in a SlotMap and refer to each other by key. World transforms
/// are cached and only recomputed by `refresh_transform` / `refresh_all`.

use std::sync::Arc;
use glam::Mat4;
use slotmap::{new_key_type, SlotMap};
use crate::error::{Error, Result};
use crate::scene::mesh::MeshAsset;
use crate::scene::render_object::{DrawContext, Drawable, RenderObject};

// ===== SLOT MAP KEY =====

new_key_type! {
    /// Stable key for a node within a SceneGraph.
    pub struct NodeKey;
}

// ===== NODE =====

/// What a node draws
#[derive(Debug, Clone, Default)]
pub enum NodeKind {
    /// Transform only
    #[default]
    Plain,
    /// Draws every surface of the mesh
    Mesh(Arc<MeshAsset>),
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    local_transform: Mat4,
    world_transform: Mat4,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    kind: NodeKind,
}

impl SceneNode {
    pub fn local_transform(&self) -> &Mat4 {
        &self.local_transform
    }

    /// Cached world transform, as of the last refresh
    pub fn world_transform(&self) -> &Mat4 {
        &self.world_transform
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

// ===== GRAPH =====

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    roots: Vec<NodeKey>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under `parent` (or as a root)
    ///
    /// The world transform starts equal to the local one until the next refresh.
    pub fn add_node(&mut self, parent: Option<NodeKey>, local: Mat4, kind: NodeKind) -> Result<NodeKey> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(parent) {
                return Err(Error::InvalidResource(format!("add_node: parent {:?} does not exist", parent)));
            }
        }

        let key = self.nodes.insert(SceneNode {
            local_transform: local,
            world_transform: local,
            parent,
            children: Vec::new(),
            kind,
        });
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.push(key),
            None => self.roots.push(key),
        }
        Ok(key)
    }

    /// Replace a node's local transform. Returns false if the key is invalid.
    pub fn set_local_transform(&mut self, key: NodeKey, local: Mat4) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.local_transform = local;
                true
            }
            None => false,
        }
    }

    /// Replace a node's kind. Returns false if the key is invalid.
    pub fn set_kind(&mut self, key: NodeKey, kind: NodeKind) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.kind = kind;
                true
            }
            None => false,
        }
    }

    /// Move `key` (and its subtree) under `new_parent`, or make it a root
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` if either key is unknown or the move would
    /// create a cycle.
    pub fn reparent(&mut self, key: NodeKey, new_parent: Option<NodeKey>) -> Result<()> {
        if !self.nodes.contains_key(key) {
            return Err(Error::InvalidResource(format!("reparent: node {:?} does not exist", key)));
        }
        if let Some(parent) = new_parent {
            if !self.nodes.contains_key(parent) {
                return Err(Error::InvalidResource(format!("reparent: parent {:?} does not exist", parent)));
            }
            if self.is_ancestor_or_self(key, parent) {
                crate::engine_warn!("lumen::SceneGraph", "Rejected reparent of {:?} under its own descendant", key);
                return Err(Error::InvalidResource("reparent would create a cycle".to_string()));
            }
        }

        self.detach(key);
        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = new_parent;
        }
        match new_parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.push(key),
            None => self.roots.push(key),
        }
        Ok(())
    }

    /// Remove a node and its whole subtree. Returns the number of nodes removed.
    pub fn remove_node(&mut self, key: NodeKey) -> usize {
        if !self.nodes.contains_key(key) {
            return 0;
        }
        self.detach(key);

        let mut removed = 0;
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|n| n.parent)
    }

    pub fn node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ===== TRANSFORMS =====

    /// world = parent_global × local, for `key` and every descendant
    pub fn refresh_transform(&mut self, key: NodeKey, parent_global: &Mat4) {
        let mut stack = vec![(key, *parent_global)];
        while let Some((current, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            node.world_transform = parent_world * node.local_transform;
            let world = node.world_transform;
            stack.extend(node.children.iter().map(|child| (*child, world)));
        }
    }

    /// Refresh every root from the identity
    pub fn refresh_all(&mut self) {
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            self.refresh_transform(root, &Mat4::IDENTITY);
        }
    }

    // ===== TRAVERSAL =====

    /// Emit draws for `key` and its subtree, parents before children
    pub fn draw_node(&self, key: NodeKey, top: &Mat4, ctx: &mut DrawContext) {
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            match &node.kind {
                NodeKind::Plain => {}
                NodeKind::Mesh(mesh) => {
                    let transform = *top * node.world_transform;
                    for surface in &mesh.surfaces {
                        ctx.push(RenderObject {
                            index_count: surface.count,
                            first_index: surface.start_index,
                            index_buffer: mesh.mesh_buffers.index_buffer.buffer,
                            vertex_buffer_address: mesh.mesh_buffers.vertex_buffer_address,
                            material: surface.material.clone(),
                            transform,
                            bounds: surface.bounds,
                        });
                    }
                }
            }
            stack.extend(node.children.iter().rev());
        }
    }

    /// Emit draws for every root, in insertion order
    pub fn draw_all(&self, top: &Mat4, ctx: &mut DrawContext) {
        for root in &self.roots {
            self.draw_node(*root, top, ctx);
        }
    }

    // ===== INTERNAL =====

    fn is_ancestor_or_self(&self, ancestor: NodeKey, mut key: NodeKey) -> bool {
        loop {
            if key == ancestor {
                return true;
            }
            match self.parent(key) {
                Some(parent) => key = parent,
                None => return false,
            }
        }
    }

    /// Unlink `key` from its parent's children or from the roots
    fn detach(&mut self, key: NodeKey) {
        match self.parent(key) {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.retain(|c| *c != key);
                }
            }
            None => self.roots.retain(|r| *r != key),
        }
    }
}

impl Drawable for SceneGraph {
    fn draw(&self, top: &Mat4, ctx: &mut DrawContext) {
        self.draw_all(top, ctx);
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
