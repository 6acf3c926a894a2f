//! Scene module
//!
//! Mesh and material data, the node graph, and the draw context the graph is
//! flattened into every frame.

mod graph;
mod loaded_scene;
mod mesh;
mod render_object;

pub use graph::{NodeKey, NodeKind, SceneGraph, SceneNode};
pub use loaded_scene::LoadedScene;
pub use mesh::{
    Bounds, GeoSurface, GpuDrawPushConstants, MaterialConstants, MaterialInstance,
    MaterialPass, MaterialPipeline, MeshAsset, SceneData, Vertex,
};
pub use render_object::{DrawContext, Drawable, RenderObject};
