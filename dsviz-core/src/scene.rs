/// Scene graph: nodes with local transforms arranged in a parent/child hierarchy
use nalgebra::{Matrix4, Quaternion, Vector3};

use crate::error::{Error, Result};
use crate::geometry::{Drawable, Geometry, SceneObject};
use crate::transform::Transform;

/// Index of a node inside its [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node owns its local transform and optional payload; the graph owns the nodes
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub transform: Transform,
    pub object: Option<SceneObject>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(object: Option<SceneObject>) -> Self {
        Self {
            object,
            ..Default::default()
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena of scene nodes.
///
/// Parents refer to children by index and children keep a non-owning index
/// back to their parent. Re-parenting is checked so the hierarchy stays a forest.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Add a root node
    pub fn add_node(&mut self, object: Option<SceneObject>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneNode::new(object));
        id
    }

    /// Add a node under an existing parent
    pub fn add_child(&mut self, parent: NodeId, object: Option<SceneObject>) -> Result<NodeId> {
        self.node(parent)?;
        let id = self.add_node(object);
        self.attach_to(id, Some(parent))?;
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&SceneNode> {
        self.nodes.get(id.0).ok_or(Error::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.nodes.get_mut(id.0).ok_or(Error::UnknownNode(id))
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|id| self.nodes[id.0].parent.is_none())
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Whether `ancestor` appears on the parent chain of `node` (a node is its own ancestor)
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    /// Move `child` under `parent`, or make it a root when `parent` is `None`.
    ///
    /// The child is removed from its previous parent first. Attaching a node
    /// to itself or to one of its descendants is rejected.
    pub fn attach_to(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<()> {
        self.node(child)?;
        if let Some(parent) = parent {
            self.node(parent)?;
            if self.is_ancestor(child, parent) {
                return Err(Error::SceneCycle { child, parent });
            }
        }

        if let Some(old_parent) = self.nodes[child.0].parent.take() {
            let siblings = &mut self.nodes[old_parent.0].children;
            match siblings.iter().position(|id| *id == child) {
                Some(pos) => {
                    siblings.remove(pos);
                }
                None => log::warn!("{child:?} was not listed as a child of {old_parent:?}"),
            }
        }

        if let Some(parent) = parent {
            self.nodes[child.0].parent = Some(parent);
            self.nodes[parent.0].children.push(child);
        }
        Ok(())
    }

    pub fn set_relative_transform(
        &mut self,
        id: NodeId,
        location: Vector3<f32>,
        quaternion: Quaternion<f32>,
    ) -> Result<()> {
        let transform = &mut self.node_mut(id)?.transform;
        transform.set_location(location);
        transform.set_quaternion(quaternion);
        Ok(())
    }

    pub fn local_matrix(&self, id: NodeId) -> Result<Matrix4<f32>> {
        Ok(self.node(id)?.transform.to_matrix())
    }

    /// Product of the local matrices from the root down to `id`
    pub fn world_matrix(&self, id: NodeId) -> Result<Matrix4<f32>> {
        let node = self.node(id)?;
        let mut matrix = node.transform.to_matrix();
        let mut current = node.parent;
        while let Some(parent) = current {
            let parent_node = &self.nodes[parent.0];
            matrix = parent_node.transform.to_matrix() * matrix;
            current = parent_node.parent;
        }
        Ok(matrix)
    }

    /// Every node that carries a payload, in insertion order
    pub fn drawables(&self) -> impl Iterator<Item = DrawableNode<'_>> {
        self.ids().filter_map(move |id| {
            self.nodes[id.0].object.as_ref().map(|object| DrawableNode {
                graph: self,
                id,
                object,
            })
        })
    }
}

/// View of a payload-carrying node that resolves its world transform through the graph
#[derive(Debug, Clone, Copy)]
pub struct DrawableNode<'a> {
    graph: &'a SceneGraph,
    id: NodeId,
    object: &'a SceneObject,
}

impl<'a> DrawableNode<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn object(&self) -> &'a SceneObject {
        self.object
    }
}

impl Drawable for DrawableNode<'_> {
    fn world_transform(&self) -> Matrix4<f32> {
        // The id came from this graph, so the lookup cannot fail
        self.graph
            .world_matrix(self.id)
            .unwrap_or_else(|_| Matrix4::identity())
    }

    fn emit_geometry(&self) -> Geometry {
        self.object.geometry()
    }
}
