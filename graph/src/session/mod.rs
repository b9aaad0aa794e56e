//! Interactive session state: the store, node payloads, and live
//! geometry in one place, with layout and collision wired together.
//!
//! Observers are plain injected callbacks owned by the session; there
//! is no global event bus. Layout and collision only read graph
//! topology and mutate geometry, so a failed operation never corrupts
//! the store.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::collision::{CollisionConfig, CollisionResolver, NodeBox};
use crate::core::{CommitRecord, GraphError, GraphStore};
use crate::geom::{Position, Rect};
use crate::layout::{LayoutConfig, LayoutEngine};

/// A geometry change announced to session observers.
#[derive(Debug, Clone)]
pub enum GeometryEvent {
    /// A full arrange pass placed this many nodes
    Arranged { placed: usize },
    /// A node was pushed or moved to a new position
    NodeMoved { id: String, position: Position },
    /// A node's selection flag flipped
    SelectionChanged { id: String, selected: bool },
}

type Observer = Box<dyn Fn(&GeometryEvent)>;

/// Owns the graph, its payloads, and the live node geometry.
pub struct GraphSession {
    store: GraphStore,
    commits: HashMap<String, CommitRecord>,
    /// Live geometry, in node insertion order
    boxes: Vec<NodeBox>,
    /// Memoized levels from the last arrange
    levels: HashMap<String, usize>,
    root: Option<String>,
    selected: Option<String>,
    layout: LayoutEngine,
    resolver: CollisionResolver,
    observers: Vec<Observer>,
}

impl Default for GraphSession {
    fn default() -> Self {
        Self::new(LayoutConfig::default(), CollisionConfig::default())
    }
}

impl GraphSession {
    pub fn new(layout_config: LayoutConfig, collision_config: CollisionConfig) -> Self {
        Self {
            store: GraphStore::new(),
            commits: HashMap::new(),
            boxes: Vec::new(),
            levels: HashMap::new(),
            root: None,
            selected: None,
            layout: LayoutEngine::new(layout_config),
            resolver: CollisionResolver::new(collision_config),
            observers: Vec::new(),
        }
    }

    /// Ingest commit records: build the store and create one default
    /// sized box per node. The first root becomes the designated root.
    pub fn build_from_records(&mut self, records: Vec<CommitRecord>) -> Result<(), GraphError> {
        let store = GraphStore::build(&records)?;
        let size = self.layout.config().node_size;
        self.boxes = store
            .node_ids()
            .map(|id| NodeBox::new(id, Rect::from_pos_size(Position::default(), size)))
            .collect();
        self.commits = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        self.root = store.roots().into_iter().next();
        self.levels.clear();
        self.selected = None;
        self.store = store;
        info!(
            nodes = self.store.node_count(),
            edges = self.store.edge_count(),
            "session graph built"
        );
        Ok(())
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn commit(&self, id: &str) -> Option<&CommitRecord> {
        self.commits.get(id)
    }

    pub fn geometry(&self) -> &[NodeBox] {
        &self.boxes
    }

    pub fn node_box(&self, id: &str) -> Option<&NodeBox> {
        self.boxes.iter().find(|b| b.id == id)
    }

    /// Level memoized by the last arrange
    pub fn level(&self, id: &str) -> Option<usize> {
        self.levels.get(id).copied()
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn set_root(&mut self, id: &str) -> Result<(), GraphError> {
        if !self.store.contains(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        self.root = Some(id.to_string());
        Ok(())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Single-selection model: selecting a node deselects the previous
    /// one.
    pub fn set_selected(&mut self, id: &str, selected: bool) -> Result<(), GraphError> {
        if !self.store.contains(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        if selected {
            if let Some(prev) = self.selected.take() {
                if prev != id {
                    self.set_box_selected(&prev, false);
                    self.emit(GeometryEvent::SelectionChanged {
                        id: prev,
                        selected: false,
                    });
                }
            }
            self.selected = Some(id.to_string());
            self.set_box_selected(id, true);
            debug!(node = id, "node selected");
        } else {
            if self.selected.as_deref() == Some(id) {
                self.selected = None;
            }
            self.set_box_selected(id, false);
            debug!(node = id, "node deselected");
        }
        self.emit(GeometryEvent::SelectionChanged {
            id: id.to_string(),
            selected,
        });
        Ok(())
    }

    /// Register an observer for geometry events.
    pub fn observe(&mut self, observer: impl Fn(&GeometryEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Run the layout engine from the designated root and commit the
    /// returned positions to the live geometry.
    pub fn arrange(&mut self) -> Result<(), GraphError> {
        let root = self.root.clone().ok_or(GraphError::NoRoot)?;
        let positions = self.layout.arrange(&self.store, &root)?;
        self.levels = self.layout.levels(&self.store, &root)?;

        let mut placed = 0;
        for node_box in &mut self.boxes {
            if let Some(p) = positions.get(&node_box.id) {
                node_box.rect.move_to(*p);
                placed += 1;
            }
        }
        self.emit(GeometryEvent::Arranged { placed });
        Ok(())
    }

    /// Handle one drag-move notification. Pushed nodes are committed to
    /// the live geometry; the dragged node itself stays wherever the
    /// ongoing drag says it is.
    pub fn drag(&mut self, id: &str, proposed: Position) -> Result<(), GraphError> {
        if !self.store.contains(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        let moved = self.resolver.resolve_drag(id, proposed, &self.boxes);
        for i in 0..self.boxes.len() {
            let position = match moved.get(&self.boxes[i].id) {
                Some(p) => *p,
                None => continue,
            };
            self.boxes[i].rect.move_to(position);
            let id = self.boxes[i].id.clone();
            self.emit(GeometryEvent::NodeMoved { id, position });
        }
        Ok(())
    }

    fn set_box_selected(&mut self, id: &str, selected: bool) {
        if let Some(node_box) = self.boxes.iter_mut().find(|b| b.id == id) {
            node_box.selected = selected;
        }
    }

    fn emit(&self, event: GeometryEvent) {
        for observer in &self.observers {
            observer(&event);
        }
    }
}
