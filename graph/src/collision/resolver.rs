use std::cell::Cell;
use std::collections::HashMap;

use tracing::debug;

use crate::geom::{center_distance_sq, Position, Rect};

/// Live bounding box for one node. This is the only geometry surface
/// the resolver depends on.
#[derive(Debug, Clone)]
pub struct NodeBox {
    pub id: String,
    pub rect: Rect,
    pub selected: bool,
}

impl NodeBox {
    pub fn new(id: impl Into<String>, rect: Rect) -> Self {
        Self {
            id: id.into(),
            rect,
            selected: false,
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

/// Tuning knobs for drag-time collision resolution.
#[derive(Debug, Clone)]
pub struct CollisionConfig {
    /// Hard ceiling on resolution passes, never a heuristic to disable
    pub max_passes: usize,
    /// Center-coincidence tolerance for the push direction
    pub epsilon: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            max_passes: 3,
            epsilon: 0.1,
        }
    }
}

/// Pushes overlapping nodes out of the way while one node is dragged.
///
/// The dragged node's proposed position is applied tentatively for the
/// duration of the resolution and restored afterwards: only the pushed
/// nodes keep their new positions, while the dragged node's displayed
/// position stays with the ongoing drag.
///
/// Everything runs synchronously on the drag notification path. The
/// boolean in-flight guard makes a nested invocation (triggered by the
/// position mutations this resolver itself performs) a no-op, so the
/// currently running pass owns all position decisions.
pub struct CollisionResolver {
    config: CollisionConfig,
    in_flight: Cell<bool>,
}

impl Default for CollisionResolver {
    fn default() -> Self {
        Self::new(CollisionConfig::default())
    }
}

impl CollisionResolver {
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            config,
            in_flight: Cell::new(false),
        }
    }

    /// Resolve overlaps around a drag in progress. Returns the final
    /// position of every node that moved; the dragged node never
    /// appears in the result. Unknown drag ids resolve to nothing.
    pub fn resolve_drag(
        &self,
        dragged_id: &str,
        proposed: Position,
        boxes: &[NodeBox],
    ) -> HashMap<String, Position> {
        if self.in_flight.replace(true) {
            return HashMap::new();
        }
        let moved = self.resolve(dragged_id, proposed, boxes);
        self.in_flight.set(false);
        moved
    }

    fn resolve(
        &self,
        dragged_id: &str,
        proposed: Position,
        boxes: &[NodeBox],
    ) -> HashMap<String, Position> {
        let mut work: Vec<NodeBox> = boxes.to_vec();
        let dragged = match work.iter().position(|b| b.id == dragged_id) {
            Some(idx) => idx,
            None => return HashMap::new(),
        };
        work[dragged].rect.move_to(proposed);

        for pass in 0..self.config.max_passes {
            let mut any_overlap = false;

            for a in 0..work.len() {
                if a == dragged {
                    continue;
                }
                // Partners include the dragged node's tentative box, so
                // nodes under the drag get pushed away from it.
                let colliding: Vec<usize> = (0..work.len())
                    .filter(|&b| b != a && work[a].rect.intersects(&work[b].rect))
                    .collect();
                if colliding.is_empty() {
                    continue;
                }
                any_overlap = true;

                for b in colliding {
                    let (mover, fixed) = pick_mover(a, b, dragged, &work);
                    if let Some((dx, dy)) =
                        self.push_vector(&work[mover].rect, &work[fixed].rect)
                    {
                        // apply immediately so later pairs in this pass
                        // see the updated geometry
                        work[mover].rect.x += dx;
                        work[mover].rect.y += dy;
                    }
                }
            }

            if !any_overlap {
                debug!(passes = pass, "collision field clean");
                break;
            }
        }

        let mut moved = HashMap::new();
        for (i, current) in work.iter().enumerate() {
            if i == dragged {
                continue;
            }
            if current.rect.pos() != boxes[i].rect.pos() {
                moved.insert(current.id.clone(), current.rect.pos());
            }
        }
        moved
    }

    /// Displacement that pushes `mover` out of `fixed`, along the axis
    /// of the smaller intersection extent, signed toward the mover's
    /// center. Coincident centers push rightward to break the tie
    /// deterministically.
    fn push_vector(&self, mover: &Rect, fixed: &Rect) -> Option<(f64, f64)> {
        let inter = mover.intersection(fixed)?;
        let mover_center = mover.center();
        let fixed_center = fixed.center();
        let dx = mover_center.x - fixed_center.x;
        let dy = mover_center.y - fixed_center.y;

        if dx.abs() < self.config.epsilon && dy.abs() < self.config.epsilon {
            return Some((inter.width, 0.0));
        }

        if inter.width < inter.height {
            Some((inter.width * if dx > 0.0 { 1.0 } else { -1.0 }, 0.0))
        } else {
            Some((0.0, inter.height * if dy > 0.0 { 1.0 } else { -1.0 }))
        }
    }
}

/// Decide which side of an overlapping pair moves. Priority: the
/// dragged node is always fixed, then a selected node stays over an
/// unselected one, then a node touching the dragged box stays, and
/// otherwise the node farther from the drag moves.
fn pick_mover(a: usize, b: usize, dragged: usize, work: &[NodeBox]) -> (usize, usize) {
    if b == dragged {
        return (a, b);
    }

    match (work[a].selected, work[b].selected) {
        (true, false) => return (b, a),
        (false, true) => return (a, b),
        _ => {}
    }

    let a_touches = work[a].rect.intersects(&work[dragged].rect);
    let b_touches = work[b].rect.intersects(&work[dragged].rect);
    match (a_touches, b_touches) {
        (true, false) => return (b, a),
        (false, true) => return (a, b),
        _ => {}
    }

    let da = center_distance_sq(&work[a].rect, &work[dragged].rect);
    let db = center_distance_sq(&work[b].rect, &work[dragged].rect);
    if da < db {
        (b, a)
    } else {
        (a, b)
    }
}
