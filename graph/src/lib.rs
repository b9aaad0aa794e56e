pub mod collision;
pub mod core;
pub mod geom;
pub mod git_backend;
pub mod layout;
pub mod session;

pub use collision::{CollisionConfig, CollisionResolver, NodeBox};
pub use core::{CommitRecord, GraphError, GraphStore};
pub use geom::{Position, Rect, Size};
pub use git_backend::GitWalker;
pub use layout::{LayoutConfig, LayoutEngine};
pub use session::{GeometryEvent, GraphSession};
