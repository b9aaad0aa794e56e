pub mod error;
pub mod node;
pub mod store;

pub use error::GraphError;
pub use node::CommitRecord;
pub use store::GraphStore;
