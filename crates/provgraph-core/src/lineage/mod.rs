pub mod model;
pub mod path;
pub mod traversal;

pub use model::{Bound, LineageGraph, LineageRequest, PathGraph, Subgraph};
pub use path::{link, shortest_path};
pub use traversal::{resolve, traverse, walk};
