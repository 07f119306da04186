pub mod buffer;
pub mod config;
pub mod error;
pub mod filter;
pub mod kernel;
pub mod lineage;
pub mod model;
pub mod predicate;
pub mod source;
pub mod storage;

pub use buffer::{Buffer, BufferElement};
pub use config::KernelConfig;
pub use error::CoreError;
pub use filter::{Filter, FilterChain, Forward};
pub use kernel::{Category, Kernel, KernelHandle, Listing, Registry};
pub use lineage::{Bound, LineageGraph, LineageRequest, PathGraph, Subgraph};
pub use model::{Direction, Edge, EdgeKind, Element, Vertex, VertexKind};
pub use predicate::Predicate;
pub use source::Source;
pub use storage::{MemoryStore, QueryStore, Sink};
