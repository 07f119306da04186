pub mod engine;
pub mod error;
pub mod index;
pub mod store;

pub use engine::{IndexCounts, QueryEngine};
pub use error::QueryError;
pub use index::{GraphIndexWriter, GraphSearcher};
pub use store::{register_index_sink, IndexStore};
