pub mod query;
pub mod reader;
pub mod schema;
pub mod writer;

pub use reader::GraphSearcher;
pub use schema::GraphSchema;
pub use writer::GraphIndexWriter;
