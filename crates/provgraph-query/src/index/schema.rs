use tantivy::schema::*;

/// Separates key from value inside `pairs` and `words` terms.
const PAIR_SEPARATOR: char = '\u{1f}';

pub const VERTEX: &str = "vertex";
pub const EDGE: &str = "edge";

/// Term stored in the `pairs` (and `words`) fields for one annotation.
pub fn pair_term(key: &str, value: &str) -> String {
    format!("{key}{PAIR_SEPARATOR}{value}")
}

/// Holds field handles for the graph Tantivy schema.
///
/// Vertices and edges share one index; `element` tells them apart. Every annotation is
/// indexed twice: verbatim in `pairs` for equality, and once per token in `words` for
/// `key~word` lookups.
pub struct GraphSchema {
    pub schema: Schema,
    pub element: Field,
    pub id: Field,
    pub kind: Field,
    pub pairs: Field,
    pub words: Field,
    pub src_id: Field,
    pub dst_id: Field,
    pub body: Field,
}

impl GraphSchema {
    pub fn new() -> Self {
        let mut builder = Schema::builder();

        let element = builder.add_text_field("element", STRING | STORED);
        let id = builder.add_text_field("id", STRING | STORED);
        let kind = builder.add_text_field("kind", STRING | STORED);
        let pairs = builder.add_text_field("pairs", STRING);
        let words = builder.add_text_field("words", STRING);
        let src_id = builder.add_text_field("src_id", STRING | STORED);
        let dst_id = builder.add_text_field("dst_id", STRING | STORED);
        let body = builder.add_text_field("body", STORED);

        let schema = builder.build();

        Self {
            schema,
            element,
            id,
            kind,
            pairs,
            words,
            src_id,
            dst_id,
            body,
        }
    }
}

impl Default for GraphSchema {
    fn default() -> Self {
        Self::new()
    }
}
