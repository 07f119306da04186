use std::collections::BTreeSet;

use super::{parse_args, Filter, Forward};
use crate::error::CoreError;
use crate::model::{Edge, Vertex, TYPE_KEY};

/// Removes a fixed set of annotation keys from every vertex and edge, endpoints included.
#[derive(Debug, Clone)]
pub struct DropKeys {
    keys: BTreeSet<String>,
}

impl DropKeys {
    pub const NAME: &'static str = "drop-keys";

    pub fn new<I, S>(keys: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(CoreError::Config("drop-keys needs at least one key".into()));
        }
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(CoreError::Config("drop-keys got an empty key".into()));
        }
        if keys.contains(TYPE_KEY) {
            return Err(CoreError::Config(format!("'{TYPE_KEY}' cannot be dropped")));
        }
        Ok(Self { keys })
    }

    /// Accepts `keys=a,b,c`.
    pub fn from_args(args: &str) -> Result<Self, CoreError> {
        let args = parse_args(args);
        let keys = args
            .get("keys")
            .ok_or_else(|| CoreError::Config("drop-keys requires 'keys=a,b,...'".into()))?;
        Self::new(keys.split(',').map(str::trim))
    }

    fn strip(&self, vertex: &mut Vertex) {
        for key in &self.keys {
            vertex.remove_annotation(key);
        }
    }
}

impl Filter for DropKeys {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn put_vertex(&mut self, mut vertex: Vertex, out: &mut Forward) -> Result<(), CoreError> {
        self.strip(&mut vertex);
        out.vertex(vertex);
        Ok(())
    }

    fn put_edge(&mut self, mut edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
        for key in &self.keys {
            edge.remove_annotation(key);
        }
        let (src, dst) = edge.endpoints_mut();
        self.strip(src);
        self.strip(dst);
        out.edge(edge);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::*;
    use crate::model::Element;

    #[test]
    fn test_drops_from_vertices_edges_and_endpoints() {
        let mut filter = DropKeys::from_args("keys=time,seq").unwrap();
        let p = process("1").with("time", "5");
        let a = artifact("/x").with("seq", "9");
        let e = Edge::used(p.clone(), a).unwrap().with("time", "5").with("op", "read");
        let out = run(&mut filter, vec![p.into(), e.into()]);

        assert_eq!(out[0], Element::Vertex(process("1")));
        let Element::Edge(e) = &out[1] else {
            panic!("expected edge");
        };
        assert_eq!(e.get("time"), None);
        assert_eq!(e.get("op"), Some("read"));
        assert_eq!(e.source(), &process("1"));
        assert_eq!(e.destination(), &artifact("/x"));
    }

    #[test]
    fn test_argument_validation() {
        assert!(DropKeys::from_args("").is_err());
        assert!(DropKeys::from_args("keys=").is_err());
        assert!(DropKeys::from_args("keys=a,,b").is_err());
        assert!(DropKeys::from_args("keys=type").is_err());
        assert!(DropKeys::from_args("keys=a").is_ok());
    }
}
