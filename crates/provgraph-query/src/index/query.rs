//! Translation of annotation predicates into Tantivy queries.
//!
//! The translation is exact for every predicate the parser produces, so results only need
//! the in-memory `matches` check for terms the raw tokenizer could not index.

use tantivy::query::{AllQuery, BooleanQuery, EmptyQuery, Occur, Query, TermQuery, TermSetQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::Term;

use provgraph_core::predicate::{tokens, Predicate};

use super::schema::{pair_term, GraphSchema};

pub fn term_query(field: Field, text: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_text(field, text),
        IndexRecordOption::Basic,
    ))
}

/// Documents whose `field` holds any of `ids`.
pub fn id_set_query<'a>(field: Field, ids: impl IntoIterator<Item = &'a str>) -> Box<dyn Query> {
    Box::new(TermSetQuery::new(
        ids.into_iter().map(|id| Term::from_field_text(field, id)),
    ))
}

/// Documents of one element type (`vertex` or `edge`) that satisfy `predicate`.
pub fn element_query(schema: &GraphSchema, element: &str, predicate: &Predicate) -> Box<dyn Query> {
    Box::new(BooleanQuery::new(vec![
        (Occur::Must, term_query(schema.element, element)),
        (Occur::Must, translate(schema, predicate)),
    ]))
}

pub fn translate(schema: &GraphSchema, predicate: &Predicate) -> Box<dyn Query> {
    match predicate {
        Predicate::Any => Box::new(AllQuery),
        Predicate::Eq { key, value } => term_query(schema.pairs, &pair_term(key, value)),
        Predicate::Contains { key, word } => {
            // A word that is not a single lowercase token can never equal one.
            let mut split = tokens(word);
            match (split.next(), split.next()) {
                (Some(token), None) if token == *word => {
                    term_query(schema.words, &pair_term(key, word))
                }
                _ => Box::new(EmptyQuery),
            }
        }
        Predicate::And(parts) if parts.is_empty() => Box::new(AllQuery),
        Predicate::Or(parts) if parts.is_empty() => Box::new(EmptyQuery),
        Predicate::And(parts) => Box::new(BooleanQuery::new(
            parts.iter().map(|p| (Occur::Must, translate(schema, p))).collect(),
        )),
        Predicate::Or(parts) => Box::new(BooleanQuery::new(
            parts.iter().map(|p| (Occur::Should, translate(schema, p))).collect(),
        )),
        Predicate::Not(inner) => Box::new(BooleanQuery::new(vec![
            (Occur::Must, Box::new(AllQuery) as Box<dyn Query>),
            (Occur::MustNot, translate(schema, inner)),
        ])),
    }
}
