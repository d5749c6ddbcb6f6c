use serde::Serialize;

use super::clause::Clause;
use crate::model::Document;

/// Bind parameter carrying a traversal's start vertex.
pub const START_VERTEX_PARAM: &str = "start_vertex_id";

/// A fully built statement: text for a remote store, bind values, and the
/// clause list it was rendered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    #[serde(rename = "query")]
    pub text: String,
    #[serde(rename = "bindVars")]
    pub bind_vars: Document,
    #[serde(skip)]
    pub clauses: Vec<Clause>,
}

impl Statement {
    pub fn new(clauses: Vec<Clause>, bind_vars: Document) -> Self {
        let text = render(&clauses);
        Self {
            text,
            bind_vars,
            clauses,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

/// Concatenate clauses in declaration order.
pub(crate) fn render(clauses: &[Clause]) -> String {
    clauses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
