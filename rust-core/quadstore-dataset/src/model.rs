// SPDX-License-Identifier: PMPL-1.0-or-later
//! RDF value types: terms, triples, quads and quad patterns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An RDF term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    /// A named node.
    Iri(String),
    /// A blank node with a store-local label.
    Blank(String),
    /// A literal with optional datatype IRI or language tag.
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Self::Blank(label.into())
    }

    /// A plain string literal.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::Blank(label) => write!(f, "_:{label}"),
            Self::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "\"{value}\"")?;
                if let Some(language) = language {
                    write!(f, "@{language}")?;
                } else if let Some(datatype) = datatype {
                    write!(f, "^^<{datatype}>")?;
                }
                Ok(())
            }
        }
    }
}

/// The graph a quad belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GraphName {
    /// The dataset's unnamed default graph.
    Default,
    /// A named graph.
    Named(Term),
}

impl GraphName {
    pub fn named(term: Term) -> Self {
        Self::Named(term)
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl fmt::Display for GraphName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "DEFAULT"),
            Self::Named(term) => write!(f, "{term}"),
        }
    }
}

/// A subject-predicate-object statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// A triple placed in a graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub graph: GraphName,
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Quad {
    pub fn new(graph: GraphName, subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            graph,
            subject,
            predicate,
            object,
        }
    }

    /// Place `triple` in `graph`.
    pub fn from_triple(graph: GraphName, triple: &Triple) -> Self {
        Self {
            graph,
            subject: triple.subject.clone(),
            predicate: triple.predicate.clone(),
            object: triple.object.clone(),
        }
    }

    /// The quad's statement without its graph.
    pub fn triple(&self) -> Triple {
        Triple::new(
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
        )
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.graph {
            GraphName::Default => {
                write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
            }
            GraphName::Named(graph) => write!(
                f,
                "{} {} {} {graph} .",
                self.subject, self.predicate, self.object
            ),
        }
    }
}

/// A match pattern over quads. `None` positions match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadPattern {
    pub graph: Option<GraphName>,
    pub subject: Option<Term>,
    pub predicate: Option<Term>,
    pub object: Option<Term>,
}

impl QuadPattern {
    /// A pattern matching every quad.
    pub fn any() -> Self {
        Self::default()
    }

    /// Every quad in `graph`.
    pub fn in_graph(graph: GraphName) -> Self {
        Self {
            graph: Some(graph),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: Term) -> Self {
        self.subject = Some(subject);
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: Term) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_object(mut self, object: Term) -> Self {
        self.object = Some(object);
        self
    }

    /// Returns `true` if the subject, predicate and object positions match.
    /// The graph position is not consulted.
    pub fn matches_triple(&self, triple: &Triple) -> bool {
        fn slot(pattern: &Option<Term>, term: &Term) -> bool {
            pattern.as_ref().map_or(true, |p| p == term)
        }
        slot(&self.subject, &triple.subject)
            && slot(&self.predicate, &triple.predicate)
            && slot(&self.object, &triple.object)
    }

    pub fn matches(&self, quad: &Quad) -> bool {
        self.graph.as_ref().map_or(true, |g| *g == quad.graph)
            && self.subject.as_ref().map_or(true, |s| *s == quad.subject)
            && self.predicate.as_ref().map_or(true, |p| *p == quad.predicate)
            && self.object.as_ref().map_or(true, |o| *o == quad.object)
    }
}
