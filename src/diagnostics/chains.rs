//! Navigable property chains of a parsed expression
//!
//! Collection is purely syntactic. A chain is navigable from a type when its
//! root is a type name (`Patient.name`), or when it is a bare member or
//! `$this` and the surrounding scope has a type: the document's context type
//! at top level, or the element iterated by `where`/`select`/... inside
//! their arguments.

use crate::analyzer::{ITERATING_FUNCTIONS, TYPE_PRESERVING_FUNCTIONS};
use crate::ast::{ChainStep, ExpressionKind, ExpressionNode};
use crate::parser::span::Span;

/// Type and path that bare identifiers resolve against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub root_type: String,
    pub path: Vec<String>,
}

impl Scope {
    pub fn new(root_type: impl Into<String>) -> Self {
        Self {
            root_type: root_type.into(),
            path: Vec::new(),
        }
    }
}

/// One step to validate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStep {
    /// `.name`, or the bare root identifier itself
    Member { name: String, span: Span },
    /// `[index]`, with the span of the index expression
    Index { span: Span },
    /// `.name(args)`
    Call { name: String, span: Span, has_args: bool },
}

/// A chain to check against the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainJob {
    /// Type navigation starts from
    pub root_type: String,
    /// Location of a type-name root, which must itself exist
    pub type_root_span: Option<Span>,
    /// Segments already resolved by the enclosing scope
    pub base_path: Vec<String>,
    pub steps: Vec<JobStep>,
}

impl ChainJob {
    fn typed(name: &str, span: Span) -> Self {
        Self {
            root_type: name.to_string(),
            type_root_span: Some(span),
            base_path: Vec::new(),
            steps: Vec::new(),
        }
    }

    fn scoped(scope: &Scope) -> Self {
        Self {
            root_type: scope.root_type.clone(),
            type_root_span: None,
            base_path: scope.path.clone(),
            steps: Vec::new(),
        }
    }

    /// Scope reached after the member steps collected so far
    fn current_scope(&self) -> Scope {
        let mut path = self.base_path.clone();
        path.extend(self.steps.iter().filter_map(|step| match step {
            JobStep::Member { name, .. } => Some(name.clone()),
            _ => None,
        }));
        Scope {
            root_type: self.root_type.clone(),
            path,
        }
    }
}

fn is_type_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Every navigable chain in `node`, outer chains before the ones in their arguments
pub fn collect_chains(node: &ExpressionNode, scope: Option<&Scope>) -> Vec<ChainJob> {
    let mut jobs = Vec::new();
    collect(node, scope, &mut jobs);
    jobs
}

fn collect(node: &ExpressionNode, scope: Option<&Scope>, jobs: &mut Vec<ChainJob>) {
    let chain = node.chain();

    let mut job = match &chain.root.kind {
        ExpressionKind::Identifier(name) if is_type_name(name) => {
            Some(ChainJob::typed(name, chain.root.span))
        }
        ExpressionKind::Identifier(name) => scope.map(|scope| {
            let mut job = ChainJob::scoped(scope);
            job.steps.push(JobStep::Member {
                name: name.clone(),
                span: chain.root.span,
            });
            job
        }),
        ExpressionKind::Variable { name, sigil: '$' } if name == "this" => {
            scope.map(ChainJob::scoped)
        }
        // Bare calls such as `where(...)` iterate the scope itself
        _ => {
            for child in chain.root.children() {
                collect(child, scope, jobs);
            }
            None
        }
    };

    let mut nested = Vec::new();
    let mut navigable = job.is_some();
    for step in &chain.steps {
        match *step {
            ChainStep::Member { name, span } => {
                if let Some(job) = job.as_mut().filter(|_| navigable) {
                    job.steps.push(JobStep::Member {
                        name: name.to_string(),
                        span,
                    });
                }
            }
            ChainStep::Index { index } => {
                if let Some(job) = job.as_mut().filter(|_| navigable) {
                    job.steps.push(JobStep::Index { span: index.span });
                }
                collect(index, scope, &mut nested);
            }
            ChainStep::Call { name, span, args } => {
                let iterated = match job.as_ref() {
                    Some(job) if navigable && ITERATING_FUNCTIONS.contains(&name) => {
                        Some(job.current_scope())
                    }
                    _ => None,
                };
                if let Some(job) = job.as_mut().filter(|_| navigable) {
                    job.steps.push(JobStep::Call {
                        name: name.to_string(),
                        span,
                        has_args: !args.is_empty(),
                    });
                }
                let arg_scope = if ITERATING_FUNCTIONS.contains(&name) {
                    iterated.as_ref()
                } else {
                    scope
                };
                for arg in args {
                    collect(arg, arg_scope, &mut nested);
                }
                if !TYPE_PRESERVING_FUNCTIONS.contains(&name) {
                    navigable = false;
                }
            }
        }
    }

    if let Some(job) = job.take() {
        jobs.push(job);
    }
    jobs.extend(nested);
}
