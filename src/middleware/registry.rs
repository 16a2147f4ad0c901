use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::warn;

use super::context::RequestContext;
use super::error::MiddlewareError;

pub type MiddlewareFuture<'a> = BoxFuture<'a, Result<(), MiddlewareError>>;

/// A chain handler. Completing normally lets the chain continue; returning
/// an error aborts it; see [`MiddlewareError`] for how each kind renders.
pub trait Middleware: Send + Sync {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a>;
}

/// Adapter registering a plain function (or non-capturing closure) as a
/// handler.
pub struct FnMiddleware<F>(pub F);

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Option<&'a Value>) -> MiddlewareFuture<'a> + Send + Sync,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        param: Option<&'a Value>,
    ) -> MiddlewareFuture<'a> {
        (self.0)(ctx, param)
    }
}

/// How a route (or the innate list) points at a handler.
#[derive(Clone)]
pub enum MiddlewareRef {
    /// A handler held directly, bypassing alias lookup.
    Direct(Arc<dyn Middleware>),
    /// An alias plus a parameter passed through to the handler.
    Aliased(String, Value),
    /// A bare alias.
    Alias(String),
}

impl MiddlewareRef {
    pub fn direct(handler: impl Middleware + 'static) -> Self {
        MiddlewareRef::Direct(Arc::new(handler))
    }

    pub fn label(&self) -> &str {
        match self {
            MiddlewareRef::Direct(_) => "<handler>",
            MiddlewareRef::Aliased(name, _) | MiddlewareRef::Alias(name) => name,
        }
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MiddlewareRef({})", self.label())
    }
}

impl From<&str> for MiddlewareRef {
    fn from(alias: &str) -> Self {
        MiddlewareRef::Alias(alias.to_string())
    }
}

impl From<String> for MiddlewareRef {
    fn from(alias: String) -> Self {
        MiddlewareRef::Alias(alias)
    }
}

impl From<(&str, Value)> for MiddlewareRef {
    fn from((alias, param): (&str, Value)) -> Self {
        MiddlewareRef::Aliased(alias.to_string(), param)
    }
}

/// Process-wide alias → handler mapping plus the innate list.
///
/// Populated once at startup, then shared immutably behind an `Arc`;
/// nothing mutates it while requests are in flight.
#[derive(Default)]
pub struct MiddlewareRegistry {
    handlers: HashMap<String, Arc<dyn Middleware>>,
    innate: Vec<MiddlewareRef>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `alias`. Last write wins; an overwrite is
    /// logged because it usually means two call sites picked the same
    /// alias by accident.
    pub fn register(&mut self, alias: impl Into<String>, handler: impl Middleware + 'static) {
        let alias = alias.into();
        if self
            .handlers
            .insert(alias.clone(), Arc::new(handler))
            .is_some()
        {
            warn!(alias = %alias, "middleware alias re-registered; previous handler replaced");
        }
    }

    /// Appends to the innate list, run before every route-declared chain.
    pub fn always(&mut self, reference: impl Into<MiddlewareRef>) {
        self.innate.push(reference.into());
    }

    pub fn innate(&self) -> &[MiddlewareRef] {
        &self.innate
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.handlers.contains_key(alias)
    }

    /// Resolves a reference to a concrete handler and its parameter.
    pub fn resolve(&self, reference: &MiddlewareRef) -> Option<(Arc<dyn Middleware>, Option<Value>)> {
        match reference {
            MiddlewareRef::Direct(handler) => Some((handler.clone(), None)),
            MiddlewareRef::Aliased(name, param) => self
                .handlers
                .get(name)
                .map(|h| (h.clone(), Some(param.clone()))),
            MiddlewareRef::Alias(name) => self.handlers.get(name).map(|h| (h.clone(), None)),
        }
    }

    /// Aliases in `refs` that no registered handler answers to.
    pub fn unresolved<'r>(&self, refs: &'r [MiddlewareRef]) -> Vec<&'r str> {
        refs.iter()
            .filter(|r| match r {
                MiddlewareRef::Direct(_) => false,
                MiddlewareRef::Aliased(name, _) | MiddlewareRef::Alias(name) => {
                    !self.contains(name)
                }
            })
            .map(|r| r.label())
            .collect()
    }
}
