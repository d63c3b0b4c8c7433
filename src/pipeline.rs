//! Named request handlers run before an outbound request is sent.
//!
//! A [`Handlers`] pipeline has a `build` phase (request parameters are finalized) followed by a
//! `sign` phase. Each phase is an ordered [`HandlerList`]; handler names are unique within a list,
//! so registering a name twice replaces the earlier handler instead of running it twice.

use crate::error::BoxError;
use crate::request::Request;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

type Hook = Arc<dyn for<'a> Fn(&'a mut Request) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync>;

/// A handler function with the name it is registered under.
#[derive(Clone)]
pub struct NamedHandler {
    name: String,
    hook: Hook,
}

impl NamedHandler {
    pub fn new<F>(name: impl Into<String>, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, Result<(), BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self { name: name.into(), hook: Arc::new(hook) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NamedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedHandler").field("name", &self.name).field("hook", &"<hook>").finish()
    }
}

/// Ordered list of uniquely named handlers.
#[derive(Debug, Clone, Default)]
pub struct HandlerList {
    handlers: Vec<NamedHandler>,
}

impl HandlerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler, or replace in place one already registered under the same name.
    pub fn push_back_named(&mut self, handler: NamedHandler) {
        match self.position(handler.name()) {
            Some(idx) => self.handlers[idx] = handler,
            None => self.handlers.push(handler),
        }
    }

    /// Insert a handler at the front, dropping any earlier registration under the same name.
    pub fn push_front_named(&mut self, handler: NamedHandler) {
        if let Some(idx) = self.position(handler.name()) {
            self.handlers.remove(idx);
        }
        self.handlers.insert(0, handler);
    }

    /// Remove the handler registered under `name`; returns whether one was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(idx) => {
                self.handlers.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Registered names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(NamedHandler::name).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run every handler in order, stopping at the first failure.
    pub async fn run(&self, req: &mut Request) -> Result<(), BoxError> {
        for handler in &self.handlers {
            (handler.hook)(&mut *req).await?;
            req.record_handled(handler.name());
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.handlers.iter().position(|h| h.name == name)
    }
}

/// Request lifecycle: `build` handlers, then `sign` handlers, then the request is sent.
#[derive(Debug, Clone, Default)]
pub struct Handlers {
    pub build: HandlerList,
    pub sign: HandlerList,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run both phases in order. An error means the request must not be sent.
    pub async fn dispatch(&self, req: &mut Request) -> Result<(), BoxError> {
        self.build.run(req).await?;
        self.sign.run(req).await
    }
}
