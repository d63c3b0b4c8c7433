//! Request descriptors seen by the throttle gate.

use crate::context::CancelContext;

/// What the gate needs to know about an outbound request.
pub trait RequestDescriptor {
    /// Stable identifier of the backend service, e.g. `"ECR"`.
    fn service_id(&self) -> &str;

    /// Operation name, absent for requests not yet bound to an operation.
    fn operation_name(&self) -> Option<&str>;

    /// Cancellation context propagated from the originating caller.
    fn context(&self) -> &CancelContext;
}

/// API operation a request is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Operation name, e.g. `"DescribeRepositories"`.
    pub name: String,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An outbound request travelling through a [`Handlers`](crate::pipeline::Handlers) pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    service_id: String,
    operation: Option<Operation>,
    context: CancelContext,
    handled: Vec<String>,
}

impl Request {
    /// A request for `service_id` with no operation and a background context.
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            operation: None,
            context: CancelContext::background(),
            handled: Vec::new(),
        }
    }

    /// Bind the request to an operation.
    pub fn with_operation(mut self, name: impl Into<String>) -> Self {
        self.operation = Some(Operation::new(name));
        self
    }

    /// Replace the cancellation context.
    pub fn with_context(mut self, context: CancelContext) -> Self {
        self.context = context;
        self
    }

    /// The bound operation, if any.
    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_ref()
    }

    /// Names of the pipeline handlers that completed for this request, in order.
    pub fn handled(&self) -> &[String] {
        &self.handled
    }

    pub(crate) fn record_handled(&mut self, name: &str) {
        self.handled.push(name.to_string());
    }
}

impl RequestDescriptor for Request {
    fn service_id(&self) -> &str {
        &self.service_id
    }

    fn operation_name(&self) -> Option<&str> {
        self.operation.as_ref().map(|op| op.name.as_str())
    }

    fn context(&self) -> &CancelContext {
        &self.context
    }
}
