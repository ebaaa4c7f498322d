use crate::ValueKind;
use crate::error::{HandlerError, RpcServiceEndpointError};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// The function a registered method runs. Receives the request's parameter
/// object and returns the result document.
pub type MethodHandler = Arc<dyn Fn(&Value) -> Result<Value, HandlerError> + Send + Sync>;

/// The registered schema and handler of one remotely callable method.
pub struct MethodDescriptor {
    name: String,
    params: Vec<(String, ValueKind)>,
    return_kind: ValueKind,
    handler: MethodHandler,
}

impl MethodDescriptor {
    pub fn builder() -> MethodDescriptorBuilder {
        MethodDescriptorBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters, in declaration order.
    pub fn params(&self) -> &[(String, ValueKind)] {
        &self.params
    }

    pub fn return_kind(&self) -> ValueKind {
        self.return_kind
    }

    /// Checks `params` against the declared schema.
    ///
    /// Every declared parameter must be present with the declared kind.
    /// Undeclared extra parameters are ignored. On failure, returns a
    /// description of the first mismatch.
    pub fn check_params(&self, params: &Map<String, Value>) -> Result<(), String> {
        for (name, kind) in &self.params {
            match params.get(name) {
                None => return Err(format!("missing parameter {}", name)),
                Some(value) if !kind.matches(value) => {
                    return Err(format!("parameter {} is not {}", name, kind));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Runs the handler and checks its output against the return kind.
    pub fn invoke(&self, params: &Value) -> Result<Value, HandlerError> {
        let result = (self.handler)(params)?;
        if !self.return_kind.matches(&result) {
            return Err(HandlerError(format!(
                "{} returned {} where {} was declared",
                self.name, result, self.return_kind
            )));
        }
        Ok(result)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_kind", &self.return_kind)
            .finish_non_exhaustive()
    }
}

/// Builds a [`MethodDescriptor`].
///
/// ```ignore
/// let add = MethodDescriptor::builder()
///     .method_name("add")
///     .param("num1", ValueKind::Integral)
///     .param("num2", ValueKind::Integral)
///     .return_kind(ValueKind::Integral)
///     .handler(|params| {
///         let num1 = params["num1"].as_i64().unwrap_or(0);
///         let num2 = params["num2"].as_i64().unwrap_or(0);
///         Ok(json!(num1 + num2))
///     })
///     .build()?;
/// ```
#[derive(Default)]
pub struct MethodDescriptorBuilder {
    name: String,
    params: Vec<(String, ValueKind)>,
    return_kind: Option<ValueKind>,
    handler: Option<MethodHandler>,
}

impl MethodDescriptorBuilder {
    pub fn method_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declares a parameter. Order of declaration is preserved.
    pub fn param(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.params.push((name.into(), kind));
        self
    }

    pub fn return_kind(mut self, kind: ValueKind) -> Self {
        self.return_kind = Some(kind);
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<MethodDescriptor, RpcServiceEndpointError> {
        if self.name.is_empty() {
            return Err(RpcServiceEndpointError::EmptyMethodName);
        }

        for (index, (param, _)) in self.params.iter().enumerate() {
            if self.params[..index].iter().any(|(seen, _)| seen == param) {
                return Err(RpcServiceEndpointError::DuplicateParameter {
                    method: self.name,
                    param: param.clone(),
                });
            }
        }

        let Some(return_kind) = self.return_kind else {
            return Err(RpcServiceEndpointError::MissingReturnKind(self.name));
        };
        let Some(handler) = self.handler else {
            return Err(RpcServiceEndpointError::MissingHandler(self.name));
        };

        Ok(MethodDescriptor {
            name: self.name,
            params: self.params,
            return_kind,
            handler,
        })
    }
}
