use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

/// Opaque job payload, passed verbatim from `push` to the handler.
pub type Payload = Map<String, Value>;

/// An error raised by a job handler.
#[derive(Debug, Error)]
#[error("{description}")]
pub struct HandlerError {
    pub description: String,
}

impl HandlerError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no handler registered for `{0}`")]
    UnknownHandler(String),
}

/// A unit of deferred work. Implementations are registered once at startup
/// under the handler id that jobs name.
pub trait JobHandler: Send + Sync {
    fn handle(&self, payload: &Payload) -> Result<(), HandlerError>;
}

/// Maps handler ids to their statically-known implementations.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, handler: impl JobHandler + 'static) {
        self.handlers.insert(id.into(), Box::new(handler));
    }

    pub fn resolve(&self, id: &str) -> Result<&dyn JobHandler, RegistryError> {
        self.handlers
            .get(id)
            .map(|handler| handler.as_ref())
            .ok_or_else(|| RegistryError::UnknownHandler(id.to_string()))
    }
}
