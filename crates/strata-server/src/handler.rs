//! Request handler for processing client requests.

use std::sync::Arc;

use strata_core::Persistence;
use strata_model::{Instance, ModelError};
use strata_proto::{error_codes, Operation, Request, Response};

use crate::error::Error;

/// Handles incoming requests and dispatches to the persistence engine.
pub struct RequestHandler {
    persistence: Arc<Persistence>,
}

impl RequestHandler {
    /// Create a new request handler over the given persistence engine.
    pub fn new(persistence: Arc<Persistence>) -> Self {
        Self { persistence }
    }

    /// The persistence engine behind this handler.
    pub fn persistence(&self) -> &Arc<Persistence> {
        &self.persistence
    }

    /// Handle a request and return a response.
    pub fn handle(&self, request: &Request) -> Response {
        match self.handle_inner(request) {
            Ok(response) => response,
            Err(e) => self.error_response(request.id, e),
        }
    }

    /// Internal handler that can return errors.
    fn handle_inner(&self, request: &Request) -> Result<Response, Error> {
        match &request.operation {
            Operation::GetObject {
                class_name,
                uid,
                with_capability,
                max_depth,
            } => {
                let instance =
                    self.persistence
                        .get_object(class_name, uid, *with_capability, *max_depth)?;
                Ok(Response::object_ok(
                    request.id,
                    instance.map(|i| i.to_object_data()),
                ))
            }
            Operation::BasicSearch {
                class_name,
                filters,
                page_length,
                max_depth,
            } => {
                let session = self.persistence.sessions().session(&request.session_id);
                let handle = self.persistence.basic_search(
                    &session,
                    class_name,
                    filters.clone(),
                    *page_length,
                    *max_depth,
                )?;
                Ok(Response::handle_ok(request.id, handle))
            }
            Operation::FetchObjects {
                cursor_id,
                page,
                page_length,
                max_depth,
                ..
            } => {
                let session = self.persistence.sessions().session(&request.session_id);
                let (instances, is_last_page) = self.persistence.fetch_objects(
                    &session,
                    cursor_id,
                    *page,
                    *page_length,
                    *max_depth,
                )?;
                let objects = instances.iter().map(|i| i.to_object_data()).collect();
                Ok(Response::page_ok(request.id, objects, is_last_page))
            }
            Operation::SaveObject(data) => {
                let instance = Instance::from_object_data(self.persistence.registry(), data)?;
                let saved = self.persistence.save_object(&instance)?;
                Ok(Response::saved_ok(request.id, saved.to_object_data()))
            }
            Operation::DeleteObject(data) => {
                let instance = Instance::from_object_data(self.persistence.registry(), data)?;
                self.persistence.delete_object(&instance)?;
                Ok(Response::deleted_ok(request.id))
            }
            Operation::Ping => Ok(Response::pong(request.id)),
        }
    }

    /// Convert an error to an error response.
    fn error_response(&self, request_id: u64, error: Error) -> Response {
        let (code, message) = match &error {
            Error::Core(core) => Self::core_error_code(core),
            Error::Model(model) => Self::model_error_code(model),
            Error::Protocol(e) => (error_codes::INVALID_REQUEST, e.to_string()),
            Error::Transport(msg) => (error_codes::INTERNAL, msg.clone()),
            Error::Config(msg) => (error_codes::INTERNAL, msg.clone()),
            Error::Io(e) => (error_codes::INTERNAL, e.to_string()),
        };

        Response::error(request_id, code, message)
    }

    fn core_error_code(error: &strata_core::Error) -> (u32, String) {
        use strata_core::Error as Core;
        match error {
            Core::Model(model) => Self::model_error_code(model),
            Core::Security(e) => (error_codes::PERMISSION_DENIED, e.to_string()),
            Core::UnknownModel(name) => (
                error_codes::UNKNOWN_MODEL,
                format!("unknown model class: {}", name),
            ),
            Core::InvalidReference(msg) => (error_codes::VALIDATION, msg.clone()),
            Core::NotFound(what) => (
                error_codes::NOT_FOUND,
                format!("object not found: {}", what),
            ),
            Core::Protocol(e) => (error_codes::INVALID_REQUEST, e.to_string()),
            other => (error_codes::INTERNAL, other.to_string()),
        }
    }

    fn model_error_code(error: &ModelError) -> (u32, String) {
        match error {
            ModelError::Validation(msg) => (error_codes::VALIDATION, msg.clone()),
            ModelError::UnknownModel(name) => (
                error_codes::UNKNOWN_MODEL,
                format!("unknown model class: {}", name),
            ),
            ModelError::Configuration(msg) => (error_codes::INTERNAL, msg.clone()),
        }
    }
}
