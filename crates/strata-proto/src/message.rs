//! Request and response message types.

use crate::object::{Filter, ObjectData, SearchHandle};
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A request from client to server.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct Request {
    /// Unique request identifier for correlation.
    pub id: u64,
    /// Caller's session identifier; scopes server-side cursor state.
    pub session_id: String,
    /// The operation to perform.
    pub operation: Operation,
}

/// Operations that can be requested.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum Operation {
    /// Fetch a single object by identifier.
    GetObject {
        /// Model class name.
        class_name: String,
        /// Row identifier.
        uid: String,
        /// Attach mutation capabilities to the result.
        with_capability: bool,
        /// Relationship resolution depth limit.
        max_depth: Option<u32>,
    },
    /// Start a paginated search, returning a cursor handle.
    BasicSearch {
        /// Model class name.
        class_name: String,
        /// Equality filters on stored columns.
        filters: Vec<Filter>,
        /// Rows per page.
        page_length: u64,
        /// Relationship resolution depth limit.
        max_depth: Option<u32>,
    },
    /// Fetch one page of a previously started search.
    FetchObjects {
        /// Model class name.
        class_name: String,
        /// Cursor identifier from a prior search.
        cursor_id: String,
        /// Zero-based page number.
        page: u64,
        /// Rows per page.
        page_length: u64,
        /// Relationship resolution depth limit.
        max_depth: Option<u32>,
    },
    /// Create or update an object.
    SaveObject(ObjectData),
    /// Delete an object.
    DeleteObject(ObjectData),
    /// Ping the server (for health checks).
    Ping,
}

impl Request {
    /// Create a get-object request.
    pub fn get_object(
        id: u64,
        session_id: impl Into<String>,
        class_name: impl Into<String>,
        uid: impl Into<String>,
        with_capability: bool,
        max_depth: Option<u32>,
    ) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            operation: Operation::GetObject {
                class_name: class_name.into(),
                uid: uid.into(),
                with_capability,
                max_depth,
            },
        }
    }

    /// Create a search request.
    pub fn basic_search(
        id: u64,
        session_id: impl Into<String>,
        class_name: impl Into<String>,
        filters: Vec<Filter>,
        page_length: u64,
        max_depth: Option<u32>,
    ) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            operation: Operation::BasicSearch {
                class_name: class_name.into(),
                filters,
                page_length,
                max_depth,
            },
        }
    }

    /// Create a page-fetch request from a search handle.
    pub fn fetch_objects(id: u64, session_id: impl Into<String>, handle: &SearchHandle, page: u64) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            operation: Operation::FetchObjects {
                class_name: handle.class_name.clone(),
                cursor_id: handle.cursor_id.clone(),
                page,
                page_length: handle.page_length,
                max_depth: handle.max_depth,
            },
        }
    }

    /// Create a save request.
    pub fn save_object(id: u64, session_id: impl Into<String>, object: ObjectData) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            operation: Operation::SaveObject(object),
        }
    }

    /// Create a delete request.
    pub fn delete_object(id: u64, session_id: impl Into<String>, object: ObjectData) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            operation: Operation::DeleteObject(object),
        }
    }

    /// Create a ping request.
    pub fn ping(id: u64, session_id: impl Into<String>) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            operation: Operation::Ping,
        }
    }
}

/// A response from server to client.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct Response {
    /// Request ID this response correlates to.
    pub id: u64,
    /// Response status.
    pub status: Status,
    /// Response payload.
    pub payload: ResponsePayload,
}

/// Response status.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum Status {
    /// Request succeeded.
    Ok,
    /// Request failed with an error.
    Error {
        /// Error code for programmatic handling.
        code: u32,
        /// Human-readable error message.
        message: String,
    },
}

impl Status {
    /// Create a success status.
    pub fn ok() -> Self {
        Status::Ok
    }

    /// Create an error status.
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Status::Error {
            code,
            message: message.into(),
        }
    }

    /// Check if this is a success status.
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Check if this is an error status.
    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }
}

/// Response payload variants.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum ResponsePayload {
    /// A single object, `None` when missing or read was denied.
    Object(Option<ObjectData>),
    /// A search cursor handle.
    Handle(SearchHandle),
    /// One page of search results.
    Page {
        /// Objects on this page.
        objects: Vec<ObjectData>,
        /// Whether this is the final page of the cursor.
        is_last_page: bool,
    },
    /// The saved object with assigned uid and fresh capabilities.
    Saved(ObjectData),
    /// Deletion confirmed.
    Deleted,
    /// Pong response to ping.
    Pong,
    /// Empty payload (for errors).
    Empty,
}

impl Response {
    /// Create a get-object response.
    pub fn object_ok(id: u64, object: Option<ObjectData>) -> Self {
        Self {
            id,
            status: Status::ok(),
            payload: ResponsePayload::Object(object),
        }
    }

    /// Create a search handle response.
    pub fn handle_ok(id: u64, handle: SearchHandle) -> Self {
        Self {
            id,
            status: Status::ok(),
            payload: ResponsePayload::Handle(handle),
        }
    }

    /// Create a page response.
    pub fn page_ok(id: u64, objects: Vec<ObjectData>, is_last_page: bool) -> Self {
        Self {
            id,
            status: Status::ok(),
            payload: ResponsePayload::Page {
                objects,
                is_last_page,
            },
        }
    }

    /// Create a save response.
    pub fn saved_ok(id: u64, object: ObjectData) -> Self {
        Self {
            id,
            status: Status::ok(),
            payload: ResponsePayload::Saved(object),
        }
    }

    /// Create a delete response.
    pub fn deleted_ok(id: u64) -> Self {
        Self {
            id,
            status: Status::ok(),
            payload: ResponsePayload::Deleted,
        }
    }

    /// Create a pong response.
    pub fn pong(id: u64) -> Self {
        Self {
            id,
            status: Status::ok(),
            payload: ResponsePayload::Pong,
        }
    }

    /// Create an error response.
    pub fn error(id: u64, code: u32, message: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::error(code, message),
            payload: ResponsePayload::Empty,
        }
    }
}

/// Standard error codes.
pub mod error_codes {
    /// Unknown/internal error.
    pub const INTERNAL: u32 = 1;
    /// Invalid request format.
    pub const INVALID_REQUEST: u32 = 2;
    /// Object not found.
    pub const NOT_FOUND: u32 = 3;
    /// Model class not registered.
    pub const UNKNOWN_MODEL: u32 = 4;
    /// Constructor or accessor validation failed.
    pub const VALIDATION: u32 = 5;
    /// Permission or capability check failed.
    pub const PERMISSION_DENIED: u32 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Filter;

    #[test]
    fn test_get_object_request() {
        let request = Request::get_object(1, "sess-1", "Book", "abc123", true, Some(2));

        assert_eq!(request.id, 1);
        assert_eq!(request.session_id, "sess-1");
        if let Operation::GetObject {
            class_name, uid, ..
        } = &request.operation
        {
            assert_eq!(class_name, "Book");
            assert_eq!(uid, "abc123");
        } else {
            panic!("Expected GetObject operation");
        }
    }

    #[test]
    fn test_fetch_from_handle() {
        let handle = SearchHandle {
            class_name: "Book".into(),
            cursor_id: "cur-1".into(),
            page_length: 25,
            max_depth: None,
            total_length: 100,
        };

        let request = Request::fetch_objects(7, "sess-1", &handle, 3);
        if let Operation::FetchObjects {
            cursor_id,
            page,
            page_length,
            ..
        } = &request.operation
        {
            assert_eq!(cursor_id, "cur-1");
            assert_eq!(*page, 3);
            assert_eq!(*page_length, 25);
        } else {
            panic!("Expected FetchObjects operation");
        }
    }

    #[test]
    fn test_error_response() {
        let response = Response::error(42, error_codes::PERMISSION_DENIED, "update denied");

        assert_eq!(response.id, 42);
        assert!(response.status.is_error());

        if let Status::Error { code, message } = &response.status {
            assert_eq!(*code, error_codes::PERMISSION_DENIED);
            assert_eq!(message, "update denied");
        }
    }

    #[test]
    fn test_message_serialization_roundtrip() {
        let request = Request::basic_search(
            100,
            "sess-9",
            "Book",
            vec![Filter::eq("author", "Frank Herbert")],
            25,
            Some(3),
        );

        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&request).unwrap();
        let archived = rkyv::access::<ArchivedRequest, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: Request =
            rkyv::deserialize::<Request, rkyv::rancor::Error>(archived).unwrap();

        assert_eq!(request, deserialized);

        let response = Response::page_ok(100, vec![ObjectData::new("Book")], true);

        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&response).unwrap();
        let archived = rkyv::access::<ArchivedResponse, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: Response =
            rkyv::deserialize::<Response, rkyv::rancor::Error>(archived).unwrap();

        assert_eq!(response, deserialized);
    }
}
