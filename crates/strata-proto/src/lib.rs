//! Wire protocol for the Strata object layer.
//!
//! Both halves of the system speak in the types defined here: [`value`]
//! holds the scalar values, [`object`] the serialized object graphs with
//! their capability tokens and search handles, [`message`] the
//! request/response envelopes, and [`framing`] the length-prefix framing
//! the transport wraps around every message.
//!
//! Everything derives the rkyv traits and is serialized with rkyv directly:
//!
//! ```ignore
//! use strata_proto::Value;
//!
//! let value = Value::String("hello".into());
//! let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&value).unwrap();
//! let back = rkyv::from_bytes::<Value, rkyv::rancor::Error>(&bytes).unwrap();
//! ```

pub mod error;
pub mod framing;
pub mod message;
pub mod object;
pub mod value;

pub use error::Error;

pub use message::{error_codes, Operation, Request, Response, ResponsePayload, Status};
pub use object::{
    CapabilityOp, CapabilityToken, Condition, Filter, ObjectData, RelationValue, SearchHandle,
};
pub use value::Value;

/// Protocol version for wire compatibility.
pub const PROTOCOL_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let request = Request::basic_search(
            1,
            "sess-1",
            "Book",
            vec![Filter::eq("published", true)],
            10,
            None,
        );

        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&request).unwrap();
        let archived =
            rkyv::access::<message::ArchivedRequest, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: Request =
            rkyv::deserialize::<Request, rkyv::rancor::Error>(archived).unwrap();
        assert_eq!(request, deserialized);
    }

    #[test]
    fn test_response_roundtrip() {
        let response = Response::handle_ok(
            1,
            SearchHandle {
                class_name: "Book".into(),
                cursor_id: "cur-1".into(),
                page_length: 10,
                max_depth: Some(2),
                total_length: 42,
            },
        );

        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&response).unwrap();
        let archived =
            rkyv::access::<message::ArchivedResponse, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: Response =
            rkyv::deserialize::<Response, rkyv::rancor::Error>(archived).unwrap();
        assert_eq!(response, deserialized);
    }
}
