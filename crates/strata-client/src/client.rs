//! The high-level client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use strata_proto::{
    Filter, ObjectData, Request, Response, ResponsePayload, SearchHandle, Status,
};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::Error;
use crate::results::{FetchPage, SearchResults};

/// A client for connecting to and interacting with a Strata server.
///
/// # Example
///
/// ```ignore
/// use strata_client::{Client, ClientConfig};
/// use strata_proto::Filter;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::connect(ClientConfig::localhost()).await?;
///
///     let results = client
///         .search("Book", vec![Filter::eq("published", true)], 25, None)
///         .await?;
///     let mut pager = results.pager();
///     while let Some(page) = pager.next_page().await? {
///         for book in page {
///             println!("{:?}", book.attribute("title"));
///         }
///     }
///
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct Client {
    connection: Arc<Mutex<Connection>>,
    session_id: String,
    next_request_id: AtomicU64,
}

impl Client {
    /// Connect to a Strata server.
    pub async fn connect(config: ClientConfig) -> Result<Self, Error> {
        let session_id = config.session_id.clone();
        let connection = Connection::establish(config).await?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            session_id,
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Connect to a server at the given address.
    pub async fn connect_to(address: impl Into<String>) -> Result<Self, Error> {
        Self::connect(ClientConfig::new(address)).await
    }

    /// Connect to localhost on the default port.
    pub async fn connect_localhost() -> Result<Self, Error> {
        Self::connect(ClientConfig::localhost()).await
    }

    /// Fetch a single object by identifier.
    ///
    /// Returns `None` when the row does not exist. A row the caller is
    /// not permitted to read also comes back as `None`.
    pub async fn get(
        &self,
        class_name: impl Into<String>,
        uid: impl Into<String>,
        with_capability: bool,
        max_depth: Option<u32>,
    ) -> Result<Option<ObjectData>, Error> {
        let request = Request::get_object(
            self.next_request_id(),
            &self.session_id,
            class_name,
            uid,
            with_capability,
            max_depth,
        );
        let response = self.send_request(&request).await?;

        self.handle_response(response, |payload| match payload {
            ResponsePayload::Object(object) => Ok(object),
            _ => Err(unexpected_payload("object payload")),
        })
    }

    /// Start a paginated search and return its results handle.
    pub async fn search(
        &self,
        class_name: impl Into<String>,
        filters: Vec<Filter>,
        page_length: u64,
        max_depth: Option<u32>,
    ) -> Result<SearchResults<'_, Self>, Error> {
        let request = Request::basic_search(
            self.next_request_id(),
            &self.session_id,
            class_name,
            filters,
            page_length,
            max_depth,
        );
        let response = self.send_request(&request).await?;

        let handle = self.handle_response(response, |payload| match payload {
            ResponsePayload::Handle(handle) => Ok(handle),
            _ => Err(unexpected_payload("search handle")),
        })?;

        Ok(SearchResults::new(handle, self))
    }

    /// Create or update an object.
    ///
    /// Returns the stored form, with the assigned uid and fresh
    /// capability tokens.
    pub async fn save(&self, object: ObjectData) -> Result<ObjectData, Error> {
        let request = Request::save_object(self.next_request_id(), &self.session_id, object);
        let response = self.send_request(&request).await?;

        self.handle_response(response, |payload| match payload {
            ResponsePayload::Saved(object) => Ok(object),
            _ => Err(unexpected_payload("saved object")),
        })
    }

    /// Delete an object.
    pub async fn delete(&self, object: ObjectData) -> Result<(), Error> {
        let request = Request::delete_object(self.next_request_id(), &self.session_id, object);
        let response = self.send_request(&request).await?;

        self.handle_response(response, |payload| match payload {
            ResponsePayload::Deleted => Ok(()),
            _ => Err(unexpected_payload("delete confirmation")),
        })
    }

    /// Ping the server to check connectivity.
    pub async fn ping(&self) -> Result<(), Error> {
        let request = Request::ping(self.next_request_id(), &self.session_id);
        let response = self.send_request(&request).await?;

        self.handle_response(response, |payload| match payload {
            ResponsePayload::Pong => Ok(()),
            _ => Err(unexpected_payload("pong response")),
        })
    }

    /// Close the client connection.
    pub async fn close(&self) {
        let mut conn = self.connection.lock().await;
        conn.close();
    }

    /// Check if the client is connected.
    pub async fn is_connected(&self) -> bool {
        let conn = self.connection.lock().await;
        conn.is_connected()
    }

    /// The session identifier sent with every request.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the next request ID.
    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and get the response.
    async fn send_request(&self, request: &Request) -> Result<Response, Error> {
        let conn = self.connection.lock().await;
        conn.send_request(request).await
    }

    /// Handle a response, extracting the payload or converting errors.
    fn handle_response<T, F>(&self, response: Response, extract: F) -> Result<T, Error>
    where
        F: FnOnce(ResponsePayload) -> Result<T, Error>,
    {
        match response.status {
            Status::Ok => extract(response.payload),
            Status::Error { code, message } => Err(Error::Server { code, message }),
        }
    }
}

impl FetchPage for Client {
    async fn fetch_page(
        &self,
        handle: &SearchHandle,
        page: u64,
    ) -> Result<(Vec<ObjectData>, bool), Error> {
        let request = Request::fetch_objects(self.next_request_id(), &self.session_id, handle, page);
        let response = self.send_request(&request).await?;

        self.handle_response(response, |payload| match payload {
            ResponsePayload::Page {
                objects,
                is_last_page,
            } => Ok((objects, is_last_page)),
            _ => Err(unexpected_payload("page payload")),
        })
    }
}


fn unexpected_payload(expected: &str) -> Error {
    Error::Protocol(strata_proto::Error::InvalidMessage(format!(
        "unexpected payload, wanted {}",
        expected
    )))
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session_id", &self.session_id)
            .field(
                "next_request_id",
                &self.next_request_id.load(Ordering::SeqCst),
            )
            .finish()
    }
}
