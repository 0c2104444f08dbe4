//! Request dispatch: the per-rule [`HandlerDispatcher`], the request
//! snapshot it reads and the [`ResponseSink`] it writes.

mod dispatcher;
mod error;
mod request;


pub use dispatcher::{HandlerDispatcher, Outcome};
pub use error::DispatchError;
pub use request::{parse_query_string, InboundRequest, ResponseSink, JSON_CONTENT_TYPE};
