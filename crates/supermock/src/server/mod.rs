//! Serving side: the mock listener and the [`App`] that wires everything up.

mod app;
mod mock;


pub use app::App;
pub use mock::{handle_mock_request, serve, MockServer};
