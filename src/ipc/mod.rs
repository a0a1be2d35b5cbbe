mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use router::{handle_request, open_workspace};
pub use types::{AppState, Request};
