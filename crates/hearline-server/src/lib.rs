pub mod batch;
pub mod cli;
pub mod live;
pub mod registry;
pub mod routes;
pub mod server;

pub use registry::SessionRegistry;
pub use server::{create_router, AppState, Server};
