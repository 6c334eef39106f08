pub mod config;
pub mod error;
pub mod form;
pub mod handler;
pub mod model;
pub mod node;
pub mod render;
pub mod routes;
pub mod server;
pub mod tippin;

pub use server::{init_tracing, run_server};
pub use tippin::{Tippin, TippinBuilder};
