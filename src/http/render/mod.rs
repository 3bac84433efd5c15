pub mod renderer;

pub use renderer::{write_fetch_error, write_snapshot};
