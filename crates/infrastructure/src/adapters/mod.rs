//! Port adapters for HTTP and time

mod reqwest_client;
mod system_clock;

pub(crate) use reqwest_client::{join_path, parse_base_url};
pub use reqwest_client::ReqwestHttpClient;
pub use system_clock::SystemClock;
