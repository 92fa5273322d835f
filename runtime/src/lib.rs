//! # Composable Request Runtime
//!
//! The imperative shell around `composable-request-core`:
//!
//! - [`HttpRequester`]: executes resolved requests with `reqwest`
//! - [`RequesterConfig`]: timeouts, default headers and size limits,
//!   loadable from the environment
//! - [`retry`]: re-receiving failed chains with exponential backoff
//!
//! ## Example
//!
//! ```no_run
//! use composable_request_core::{Composable, Expecting, Receivable, Request, Wrapper};
//! use composable_request_runtime::{HttpRequester, RequesterConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let requester = HttpRequester::new(RequesterConfig::from_env()?);
//! let user = Request::new("https://api.example.com")
//!     .append("users/1")
//!     .default_header()
//!     .expecting::<Wrapper>()
//!     .requested(requester)
//!     .resolve()
//!     .await?;
//! println!("{}", user["userName"]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod requester;
pub mod retry;

pub use config::{ConfigError, RequesterConfig};
pub use requester::HttpRequester;
pub use retry::{RetryExt, RetryPolicy, Retrying};
