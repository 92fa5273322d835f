//! # Composable Request Core
//!
//! Composable, lazily executed HTTP request descriptors.
//!
//! This crate describes requests and what to do with their responses; it
//! never performs I/O itself. Execution is delegated to a [`Requester`].
//!
//! ## Core Concepts
//!
//! - **Descriptor**: an immutable [`Request`], composed through the
//!   [`Composable`] capability
//! - **Secret**: a credential bound with [`Lockable`] or [`Unlockable`];
//!   a [`Locked`] descriptor cannot be executed until unlocked
//! - **Expectation**: [`Expected`] tags a descriptor with its response type
//! - **Pagination**: [`Paginated`] pulls pages one cursor at a time
//! - **Chain**: a [`Receivable`] graph of transforms, executed only once
//!   [`Requested`] and polled
//! - **Value tree**: [`Wrapper`], a JSON model translating `snake_case`
//!   wire keys into `camelCase` keys
//!
//! ## Example
//!
//! ```
//! use composable_request_core::{Composable, Expecting, Receivable, Request, Wrapper};
//! # use composable_request_core::requester::{Delivery, Requester};
//! # use composable_request_core::request::ResolvedRequest;
//! # struct Api;
//! # impl Requester for Api {
//! #     fn execute(&self, _: ResolvedRequest) -> Delivery {
//! #         Box::pin(async { Ok(br#"{"user_name": "ada"}"#.to_vec()) })
//! #     }
//! # }
//! # tokio_test::block_on(async {
//! let name = Request::new("https://api.example.com")
//!     .append("users/1")
//!     .default_header()
//!     .expecting::<Wrapper>()
//!     .map(|user| user["userName"].string(false))
//!     .requested(Api)
//!     .resolve()
//!     .await
//!     .unwrap();
//! assert_eq!(name.as_deref(), Some("ada"));
//! # });
//! ```

pub mod case;
pub mod composable;
pub mod error;
pub mod expected;
pub mod lock;
pub mod paginated;
pub mod receivable;
pub mod reference;
pub mod request;
pub mod requester;
pub mod wrapper;

pub use composable::{Composable, Parameters};
pub use error::{CodingError, RequestError, TransportError};
pub use expected::{Decodable, Expected, Expecting, Json};
pub use lock::{BearerToken, HeaderSecret, Lockable, Locked, Secret, Unlockable};
pub use paginated::{PageState, Pages, PagesHandle, Paginated};
pub use receivable::{Outcome, Outcomes, Ready, Receivable, Requested, Subscription};
pub use reference::{Atomic, Reference};
pub use request::{Body, Method, Request, Requestable, ResolvedRequest};
pub use requester::{Delivery, Requester};
pub use wrapper::Wrapper;
