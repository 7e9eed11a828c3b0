//! External collaborators of the credential pool
//!
//! Two interface boundaries live here, both consumed by the pool and both
//! dyn-compatible so the pool can hold `Arc<dyn ...>`:
//!
//! - `ApplicationRegistry` answers "which secret does this tenant use, and
//!   is the application allowed to fetch tokens at all". `StaticRegistry`
//!   is the config-file-backed implementation the warmer service uses.
//! - `TokenFetcher` performs the actual network exchange of an application
//!   secret for a bearer token. `HttpTokenFetcher` is the reqwest
//!   implementation; tests substitute counting fakes.
//!
//! Neither side caches anything. Caching, refresh-ahead, and single-flight
//! all belong to the pool.

mod classify;
mod error;
mod fetch;
mod http;
mod registry;

pub use classify::{ErrorClass, classify_status};
pub use error::{Error, Result};
pub use fetch::{IssuedToken, TokenFetcher};
pub use http::{HttpTokenFetcher, TokenResponse};
pub use registry::{AppStatus, Application, ApplicationRegistry, StaticRegistry};
