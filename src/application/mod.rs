// Application layer - use cases and orchestration.
// Every operation takes an explicit RequestContext and checks the
// capability it needs before touching storage.

pub mod context;
pub mod error;
pub mod service;

pub use context::*;
pub use error::*;
pub use service::*;
