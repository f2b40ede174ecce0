//! Infrastructure layer: the transactional store and its backends, the
//! access directory the authorization engine resolves through, credentials
//! and the application services every external action runs through.

pub mod credentials;
pub mod directory;
pub mod services;
pub mod store;

pub use credentials::JwtCredentialService;
pub use services::{BootstrapOutcome, ServiceError, ServiceResult, Services, SurveyFilter};
pub use store::{
    MemoryBackend, PostgresBackend, Row, RowChange, RowKey, Store, StoreBackend, StoreError, Tables,
};
