pub mod auth;
pub mod backend;
pub mod documents;
pub mod memory;
pub mod metrics;
pub mod storage;
pub mod store;

pub use auth::AuthProvider;
pub use backend::BackendClient;
pub use documents::{DocumentService, UploadedFile};
pub use memory::{MemoryStore, MockAuthProvider};
pub use metrics::{get_metrics, init_metrics};
pub use storage::{LocalStorage, RemoteStorage, Storage};
pub use store::DocumentStore;
