pub mod client;
pub mod request;
pub mod retry;

pub use client::ApiClient;
pub use request::{FileUpload, MultipartBody, RequestBody, RequestConfig};
pub use retry::RetryConfig;
