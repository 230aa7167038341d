pub mod config;
pub mod logging;

pub mod backend;
pub mod chunk;
pub mod control;
pub mod negotiate;
pub mod progress;
pub mod request;
pub mod retry;
pub mod storage;
pub mod transfer;
pub mod transport;
pub mod validate;

pub use backend::{Downloader, DownloaderRegistry};
pub use control::CancelToken;
pub use progress::{ProgressSink, ProgressSnapshot, ProgressStatus};
pub use request::TransferRequest;
pub use transfer::{HttpDownloader, TransferError, TransferFailure, TransferReport};
