pub mod activity;
pub mod download;
pub mod item;
pub mod requests;
pub mod search;

pub use activity::ActivityBuckets;
pub use download::{Disposition, DownloadedFile};
pub use item::{AttachmentSummary, CanonicalItem, ItemField};
pub use requests::*;
pub use search::SearchPage;
