pub mod crm;
pub mod sheet;
pub mod token_manager;
pub mod transport;
pub mod workdrive;

#[cfg(test)]
pub mod testing;

pub use crm::{CrmService, SearchCache};
pub use sheet::SheetService;
pub use transport::{HttpTransport, ReqwestTransport};
pub use workdrive::WorkDriveService;
