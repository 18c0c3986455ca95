//! Application services: the scan front door and its presentation ports.

mod dto;
mod output;
mod scan_service;

pub use dto::{FlyScanRequest, StepScanRequest};
pub use output::{attach_scan_presenter, ScanOutputPort};
pub use scan_service::ScanApplicationService;
