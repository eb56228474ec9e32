pub mod processing_result;
pub mod tracking_record;
pub mod work_item;

pub use processing_result::ProcessingResult;
pub use tracking_record::TrackingRecord;
pub use work_item::WorkItem;
