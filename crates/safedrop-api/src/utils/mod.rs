pub mod ip_extraction;
pub mod upload;

pub use ip_extraction::{extract_client_ip, ClientIp};
pub use upload::{parse_field_name, parse_subject_id, stage_multipart, StagedUpload};
