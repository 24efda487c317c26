pub mod manifest;
pub mod request;
pub mod upstream;

pub use manifest::{
    CanonicalResult, ExceptionRecord, ExceptionType, ManifestInfo, Provenance, ResultStatus,
    Summary, UNKNOWN,
};
pub use request::{ProcessMode, ProcessRequest};
pub use upstream::{CanonicalDocument, NestedDocument, Shipment, UpstreamDocument};
