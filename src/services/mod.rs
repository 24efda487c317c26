pub mod demo_generator;
pub mod normalizer;
pub mod output_parser;
pub mod upload_guard;

pub use demo_generator::{DemoGenerator, DemoManifest};
pub use normalizer::{normalize, synthesize, FallbackReason, ResultContext};
pub use output_parser::{recover, recover_structured, ParseError, RecoveredPayload, RecoveryStrategy};
pub use upload_guard::{sanitize_filename, validate_upload};
