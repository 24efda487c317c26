//! 基础设施层
//!
//! 持有稀缺资源（子进程、临时文件），只暴露能力，不认识运单和异常。

pub mod processor_invoker;
pub mod upload_store;

pub use processor_invoker::{InvokeError, ProcessOutcome, ProcessorInvoker};
pub use upload_store::ScopedUpload;
