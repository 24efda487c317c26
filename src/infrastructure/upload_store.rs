//! 临时上传文件
//!
//! 每次上传写入一个随机命名的临时 PDF，持有者被 drop 时文件即被删除，
//! 所以无论处理成功、失败还是中途 panic，临时文件都不会残留。

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, FileError};

const UPLOAD_PREFIX: &str = "manifest-upload-";
const UPLOAD_SUFFIX: &str = ".pdf";

/// 作用域内有效的临时上传文件
#[derive(Debug)]
pub struct ScopedUpload {
    file: NamedTempFile,
    size: u64,
}

impl ScopedUpload {
    /// 在 `dir` 下创建唯一命名的临时文件并写入内容
    pub fn write(dir: &Path, content: &[u8]) -> AppResult<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(UPLOAD_PREFIX)
            .suffix(UPLOAD_SUFFIX)
            .tempfile_in(dir)
            .map_err(|source| {
                AppError::File(FileError::CreateFailed {
                    path: dir.display().to_string(),
                    source,
                })
            })?;

        let path = file.path().display().to_string();
        file.write_all(content)
            .and_then(|_| file.flush())
            .map_err(|source| AppError::write_failed(path.clone(), source))?;

        debug!("临时文件已写入: {} ({} 字节)", path, content.len());

        Ok(Self {
            file,
            size: content.len() as u64,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// 写入的字节数
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 显式删除临时文件，删除失败只记录日志
    pub fn close(self) {
        let path = self.file.path().display().to_string();
        match self.file.close() {
            Ok(()) => debug!("临时文件已删除: {}", path),
            Err(source) => {
                let err = FileError::DeleteFailed { path, source };
                warn!("⚠️ {}", err);
            }
        }
    }
}
