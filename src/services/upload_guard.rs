//! 上传校验
//!
//! 在写入临时文件之前拒绝不合法的上传，并清洗回显给调用方的文件名。

use crate::error::UploadError;

const PDF_EXTENSION: &str = ".pdf";
const FALLBACK_NAME: &str = "upload.pdf";

/// 校验上传并返回清洗后的文件名
///
/// # 错误
/// - 没有 `file` 字段：`MissingFile`
/// - 文件名为空：`EmptyFilename`
/// - 不是 `.pdf`（不区分大小写）：`UnsupportedExtension`
/// - 内容为空：`EmptyFile`
pub fn validate_upload(filename: Option<&str>, content: &[u8]) -> Result<String, UploadError> {
    let filename = filename.ok_or(UploadError::MissingFile)?.trim();
    if filename.is_empty() {
        return Err(UploadError::EmptyFilename);
    }
    if !filename.to_ascii_lowercase().ends_with(PDF_EXTENSION) {
        return Err(UploadError::UnsupportedExtension {
            filename: filename.to_string(),
        });
    }
    if content.is_empty() {
        return Err(UploadError::EmptyFile);
    }
    Ok(sanitize_filename(filename))
}

/// 只保留基本名，`[A-Za-z0-9._-]` 以外的字符替换为 `_`
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_pdf() {
        assert_eq!(
            validate_upload(Some("Manifest 07.PDF"), b"%PDF").unwrap(),
            "Manifest_07.PDF"
        );
    }

    #[test]
    fn test_rejections() {
        assert_eq!(validate_upload(None, b"%PDF"), Err(UploadError::MissingFile));
        assert_eq!(validate_upload(Some("  "), b"%PDF"), Err(UploadError::EmptyFilename));
        assert_eq!(
            validate_upload(Some("notes.txt"), b"text"),
            Err(UploadError::UnsupportedExtension {
                filename: "notes.txt".to_string()
            })
        );
        assert_eq!(validate_upload(Some("a.pdf"), b""), Err(UploadError::EmptyFile));
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_filename(r"C:\scans\trip 12.pdf"), "trip_12.pdf");
        assert_eq!(sanitize_filename("运单.pdf"), "__.pdf");
        assert_eq!(sanitize_filename(".."), FALLBACK_NAME);
    }
}
