//! Destination sink: write validated content to disk in the requested
//! character set.
//!
//! The write is atomic. Content goes to a named temp file in the destination
//! directory, which is renamed over the destination only once fully written.
//! On any failure the temp file is dropped, and with it removed.

use crate::error::TaskError;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Encode `content` for the destination file.
///
/// `encoding_rs` never produces UTF-16 output, so the two UTF-16 variants
/// are encoded directly (no BOM).
pub fn encode_content<'a>(content: &'a str, encoding: &'static Encoding) -> Cow<'a, [u8]> {
    if encoding == UTF_16LE {
        return Cow::Owned(content.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Cow::Owned(content.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }
    let (bytes, used, unmappable) = encoding.encode(content);
    if unmappable {
        warn!(
            "Some characters cannot be represented in {}; replaced with numeric references",
            used.name()
        );
    }
    bytes
}

/// Atomically write `content` to `path` encoded as `encoding`.
pub async fn write_destination(
    path: &Path,
    content: &str,
    encoding: &'static Encoding,
) -> Result<PathBuf, TaskError> {
    let bytes = encode_content(content, encoding).into_owned();
    let path = path.to_path_buf();
    let target = path.clone();

    tokio::task::spawn_blocking(move || persist(&target, &bytes))
        .await
        .map_err(|e| TaskError::DestinationWrite {
            path: path.clone(),
            detail: format!("writer task failed: {e}"),
        })?
        .map_err(|e| TaskError::DestinationWrite {
            path: path.clone(),
            detail: e.to_string(),
        })?;

    debug!("Wrote result to {}", path.display());
    Ok(path)
}

fn persist(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_variants_encoded_directly() {
        assert_eq!(&*encode_content("A€", UTF_16LE), &[0x41, 0x00, 0xAC, 0x20]);
        assert_eq!(&*encode_content("A€", UTF_16BE), &[0x00, 0x41, 0x20, 0xAC]);
    }

    #[test]
    fn single_byte_charset() {
        let latin1 = Encoding::for_label(b"iso-8859-1").unwrap();
        assert_eq!(&*encode_content("é", latin1), &[0xE9]);
    }

    #[tokio::test]
    async fn writes_atomically_into_new_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/out.xml");
        let written = write_destination(&dest, "<a/>", encoding_rs::UTF_8).await.unwrap();
        assert_eq!(written, dest);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "<a/>");
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path() != dest)
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn unwritable_destination_is_task_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let dest = blocker.join("out.xml");
        let err = write_destination(&dest, "<a/>", encoding_rs::UTF_8).await.unwrap_err();
        assert!(matches!(err, TaskError::DestinationWrite { .. }));
    }
}
