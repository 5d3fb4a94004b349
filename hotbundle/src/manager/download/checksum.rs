//! CRC32 fingerprint of downloaded archives.
//!
//! The fingerprint is computed over the compressed archive as received, so it
//! detects transport corruption only. It is not a signature and says nothing
//! about the extracted files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crc32fast::Hasher;

use crate::manager::error::{BundleError, BundleResult};

/// Buffer size for reading files during fingerprinting (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the CRC32 fingerprint of a file.
///
/// # Returns
///
/// The checksum as 8 lowercase hexadecimal characters.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn fingerprint(path: &Path) -> BundleResult<String> {
    let mut file = File::open(path).map_err(|e| BundleError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| BundleError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:08x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_known_value() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("test.txt");

        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"hello world").unwrap();

        // CRC32 (IEEE) of "hello world"
        assert_eq!(fingerprint(&file_path).unwrap(), "0d4a1185");
    }

    #[test]
    fn test_fingerprint_is_zero_padded() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("empty.bin");
        File::create(&file_path).unwrap();

        let checksum = fingerprint(&file_path).unwrap();
        assert_eq!(checksum, "00000000");
        assert_eq!(checksum.len(), 8);
    }

    #[test]
    fn test_fingerprint_nonexistent_file() {
        let result = fingerprint(Path::new("/nonexistent/file.zip"));
        assert!(matches!(result, Err(BundleError::ReadFailed { .. })));
    }

    #[test]
    fn test_fingerprint_spans_buffers() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("large.bin");

        let data = vec![0xABu8; 200_000];
        std::fs::write(&file_path, &data).unwrap();

        let expected = format!("{:08x}", crc32fast::hash(&data));
        assert_eq!(fingerprint(&file_path).unwrap(), expected);
    }
}
