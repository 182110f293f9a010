use std::io::Read;

use sha1::{Digest, Sha1};

use crate::error::{HashError, HashResult};

/// Computes the SHA-1 digest of a byte stream.
///
/// The stream is consumed in fixed-size chunks so arbitrarily large inputs
/// (downloaded release archives) never have to be buffered in memory. The
/// digest is returned as a lowercase hex string, the form npm clients expect
/// in the `shasum` integrity field.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the underlying reader fails.
pub fn sha1_hex<R: Read>(mut reader: R) -> HashResult<String> {
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|err| HashError::ReadFailed { source: err })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use sha1::Digest;

    use super::sha1_hex;

    #[test]
    fn test_sha1_hex_known_input() {
        let digest = sha1_hex(Cursor::new(b"hello world\n")).unwrap();
        assert_eq!(digest, "22596363b3de40b06f981fb85d82312e8c0ed511");
    }

    #[test]
    fn test_sha1_hex_empty_input() {
        let digest = sha1_hex(Cursor::new(b"")).unwrap();
        assert_eq!(digest, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_sha1_hex_large_input_spans_chunks() {
        let data = vec![0x61u8; 8192 * 3 + 17];
        let streamed = sha1_hex(Cursor::new(&data)).unwrap();

        let mut hasher = sha1::Sha1::new();
        hasher.update(&data);
        let direct = format!("{:x}", hasher.finalize());

        assert_eq!(streamed, direct);
    }

    #[test]
    fn test_sha1_hex_read_failure() {
        struct FailingReader;

        impl std::io::Read for FailingReader {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("boom"))
            }
        }

        assert!(sha1_hex(FailingReader).is_err());
    }
}
