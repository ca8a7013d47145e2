//! Verification engine (spec §4.8): dual-method integrity verification
//! (digest vs. checksum-file) with fall-back logic.

mod parser;

pub use parser::{ParseError, ParsedChecksum};

use std::path::Path;

use md5::Md5;
use miette::Diagnostic;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::config::{VerificationMethod, VerifiedMethod, VerifyStatus};
use crate::progress::{ProgressReporter, TaskKind};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error, Diagnostic)]
pub enum VerifyError {
    #[error("failed to read {path} while computing its hash")]
    #[diagnostic(code(my_unicorn::verify::io))]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("unsupported hash algorithm {algorithm:?}")]
    #[diagnostic(code(my_unicorn::verify::unsupported_algorithm))]
    UnsupportedAlgorithm { algorithm: String },

    #[error("digest string {digest:?} is not in the form \"algo:hex\"")]
    #[diagnostic(code(my_unicorn::verify::malformed_digest))]
    MalformedDigest { digest: String },

    #[error("verification failed: expected {expected}, computed {computed}")]
    #[diagnostic(code(my_unicorn::verify::mismatch))]
    Mismatch { expected: String, computed: String },
}

/// Computes `algorithm` over `path` in 64 KiB chunks (spec §4.8), reporting
/// progress through `reporter` if given.
#[instrument(skip(reporter))]
pub async fn compute_hash(
    path: &Path,
    algorithm: &str,
    reporter: Option<&(dyn ProgressReporter)>,
) -> Result<String, VerifyError> {
    use tokio::io::AsyncReadExt;

    let mut file = fs_err::tokio::File::open(path)
        .await
        .map_err(|source| VerifyError::Io { path: path.to_path_buf(), source })?;

    let total = file
        .metadata()
        .await
        .map_err(|source| VerifyError::Io { path: path.to_path_buf(), source })?
        .len();

    let task = reporter.map(|r| r.add_task(&format!("verifying {}", path.display()), TaskKind::Verify));

    let mut hasher = Hasher::new(algorithm)?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut read_total = 0u64;

    loop {
        let n = file.read(&mut buf).await.map_err(|source| VerifyError::Io { path: path.to_path_buf(), source })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        read_total += n as u64;

        if let (Some(reporter), Some(task)) = (reporter, task) {
            reporter.update_task(task, Some(read_total), None);
        }
    }

    if let (Some(reporter), Some(task)) = (reporter, task) {
        reporter.finish_task(task, true);
    }

    debug_assert!(read_total <= total || total == 0);
    Ok(hasher.finalize_hex())
}

enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
    Sha1(Sha1),
    Md5(Md5),
}

impl Hasher {
    fn new(algorithm: &str) -> Result<Self, VerifyError> {
        match algorithm {
            "sha256" => Ok(Self::Sha256(Sha256::new())),
            "sha512" => Ok(Self::Sha512(Sha512::new())),
            "sha1" => Ok(Self::Sha1(Sha1::new())),
            "md5" => Ok(Self::Md5(Md5::new())),
            other => Err(VerifyError::UnsupportedAlgorithm { algorithm: other.to_string() }),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => data_encoding::HEXLOWER.encode(&h.finalize()),
            Self::Sha512(h) => data_encoding::HEXLOWER.encode(&h.finalize()),
            Self::Sha1(h) => data_encoding::HEXLOWER.encode(&h.finalize()),
            Self::Md5(h) => data_encoding::HEXLOWER.encode(&h.finalize()),
        }
    }
}

/// Constant-time comparison of two hex digest strings. Lengths may differ
/// legitimately (a malformed digest), in which case the comparison still
/// runs to completion without branching on length beyond the initial check.
fn hashes_equal(expected: &str, computed: &str) -> bool {
    let expected = expected.as_bytes();
    let computed = computed.as_bytes();
    if expected.len() != computed.len() {
        return false;
    }

    let mut diff = 0u8;
    for (a, b) in expected.iter().zip(computed.iter()) {
        diff |= a.to_ascii_lowercase() ^ b.to_ascii_lowercase();
    }
    diff == 0
}

/// Verifies `path` against a GitHub-supplied asset digest (`"algo:hex"`),
/// spec §4.8 strategy 1.
#[instrument(skip(reporter))]
pub async fn verify_digest(
    path: &Path,
    digest: &str,
    reporter: Option<&(dyn ProgressReporter)>,
) -> Result<VerifiedMethod, VerifyError> {
    let (algorithm, expected_hex) =
        digest.split_once(':').ok_or_else(|| VerifyError::MalformedDigest { digest: digest.to_string() })?;

    let computed = compute_hash(path, algorithm, reporter).await?;
    let passed = hashes_equal(expected_hex, &computed);

    Ok(VerifiedMethod {
        kind: VerificationMethod::Digest,
        status: if passed { VerifyStatus::Passed } else { VerifyStatus::Failed },
        algorithm: Some(algorithm.to_string()),
        expected: Some(expected_hex.to_ascii_lowercase()),
        computed: Some(computed),
        source: None,
    })
}

/// Verifies `path` against a downloaded checksum file's contents, spec
/// §4.8 strategy 2. `checksum_text` is the already-downloaded file
/// content; `checksum_file_name` is its filename (disambiguates the
/// single-hash-per-file shape from multi-entry formats).
#[instrument(skip(reporter, checksum_text))]
pub async fn verify_checksum_file(
    path: &Path,
    target_filename: &str,
    checksum_text: &str,
    checksum_file_name: &str,
    reporter: Option<&(dyn ProgressReporter)>,
) -> Result<VerifiedMethod, VerifyError> {
    let parsed = parser::parse(checksum_text, target_filename, checksum_file_name)?;
    let computed = compute_hash(path, &parsed.algorithm, reporter).await?;
    let passed = hashes_equal(&parsed.hex, &computed);

    Ok(VerifiedMethod {
        kind: VerificationMethod::ChecksumFile,
        status: if passed { VerifyStatus::Passed } else { VerifyStatus::Failed },
        algorithm: Some(parsed.algorithm),
        expected: Some(parsed.hex),
        computed: Some(computed),
        source: Some(checksum_file_name.to_string()),
    })
}

/// Strategy 3: verification is skipped, either because the catalog pins
/// `method = skip` or the user passed `--no-verify`.
pub fn skip() -> VerifiedMethod {
    warn!("verification skipped");
    VerifiedMethod {
        kind: VerificationMethod::Skip,
        status: VerifyStatus::Skipped,
        algorithm: None,
        expected: None,
        computed: None,
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn digest_verification_passes_on_match() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"hello world").unwrap();

        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"hello world");
            data_encoding::HEXLOWER.encode(&hasher.finalize())
        };

        let digest = format!("sha256:{expected}");
        let result = verify_digest(tmp.path(), &digest, None).await.unwrap();
        assert_eq!(result.status, VerifyStatus::Passed);
    }

    #[tokio::test]
    async fn digest_verification_fails_on_mismatch() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"hello world").unwrap();

        let digest = format!("sha256:{}", "0".repeat(64));
        let result = verify_digest(tmp.path(), &digest, None).await.unwrap();
        assert_eq!(result.status, VerifyStatus::Failed);
    }

    #[tokio::test]
    async fn malformed_digest_is_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"hello world").unwrap();

        let err = verify_digest(tmp.path(), "not-a-digest", None).await.unwrap_err();
        assert!(matches!(err, VerifyError::MalformedDigest { .. }));
    }

    #[tokio::test]
    async fn checksum_file_verification_passes_on_match() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"hello world").unwrap();

        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"hello world");
            data_encoding::HEXLOWER.encode(&hasher.finalize())
        };

        let checksum_text = format!("{expected}  App-x86_64.AppImage\n");
        let result =
            verify_checksum_file(tmp.path(), "App-x86_64.AppImage", &checksum_text, "SHA256SUMS", None).await.unwrap();
        assert_eq!(result.status, VerifyStatus::Passed);
    }

    #[test]
    fn skip_records_unpassed_skipped_method() {
        let method = skip();
        assert_eq!(method.status, VerifyStatus::Skipped);
        assert_eq!(method.kind, VerificationMethod::Skip);
    }

    #[test]
    fn hashes_equal_is_case_insensitive() {
        assert!(hashes_equal("ABCDEF", "abcdef"));
        assert!(!hashes_equal("abcdef", "abcdee"));
        assert!(!hashes_equal("abc", "abcdef"));
    }
}
