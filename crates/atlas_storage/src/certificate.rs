#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use atlas_engines::certificate::compute_checksum;
use atlas_kernel_contracts::certificate::SubgroupCertificate;
use tracing::debug;

use crate::error::{io_error, StorageError};

pub fn write_certificate(
    path: impl AsRef<Path>,
    cert: &SubgroupCertificate,
) -> Result<(), StorageError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(cert)?;
    fs::write(path, json).map_err(io_error(path))?;
    debug!(path = %path.display(), checksum = %cert.checksum, "certificate written");
    Ok(())
}

/// Loads a certificate and rejects it unless the recorded checksum matches its body.
pub fn read_certificate(path: impl AsRef<Path>) -> Result<SubgroupCertificate, StorageError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(io_error(path))?;
    let cert: SubgroupCertificate = serde_json::from_str(&contents)?;
    let computed = compute_checksum(&cert.body())?;
    if computed != cert.checksum {
        return Err(StorageError::ChecksumMismatch {
            recorded: cert.checksum,
            computed,
        });
    }
    Ok(cert)
}
