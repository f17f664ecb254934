//! Append-only flat-file primitives.
//!
//! Every durable structure in the registry (key set, lineage log, attribute
//! file, operation log) is a newline-delimited flat file that only ever
//! grows. `append_line` and `read_lines` are the sole primitives touching
//! those files.
//!
//! Writers hold an exclusive lock on the destination file for the duration
//! of the append and fsync before releasing it, so concurrent invocations
//! serialize their appends instead of racing. Readers take a point-in-time
//! snapshot without locking; a torn final line is absorbed by the lenient
//! record parsers upstream.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

use crate::error::RegistryError;

/// Append a single record line to `path`, creating the file if needed.
///
/// The line is written under an exclusive file lock and fsynced before the
/// lock is released.
pub fn append_line(path: &Path, line: &str) -> Result<(), RegistryError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RegistryError::storage(path, e))?;

    file.lock_exclusive()
        .map_err(|e| RegistryError::storage(path, e))?;

    let result = write_locked(&file, line);

    // Lock is released when `file` drops; unlock explicitly so an error in
    // the caller cannot extend the critical section.
    let _ = fs2::FileExt::unlock(&file);
    result.map_err(|e| RegistryError::storage(path, e))
}

fn write_locked(mut file: &std::fs::File, line: &str) -> std::io::Result<()> {
    writeln!(file, "{}", line)?;
    file.sync_all()
}

/// Read every line of `path`. A missing file is an empty store, not an
/// error; any other open/read failure is `StorageUnavailable`.
pub fn read_lines(path: &Path) -> Result<Vec<String>, RegistryError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path).map_err(|e| RegistryError::storage(path, e))?;
    Ok(data.lines().map(str::to_string).collect())
}
