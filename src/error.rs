/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Error taxonomy for the filesystem engine.

use std::io;
use thiserror::Error;

/// The result type returned by every fallible filesystem operation.
pub type FsResult<T> = Result<T, FsError>;

/// A semantic error raised by the filesystem engine.
///
/// The on-disk format is the compatibility contract (see the superblock and
/// inode layouts); this error surface is not — callers that need the
/// source's permissive "no-op on failure" behavior can match on the variant
/// they care about and ignore the rest.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path resolution failed: some component does not exist, or an
    /// intermediate component is not a directory.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The operation targets the wrong file type (e.g. `read_file` on a
    /// directory, `list_directory` on a regular file).
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// `create_file`/`create_directory` targets a name that already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The block allocator has no free blocks left.
    #[error("no space left on device")]
    NoSpace,

    /// A directory's single data block cannot hold another entry.
    #[error("directory full: {0}")]
    DirectoryFull(String),

    /// The superblock's magic number does not match, or a structure was
    /// truncated.
    #[error("corrupt image: {0}")]
    CorruptImage(String),

    /// A name cannot be stored as a directory entry (e.g. it contains an
    /// embedded NUL byte, which would desynchronize the end-of-entries
    /// scan). Distinct from [`FsError::UsageError`]: this rejects a value
    /// being written to disk, not a malformed command invocation.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A command was invoked with missing or malformed arguments.
    #[error("usage error: {0}")]
    UsageError(String),

    /// Propagated I/O failure from the underlying block device.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
