//! Raw block I/O against the store file.
//!
//! Addresses are relative to byte 4 of the file. Reads of blocks that extend
//! past the end of the file return zero bytes for the missing tail, since
//! Finder routinely truncates trailing free space.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::storage::block::BlockAddress;
use crate::storage::header::{FILE_HEADER_LEN, Header, HeaderError, PREFIX};

/// A handle to an open store file.
pub struct BlockStore {
    file: File,
    writable: bool,
}

impl BlockStore {
    /// Create (or truncate) a file at `path`.
    ///
    /// The file is left empty; the caller writes the header once the
    /// bookkeeping block has a location.
    pub fn create(path: &Path) -> Result<Self, FileError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(FileError::Io)?;
        Ok(Self {
            file,
            writable: true,
        })
    }

    /// Open an existing file.
    pub fn open(path: &Path, writable: bool) -> Result<Self, FileError> {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(FileError::Io)?;
        Ok(Self { file, writable })
    }

    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Read and validate the prefix and header.
    pub fn read_header(&mut self) -> Result<Header, FileError> {
        let bytes = self.read_at(0, FILE_HEADER_LEN as u64)?;
        let valid = self.file.metadata().map_err(FileError::Io)?.len();
        let valid = usize::try_from(valid).unwrap_or(usize::MAX).min(FILE_HEADER_LEN);
        Ok(Header::from_bytes(&bytes[..valid])?)
    }

    /// Write the prefix and header.
    pub fn write_header(&mut self, header: &Header) -> Result<(), FileError> {
        self.write_at(0, &header.to_bytes())
    }

    /// Read a whole block, zero-filling anything past end of file.
    pub fn read_block(&mut self, addr: BlockAddress) -> Result<Vec<u8>, FileError> {
        self.read_at(Self::file_offset(addr), addr.len())
    }

    /// Write `data` at the start of a block, padding with zeros to the block
    /// length.
    pub fn write_block(&mut self, addr: BlockAddress, data: &[u8]) -> Result<(), FileError> {
        let len = usize::try_from(addr.len()).unwrap_or(usize::MAX);
        if data.len() > len {
            return Err(FileError::BlockOverflow {
                addr,
                len: data.len(),
            });
        }
        let mut padded = Vec::with_capacity(len);
        padded.extend_from_slice(data);
        padded.resize(len, 0);
        self.write_at(Self::file_offset(addr), &padded)
    }

    /// Flush written data to disk.
    pub fn sync(&self) -> Result<(), FileError> {
        self.file.sync_data().map_err(FileError::Io)
    }

    const fn file_offset(addr: BlockAddress) -> u64 {
        PREFIX.len() as u64 + addr.offset() as u64
    }

    fn read_at(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, FileError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(FileError::Io)?;
        let mut buf = Vec::new();
        (&self.file)
            .take(len)
            .read_to_end(&mut buf)
            .map_err(FileError::Io)?;
        buf.resize(usize::try_from(len).unwrap_or(usize::MAX), 0);
        Ok(buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), FileError> {
        if !self.writable {
            return Err(FileError::NotWritable);
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(FileError::Io)?;
        self.file.write_all(data).map_err(FileError::Io)
    }
}

/// Errors that can occur during file operations.
#[derive(Debug)]
pub enum FileError {
    /// I/O error.
    Io(std::io::Error),
    /// The header is corrupt.
    Header(HeaderError),
    /// The file was opened read-only.
    NotWritable,
    /// Data does not fit in its block.
    BlockOverflow { addr: BlockAddress, len: usize },
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Header(e) => write!(f, "corrupt header: {e}"),
            Self::NotWritable => write!(f, "file is not open for writing"),
            Self::BlockOverflow { addr, len } => {
                write!(f, "{len} bytes do not fit in block {addr}")
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Header(e) => Some(e),
            Self::NotWritable | Self::BlockOverflow { .. } => None,
        }
    }
}

impl From<HeaderError> for FileError {
    fn from(e: HeaderError) -> Self {
        Self::Header(e)
    }
}
