use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{ProgramStore, StoreError, StoreResult};

/// File magic, "RLPC".
const STORE_MAGIC: [u8; 4] = *b"RLPC";
/// Record layout version.
const STORE_VERSION: u32 = 1;
/// Magic plus version.
const HEADER_SIZE: usize = 8;
/// Key plus value length.
const RECORD_HEADER_SIZE: usize = 12;

/// Program store backed by a single append-only file.
///
/// Layout:
///
/// ```text
/// "RLPC" | version: u32 LE | { key: u64 LE | len: u32 LE | bytes[len] }*
/// ```
///
/// A file with a missing or unknown header is reset to an empty store when
/// opened. A trailing record cut short by an interrupted write is truncated
/// away; every complete record before it is kept.
#[derive(Default)]
pub struct FileProgramStore {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl FileProgramStore {
    /// Create a closed store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the open file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn header() -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&STORE_MAGIC);
        header[4..].copy_from_slice(&STORE_VERSION.to_le_bytes());
        header
    }

    /// Walk the records after the header, returning the byte length of the
    /// valid prefix of the file.
    fn read_records(data: &[u8], reader: &mut dyn FnMut(u64, &[u8])) -> (usize, usize) {
        let mut pos = HEADER_SIZE;
        let mut count = 0;

        while data.len() - pos >= RECORD_HEADER_SIZE {
            let key = u64::from_le_bytes(read_array(&data[pos..pos + 8]));
            let len = u32::from_le_bytes(read_array(&data[pos + 8..pos + 12])) as usize;
            let start = pos + RECORD_HEADER_SIZE;
            let Some(end) = start.checked_add(len).filter(|end| *end <= data.len()) else {
                break;
            };
            reader(key, &data[start..end]);
            count += 1;
            pos = end;
        }

        (pos, count)
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

impl ProgramStore for FileProgramStore {
    fn open_and_read(
        &mut self,
        path: &Path,
        reader: &mut dyn FnMut(u64, &[u8]),
    ) -> StoreResult<usize> {
        if let Some(open) = &self.path {
            return Err(StoreError::AlreadyOpen(open.display().to_string()));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let count = if data.len() < HEADER_SIZE || data[..HEADER_SIZE] != Self::header() {
            if !data.is_empty() {
                log::warn!(
                    "Program store {} has an unknown header, starting empty",
                    path.display()
                );
            }
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&Self::header())?;
            0
        } else {
            let (valid_len, count) = Self::read_records(&data, reader);
            if valid_len < data.len() {
                log::warn!(
                    "Program store {}: dropping {} trailing bytes of a truncated record",
                    path.display(),
                    data.len() - valid_len
                );
                file.set_len(valid_len as u64)?;
            }
            file.seek(SeekFrom::Start(valid_len as u64))?;
            count
        };

        log::debug!(
            "Opened program store {} with {} records",
            path.display(),
            count
        );

        self.path = Some(path.to_path_buf());
        self.writer = Some(BufWriter::new(file));
        Ok(count)
    }

    fn append(&mut self, key: u64, value: &[u8]) -> StoreResult<()> {
        let writer = self.writer.as_mut().ok_or(StoreError::NotOpen)?;
        let len = u32::try_from(value.len()).map_err(|_| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("record of {} bytes is too large", value.len()),
            ))
        })?;
        writer.write_all(&key.to_le_bytes())?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(value)?;
        Ok(())
    }

    fn sync(&mut self) -> StoreResult<()> {
        let writer = self.writer.as_mut().ok_or(StoreError::NotOpen)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.path = None;
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for FileProgramStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close program store: {}", e);
        }
    }
}

impl std::fmt::Debug for FileProgramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProgramStore")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}
