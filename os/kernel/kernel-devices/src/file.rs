use crate::{DRIVER_STREAMS, Device, DeviceError, MAX_TRANSFER, first_free};
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

/// Random-access files on the host file system.
///
/// The open argument is a path; the file is created if missing and never
/// truncated.
#[derive(Debug, Default)]
pub struct FileDevice {
    files: [Option<File>; DRIVER_STREAMS],
}

impl FileDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn file(&mut self, id: usize) -> Result<&mut File, DeviceError> {
        self.files
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(DeviceError::NotOpen(id))
    }
}

impl Device for FileDevice {
    fn open(&mut self, path: &str) -> Option<usize> {
        if path.is_empty() {
            warn!("file device needs a path");
            return None;
        }
        let id = first_free(&self.files)?;
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
        {
            Ok(file) => {
                self.files[id] = Some(file);
                debug!("file {path:?} open as {id}");
                Some(id)
            }
            Err(err) => {
                warn!("cannot open {path:?}: {err}");
                None
            }
        }
    }

    fn close(&mut self, id: usize) {
        if let Some(slot) = self.files.get_mut(id) {
            *slot = None;
        }
    }

    fn read(&mut self, id: usize, size: usize) -> Result<Option<Vec<u8>>, DeviceError> {
        let file = self.file(id)?;
        let mut buf = vec![0; size.min(MAX_TRANSFER)];
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    fn seek(&mut self, id: usize, offset: u64) -> Result<(), DeviceError> {
        self.file(id)?.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn write(&mut self, id: usize, data: &[u8]) -> Result<usize, DeviceError> {
        self.file(id)?.write_all(data)?;
        Ok(data.len())
    }
}
