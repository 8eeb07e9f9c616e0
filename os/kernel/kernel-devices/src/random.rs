use crate::{DRIVER_STREAMS, Device, DeviceError, MAX_RANDOM_SKIP, MAX_TRANSFER, first_free};
use log::debug;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Pseudo-random byte streams.
///
/// A numeric open argument seeds the stream; anything else uses entropy.
#[derive(Debug, Default)]
pub struct RandomDevice {
    streams: [Option<StdRng>; DRIVER_STREAMS],
}

impl RandomDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self, id: usize) -> Result<&mut StdRng, DeviceError> {
        self.streams
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(DeviceError::NotOpen(id))
    }
}

impl Device for RandomDevice {
    fn open(&mut self, seed: &str) -> Option<usize> {
        let id = first_free(&self.streams)?;
        let rng = match seed.trim().parse::<u64>() {
            Ok(seed) => StdRng::seed_from_u64(seed),
            Err(_) => StdRng::from_entropy(),
        };
        self.streams[id] = Some(rng);
        debug!("random stream {id} open (seed {seed:?})");
        Some(id)
    }

    fn close(&mut self, id: usize) {
        if let Some(slot) = self.streams.get_mut(id) {
            *slot = None;
        }
    }

    fn read(&mut self, id: usize, size: usize) -> Result<Option<Vec<u8>>, DeviceError> {
        let rng = self.stream(id)?;
        let mut buf = vec![0; size.min(MAX_TRANSFER)];
        rng.fill_bytes(&mut buf);
        Ok(Some(buf))
    }

    /// Advance the stream by discarding `offset` bytes, at most
    /// [`MAX_RANDOM_SKIP`].
    fn seek(&mut self, id: usize, offset: u64) -> Result<(), DeviceError> {
        let rng = self.stream(id)?;
        if offset > MAX_RANDOM_SKIP {
            return Err(DeviceError::SeekTooFar(offset));
        }
        let mut scratch = [0u8; 256];
        let mut left = offset;
        while left > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let n = left.min(scratch.len() as u64) as usize;
            rng.fill_bytes(&mut scratch[..n]);
            left -= n as u64;
        }
        Ok(())
    }

    fn write(&mut self, id: usize, _data: &[u8]) -> Result<usize, DeviceError> {
        self.stream(id)?;
        Ok(0)
    }
}
