//! Loading and storing dictionary images.
//!
//! An image is nothing but the unit array: consecutive little-endian 32-bit
//! words, no header, no trailer. Anything that hands out bytes (a file, an
//! embedded asset, a memory map) can back a dictionary.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::double_array::{DoubleArrayUnit, UNIT_SIZE};
use crate::search::{DoubleArray, DoubleArrayRef};
use crate::ImageError;

impl DoubleArray {
    /// Loads a whole image file.
    ///
    /// # Errors
    ///
    /// [`ImageError::Io`] on file errors, [`ImageError::Truncated`] if the
    /// byte count is not a multiple of the unit size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        Self::open_at(path, 0, 0)
    }

    /// Loads `size` bytes of an image starting at `offset`, for files that
    /// embed a dictionary among other sections. `size == 0` means the rest
    /// of the file.
    pub fn open_at(path: impl AsRef<Path>, offset: u64, size: u64) -> Result<Self, ImageError> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        if offset > file_len {
            return Err(ImageError::Truncated);
        }
        let size = if size == 0 { file_len - offset } else { size };
        if offset + size > file_len {
            return Err(ImageError::Truncated);
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = vec![0u8; size as usize];
        file.read_exact(&mut bytes)?;

        Self::from_bytes(&bytes)
    }

    /// Decodes an in-memory image, copying the units out of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() % UNIT_SIZE != 0 {
            return Err(ImageError::Truncated);
        }
        let units = bytes
            .chunks_exact(UNIT_SIZE)
            .map(|chunk| DoubleArrayUnit::from_u32(u32::from_le_bytes(chunk.try_into().unwrap())))
            .collect();
        Ok(Self::from_units(units))
    }

    /// Serializes the image to bytes.
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.total_bytes());
        for unit in self.units() {
            bytes.extend_from_slice(&unit.to_u32().to_le_bytes());
        }
        bytes
    }

    /// Writes the image to a file, unit for unit.
    ///
    /// # Errors
    ///
    /// [`ImageError::Empty`] if there is nothing to write, [`ImageError::Io`]
    /// on file errors.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ImageError> {
        if self.is_empty() {
            return Err(ImageError::Empty);
        }
        let mut writer = BufWriter::new(File::create(path)?);
        for unit in self.units() {
            writer.write_all(&unit.to_u32().to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl<'a> DoubleArrayRef<'a> {
    /// Views an in-memory image without copying.
    ///
    /// The buffer must be aligned for 32-bit access (a memory-mapped file
    /// always is) and the host must be little-endian, since the bytes are
    /// reinterpreted in place.
    ///
    /// # Errors
    ///
    /// [`ImageError::Truncated`] if the byte count is not a multiple of the
    /// unit size, [`ImageError::Misaligned`] on an unaligned buffer.
    #[cfg(target_endian = "little")]
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, ImageError> {
        if bytes.len() % UNIT_SIZE != 0 {
            return Err(ImageError::Truncated);
        }
        if bytes.as_ptr() as usize % std::mem::align_of::<DoubleArrayUnit>() != 0 {
            return Err(ImageError::Misaligned);
        }

        // SAFETY: DoubleArrayUnit is a #[repr(transparent)] u32, valid for
        // any bit pattern; length and alignment are checked above, and the
        // returned slice borrows `bytes` for 'a.
        let units = unsafe {
            std::slice::from_raw_parts(
                bytes.as_ptr() as *const DoubleArrayUnit,
                bytes.len() / UNIT_SIZE,
            )
        };
        Ok(Self::from_units(units))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("dawgdict-{}-{name}.img", std::process::id()));
        path
    }

    fn sample() -> DoubleArray {
        let keys: Vec<&[u8]> = vec![b"a", b"ab", b"abc"];
        DoubleArray::build(&keys).unwrap()
    }

    #[test]
    fn save_then_open_is_identical() {
        let dict = sample();
        let path = scratch_path("round-trip");
        dict.save(&path).unwrap();

        let reopened = DoubleArray::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(dict.units(), reopened.units());
        assert_eq!(reopened.exact_match(b"a"), Some(0));
        assert_eq!(reopened.exact_match(b"ab"), Some(1));
        assert_eq!(reopened.exact_match(b"abc"), Some(2));
        assert_eq!(reopened.exact_match(b"abd"), None);
        let hits: Vec<(u32, usize)> = reopened
            .common_prefix_search(b"abc")
            .map(|m| (m.value, m.length))
            .collect();
        assert_eq!(hits, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn open_at_reads_an_embedded_image() {
        let dict = sample();
        let path = scratch_path("embedded");

        let mut bytes = vec![0xEEu8; 12];
        bytes.extend_from_slice(&dict.as_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let reopened = DoubleArray::open_at(&path, 12, dict.total_bytes() as u64).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(dict.units(), reopened.units());
    }

    #[test]
    fn open_rejects_ragged_length() {
        let dict = sample();
        let path = scratch_path("ragged");

        let mut bytes = dict.as_bytes();
        bytes.pop();
        std::fs::write(&path, &bytes).unwrap();

        let res = DoubleArray::open(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(ImageError::Truncated)));
    }

    #[test]
    fn open_at_rejects_out_of_range_sections() {
        let dict = sample();
        let path = scratch_path("sections");
        dict.save(&path).unwrap();

        let too_far = DoubleArray::open_at(&path, dict.total_bytes() as u64 + 4, 0);
        let too_long = DoubleArray::open_at(&path, 0, dict.total_bytes() as u64 + 4);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(too_far, Err(ImageError::Truncated)));
        assert!(matches!(too_long, Err(ImageError::Truncated)));
    }

    #[test]
    fn save_refuses_empty_image() {
        let dict = DoubleArray::from_units(Vec::new());
        assert!(matches!(
            dict.save(scratch_path("empty")),
            Err(ImageError::Empty)
        ));
    }

    #[test]
    fn bytes_round_trip() {
        let dict = sample();
        let bytes = dict.as_bytes();
        assert_eq!(bytes.len(), dict.total_bytes());

        let copied = DoubleArray::from_bytes(&bytes).unwrap();
        assert_eq!(dict.units(), copied.units());
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn zero_copy_view_answers_queries() {
        let dict = sample();
        let bytes = dict.as_bytes();

        let reader = DoubleArrayRef::from_bytes(&bytes).unwrap();
        assert_eq!(reader.exact_match(b"ab"), Some(1));
        assert_eq!(reader.exact_match(b"zz"), None);
        assert_eq!(reader.units(), dict.units());
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn zero_copy_view_rejects_bad_buffers() {
        let dict = sample();
        let bytes = dict.as_bytes();

        assert!(matches!(
            DoubleArrayRef::from_bytes(&bytes[..bytes.len() - 2]),
            Err(ImageError::Truncated)
        ));

        // Shift the image by one byte inside a padded buffer to force a
        // misaligned start.
        let mut padded = vec![0u8; bytes.len() + 4];
        let misaligned_start = (1..=4)
            .find(|&o| (padded[o..].as_ptr() as usize) % 4 != 0)
            .unwrap();
        padded[misaligned_start..misaligned_start + bytes.len()].copy_from_slice(&bytes);
        assert!(matches!(
            DoubleArrayRef::from_bytes(&padded[misaligned_start..misaligned_start + bytes.len()]),
            Err(ImageError::Misaligned)
        ));
    }
}
