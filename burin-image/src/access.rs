//! Typed read/write helpers shared by the byte store and image views.

/// Common byte-level access surface of [`crate::ByteStore`] and
/// [`crate::Image`]. Reads clip to the available range; the typed helpers
/// return `None` when fewer bytes than requested are available.
pub trait AddressSpace {
    /// Read up to `size` bytes starting at `ofs`.
    fn read(&self, ofs: u64, size: usize) -> Vec<u8>;
    /// Write bytes at `ofs`, returning how many were written.
    fn write(&self, ofs: u64, data: &[u8]) -> usize;
    /// Lowest valid address.
    fn start(&self) -> u64;
    /// Number of addressable bytes from [`AddressSpace::start`].
    fn size(&self) -> u64;

    /// One past the highest valid address.
    fn end(&self) -> u64 {
        self.start() + self.size()
    }

    /// Read an unsigned byte.
    fn read_u8(&self, ofs: u64) -> Option<u8> {
        let bytes = self.read(ofs, 1);
        bytes.first().copied()
    }

    /// Read a little-endian u16.
    fn read_u16_le(&self, ofs: u64) -> Option<u16> {
        let bytes = self.read(ofs, 2);
        Some(u16::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Read a little-endian u32.
    fn read_u32_le(&self, ofs: u64) -> Option<u32> {
        let bytes = self.read(ofs, 4);
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Read a little-endian u64.
    fn read_u64_le(&self, ofs: u64) -> Option<u64> {
        let bytes = self.read(ofs, 8);
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Read a big-endian u16.
    fn read_u16_be(&self, ofs: u64) -> Option<u16> {
        let bytes = self.read(ofs, 2);
        Some(u16::from_be_bytes(bytes.try_into().ok()?))
    }

    /// Read a big-endian u32.
    fn read_u32_be(&self, ofs: u64) -> Option<u32> {
        let bytes = self.read(ofs, 4);
        Some(u32::from_be_bytes(bytes.try_into().ok()?))
    }

    /// Read a big-endian u64.
    fn read_u64_be(&self, ofs: u64) -> Option<u64> {
        let bytes = self.read(ofs, 8);
        Some(u64::from_be_bytes(bytes.try_into().ok()?))
    }

    /// Write an unsigned byte.
    fn write_u8(&self, ofs: u64, value: u8) -> bool {
        self.write(ofs, &[value]) == 1
    }

    /// Write a little-endian u16.
    fn write_u16_le(&self, ofs: u64, value: u16) -> bool {
        self.write(ofs, &value.to_le_bytes()) == 2
    }

    /// Write a little-endian u32.
    fn write_u32_le(&self, ofs: u64, value: u32) -> bool {
        self.write(ofs, &value.to_le_bytes()) == 4
    }

    /// Write a little-endian u64.
    fn write_u64_le(&self, ofs: u64, value: u64) -> bool {
        self.write(ofs, &value.to_le_bytes()) == 8
    }

    /// Write a big-endian u16.
    fn write_u16_be(&self, ofs: u64, value: u16) -> bool {
        self.write(ofs, &value.to_be_bytes()) == 2
    }

    /// Write a big-endian u32.
    fn write_u32_be(&self, ofs: u64, value: u32) -> bool {
        self.write(ofs, &value.to_be_bytes()) == 4
    }
}
