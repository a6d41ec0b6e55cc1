use std::io::{self, Read};


pub(crate) trait ReadExt {
    fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<usize, io::Error>;
    fn read_u8(&mut self) -> Result<u8, io::Error>;
    fn read_u16_le(&mut self) -> Result<u16, io::Error>;
}
impl<R: Read> ReadExt for R {
    fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        let mut total_bytes_read = 0;
        while total_bytes_read < buf.len() {
            let bytes_read_this_time = match self.read(&mut buf[total_bytes_read..]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if bytes_read_this_time == 0 {
                // EOF, break out
                break;
            }
            total_bytes_read += bytes_read_this_time;
        }
        Ok(total_bytes_read)
    }

    fn read_u8(&mut self) -> Result<u8, io::Error> {
        let mut buf = [0u8];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_le(&mut self) -> Result<u16, io::Error> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }
}


/// Reads a little-endian `u16` at `offset` within `buf`; the caller guarantees the bounds.
pub(crate) fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Reads a little-endian `u32` at `offset` within `buf`; the caller guarantees the bounds.
pub(crate) fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}
