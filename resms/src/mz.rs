//! MZ (Mark Zbikowski) executable stub.
//!
//! Every NE and PE executable is simultaneously an MZ executable, although the DOS program in the
//! stub usually only prints an error message and terminates. Here, the stub is only consulted to
//! find out where the header of the actual executable is located.


use std::io::{self, Read, Seek, SeekFrom};

use crate::read_ext::ReadExt;


pub const SIGNATURE: [u8; 2] = *b"MZ";

const RELOCATION_TABLE_OFFSET_OFFSET: u64 = 0x18;
const NEW_HEADER_OFFSET_OFFSET: u64 = 0x3C;

/// If the relocation table starts at or beyond this offset, the stub announces a new-style header
/// through the word at [`NEW_HEADER_OFFSET_OFFSET`].
const NEW_HEADER_RELOCATION_THRESHOLD: u16 = 0x40;

/// Where the NE header is assumed to be if the stub does not announce one.
///
/// This is a guess that happens to match some very early Windows executables. It is not documented
/// anywhere; do not "correct" it.
pub const LEGACY_NE_HEADER_OFFSET: u64 = 0x480;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Stub {
    pub relocation_table_offset: u16,
    pub new_header_offset: u64,
}
impl Stub {
    /// Reads the stub from the beginning of the stream.
    ///
    /// Returns `Ok(None)` if the stream does not start with the MZ signature or ends before the
    /// fields of interest.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>, io::Error> {
        reader.seek(SeekFrom::Start(0))?;
        let mut signature = [0u8; 2];
        if reader.read_exact_or_eof(&mut signature)? < signature.len() || signature != SIGNATURE {
            return Ok(None);
        }

        reader.seek(SeekFrom::Start(RELOCATION_TABLE_OFFSET_OFFSET))?;
        let mut word_buf = [0u8; 2];
        if reader.read_exact_or_eof(&mut word_buf)? < word_buf.len() {
            return Ok(None);
        }
        let relocation_table_offset = u16::from_le_bytes(word_buf);

        let new_header_offset = if relocation_table_offset >= NEW_HEADER_RELOCATION_THRESHOLD {
            // only the lower word is consulted; NE files never live beyond 64 KiB into the file
            reader.seek(SeekFrom::Start(NEW_HEADER_OFFSET_OFFSET))?;
            if reader.read_exact_or_eof(&mut word_buf)? < word_buf.len() {
                return Ok(None);
            }
            u64::from(u16::from_le_bytes(word_buf))
        } else {
            LEGACY_NE_HEADER_OFFSET
        };

        Ok(Some(Self {
            relocation_table_offset,
            new_header_offset,
        }))
    }
}
