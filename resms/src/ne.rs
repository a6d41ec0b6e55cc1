//! New Executable (or Segmented Executable) format.
//!
//! The NE format was introduced with Windows 1.0 and supplanted by PE in Windows NT 3.1 and Windows
//! 95. Only the header and the resource table are decoded here.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::error::Error;
use crate::read_ext::{ReadExt, u16_at, u32_at};


pub const SIGNATURE: [u8; 2] = *b"NE";

/// No linker ever produced a larger shift; a table that claims one is not a resource table.
pub const MAX_ALIGNMENT_SHIFT: u16 = 31;

/// Set on type and ID words that carry an integer; unset if they point into the name table.
const INTEGER_ID_FLAG: u16 = 0x8000;

const HEADER_BODY_SIZE: usize = 62;


/// The NE header, minus its signature.
///
/// All table offsets are relative to the start of the header (the `b"NE"` signature), except for
/// `non_resident_name_table_offset`, which is relative to the start of the file.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Header {
    pub linker_version: u8,
    pub linker_revision: u8,
    pub entry_table_offset: u16,
    pub entry_table_bytes: u16,
    pub crc32: u32,
    pub flags: ExeFlags, // u16
    pub auto_data_segment_number: u16,
    pub initial_heap_size: u16,
    pub initial_stack_size: u16,
    pub cs_ip: SegmentAndOffset, // u32
    pub ss_sp: SegmentAndOffset, // u32
    pub segment_table_entries: u16,
    pub module_reference_table_entries: u16,
    pub non_resident_name_table_bytes: u16,
    pub segment_table_offset: u16,
    pub resource_table_offset: u16,
    pub resident_name_table_offset: u16,
    pub module_reference_table_offset: u16,
    pub imported_names_table_offset: u16,
    pub non_resident_name_table_offset: u32,
    pub entry_table_movable_entries: u16,
    pub logical_sector_alignment_shift_count: u16,
    pub resource_segment_count: u16,
    pub target_os: u8,
    pub other_flags: u8,
    pub return_thunk_offset: u16,
    pub segment_reference_thunk_offset: u16,
    pub min_code_swap_size: u16,
    pub expected_windows_version: u16,
}
impl Header {
    fn from_body(buf: &[u8; HEADER_BODY_SIZE]) -> Self {
        Self {
            linker_version: buf[0],
            linker_revision: buf[1],
            entry_table_offset: u16_at(buf, 2),
            entry_table_bytes: u16_at(buf, 4),
            crc32: u32_at(buf, 6),
            flags: ExeFlags::from_bits_retain(u16_at(buf, 10)),
            auto_data_segment_number: u16_at(buf, 12),
            initial_heap_size: u16_at(buf, 14),
            initial_stack_size: u16_at(buf, 16),
            cs_ip: SegmentAndOffset::from_slice(&buf[18..22]),
            ss_sp: SegmentAndOffset::from_slice(&buf[22..26]),
            segment_table_entries: u16_at(buf, 26),
            module_reference_table_entries: u16_at(buf, 28),
            non_resident_name_table_bytes: u16_at(buf, 30),
            segment_table_offset: u16_at(buf, 32),
            resource_table_offset: u16_at(buf, 34),
            resident_name_table_offset: u16_at(buf, 36),
            module_reference_table_offset: u16_at(buf, 38),
            imported_names_table_offset: u16_at(buf, 40),
            non_resident_name_table_offset: u32_at(buf, 42),
            entry_table_movable_entries: u16_at(buf, 46),
            logical_sector_alignment_shift_count: u16_at(buf, 48),
            resource_segment_count: u16_at(buf, 50),
            target_os: buf[52],
            other_flags: buf[53],
            return_thunk_offset: u16_at(buf, 54),
            segment_reference_thunk_offset: u16_at(buf, 56),
            min_code_swap_size: u16_at(buf, 58),
            expected_windows_version: u16_at(buf, 60),
        }
    }

    /// Whether the executable has a resource table at all.
    ///
    /// Linkers that omit the table point its offset at the resident-name table that follows it.
    pub fn has_resource_table(&self) -> bool {
        self.resource_table_offset != self.resident_name_table_offset
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SegmentAndOffset {
    pub offset: u16,
    pub segment_number: u16,
}
impl SegmentAndOffset {
    fn from_slice(slice: &[u8]) -> Self {
        Self {
            offset: u16_at(slice, 0),
            segment_number: u16_at(slice, 2),
        }
    }
}


/// A resource as listed in the resource table, before its data has been read.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RawResourceRecord {
    pub type_id: u16, // with the integer flag masked off
    pub numeric_id: Option<u16>, // with the integer flag masked off
    pub name: Option<String>,
    pub flags: ResourceFlags,
    pub byte_offset: u64, // from start of file
    pub byte_length: u64,
}
impl RawResourceRecord {
    /// Reads the data of this resource from the executable.
    pub fn read_data<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<u8>, Error> {
        let file_length = reader.seek(SeekFrom::End(0))?;
        let available = file_length.saturating_sub(self.byte_offset);
        if available < self.byte_length {
            return Err(Error::TruncatedResource {
                offset: self.byte_offset,
                declared: self.byte_length,
                available,
            });
        }
        let length = usize::try_from(self.byte_length)
            .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;

        reader.seek(SeekFrom::Start(self.byte_offset))?;
        let mut data = vec![0u8; length];
        let read = reader.read_exact_or_eof(&mut data)?;
        if read < length {
            return Err(Error::TruncatedResource {
                offset: self.byte_offset,
                declared: self.byte_length,
                available: read as u64,
            });
        }
        Ok(data)
    }
}


#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ResourceTable {
    pub alignment_shift_count: u16,
    pub records: Vec<RawResourceRecord>,
}
impl ResourceTable {
    /// Reads the resource table at the current position of the reader.
    ///
    /// Resources whose type is given as a string are skipped, as are resources whose name cannot be
    /// found in the resource-name table. Both cases are logged.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
        let resource_table_pos = reader.stream_position()?;

        let alignment_shift_count = reader.read_u16_le()?;
        if alignment_shift_count > MAX_ALIGNMENT_SHIFT {
            return Err(Error::MalformedResourceTable { align_shift: alignment_shift_count });
        }

        let mut records = Vec::new();
        // (offset of name relative to resource table, record)
        let mut awaiting_name = Vec::new();
        loop {
            let type_value = reader.read_u16_le()?;
            if type_value == 0 {
                // that was it
                break;
            }

            let mut type_header_buf = [0u8; 6];
            reader.read_exact(&mut type_header_buf)?;
            let count = u16_at(&type_header_buf, 0);
            // followed by a reserved u32

            // all entries must be consumed even if they are skipped, otherwise the next type is
            // read from the middle of an entry
            for _ in 0..count {
                let mut resource_buf = [0u8; 12];
                reader.read_exact(&mut resource_buf)?;

                let offset_units = u16_at(&resource_buf, 0);
                let length_units = u16_at(&resource_buf, 2);
                let flags = ResourceFlags::from_bits_retain(u16_at(&resource_buf, 4));
                let id_value = u16_at(&resource_buf, 6);
                // followed by handle and usage words, both only meaningful at runtime

                if type_value & INTEGER_ID_FLAG == 0 {
                    warn!(
                        "skipping resource {:#06X} with string-typed type at name offset {:#06X}",
                        id_value, type_value,
                    );
                    continue;
                }

                let mut record = RawResourceRecord {
                    type_id: type_value & !INTEGER_ID_FLAG,
                    numeric_id: None,
                    name: None,
                    flags,
                    byte_offset: u64::from(offset_units) << alignment_shift_count,
                    byte_length: u64::from(length_units) << alignment_shift_count,
                };
                if id_value & INTEGER_ID_FLAG == 0 {
                    // the name table comes after the type list; fill these in later
                    awaiting_name.push((id_value, record));
                } else {
                    record.numeric_id = Some(id_value & !INTEGER_ID_FLAG);
                    records.push(record);
                }
            }
        }

        if !awaiting_name.is_empty() {
            let names = read_name_table(reader, resource_table_pos)?;
            for (name_offset, mut record) in awaiting_name {
                match names.get(&u64::from(name_offset)) {
                    Some(name) => {
                        record.name = Some(name.clone());
                        records.push(record);
                    },
                    None => {
                        warn!(
                            "dropping resource of type {} at {:#X}: no name at offset {:#06X} of the resource-name table",
                            record.type_id, record.byte_offset, name_offset,
                        );
                    },
                }
            }
        }

        Ok(Self {
            alignment_shift_count,
            records,
        })
    }
}

/// Reads the length-prefixed names that follow the type list, keyed by their offset relative to
/// the start of the resource table.
fn read_name_table<R: Read + Seek>(reader: &mut R, resource_table_pos: u64) -> Result<BTreeMap<u64, String>, Error> {
    let mut names = BTreeMap::new();
    loop {
        let name_offset = reader.stream_position()? - resource_table_pos;
        let length = reader.read_u8()?;
        if length == 0 {
            // end of table
            break;
        }
        let mut name_buf = vec![0u8; length.into()];
        reader.read_exact(&mut name_buf)?;

        let name: String = name_buf.iter()
            .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
            .collect();
        debug!("resource name at offset {:#06X}: {:?}", name_offset, name);
        names.insert(name_offset, name);
    }
    Ok(names)
}


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Executable {
    pub header_offset: u64,
    pub header: Header,
    pub resource_table: ResourceTable,
}
impl Executable {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
        let stub = crate::mz::Stub::read(reader)?
            .ok_or(Error::NotAnNeContainer)?;
        let header_offset = stub.new_header_offset;
        debug!("looking for NE header at {:#X}", header_offset);

        reader.seek(SeekFrom::Start(header_offset))?;
        let mut signature_buf = [0u8; 2];
        if reader.read_exact_or_eof(&mut signature_buf)? < signature_buf.len() || signature_buf != SIGNATURE {
            return Err(Error::NotAnNeContainer);
        }

        let mut header_buf = [0u8; HEADER_BODY_SIZE];
        reader.read_exact(&mut header_buf)?;
        let header = Header::from_body(&header_buf);

        let resource_table = if header.has_resource_table() {
            reader.seek(SeekFrom::Start(header_offset + u64::from(header.resource_table_offset)))?;
            ResourceTable::read(reader)?
        } else {
            debug!("NE executable has no resource table");
            ResourceTable::default()
        };

        Ok(Self {
            header_offset,
            header,
            resource_table,
        })
    }
}

/// Reads every resource of an NE executable along with its data.
pub fn read_resources<R: Read + Seek>(reader: &mut R) -> Result<Vec<(RawResourceRecord, Vec<u8>)>, Error> {
    let executable = Executable::read(reader)?;
    let mut resources = Vec::with_capacity(executable.resource_table.records.len());
    for record in executable.resource_table.records {
        let data = record.read_data(reader)?;
        resources.push((record, data));
    }
    Ok(resources)
}


bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct ExeFlags : u16 {
        const SINGLE_DATA = 0x0001;
        const MULTIPLE_DATA = 0x0002;
        const PROTECTED_MODE_ONLY = 0x0008;
        const LINK_ERRORS = 0x2000;
        const LIBRARY_MODULE = 0x8000;
    }

    #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct ResourceFlags : u16 {
        const MOVEABLE = 0x0010;
        const PURE = 0x0020;
        const PRELOAD = 0x0040;
    }
}
