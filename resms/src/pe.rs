//! Resources of Portable Executables.
//!
//! The PE format was introduced in Windows NT 3.1 and Windows 95; it is based on COFF and used by
//! Windows to this day. Only as much of it is decoded as is needed to reach the resource directory;
//! callers with a full PE parser at hand can supply it through [`PeResourceParser`] instead.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use tracing::debug;

use crate::read_ext::{ReadExt, u16_at, u32_at};


pub const SIGNATURE: [u8; 4] = *b"PE\0\0";

const NEW_HEADER_OFFSET_OFFSET: u64 = 0x3C;
const COFF_HEADER_SIZE: usize = 20;
const SECTION_TABLE_ENTRY_SIZE: usize = 40;
const RESOURCE_DATA_DIRECTORY_INDEX: usize = 2;

/// Set on directory entry values pointing to a subdirectory and on name offsets.
const HIGH_BIT: u32 = 0x8000_0000;


#[derive(Debug)]
pub enum Error {
    /// The data does not carry the MZ and PE signatures.
    NotPe,
    Io(io::Error),
    UnknownOptionalHeader { magic: u16 },
    UnmappedAddress { virtual_address: u32 },
    NameWithoutHighBit { name_offset: u32 },
    DuplicateKey { level: usize, key: ResourceIdentifier },
    UnexpectedData { level: usize },
    UnexpectedSubdirectory,
    DataOutOfBounds { raw_address: u32, size: u32 },
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPe
                => write!(f, "not a PE file"),
            Self::Io(e)
                => write!(f, "I/O error: {}", e),
            Self::UnknownOptionalHeader { magic }
                => write!(f, "unknown optional header magic {:#06X}", magic),
            Self::UnmappedAddress { virtual_address }
                => write!(f, "virtual address {:#010X} is not backed by any section", virtual_address),
            Self::NameWithoutHighBit { name_offset }
                => write!(f, "named resource entry has a name offset {:#010X} without top bit set", name_offset),
            Self::DuplicateKey { level, key }
                => write!(f, "duplicate resource key {:?} at directory level {}", key, level),
            Self::UnexpectedData { level }
                => write!(f, "data entry found at directory level {}", level),
            Self::UnexpectedSubdirectory
                => write!(f, "subdirectory found at language level"),
            Self::DataOutOfBounds { raw_address, size }
                => write!(f, "resource data at {:#010X} with {} bytes extends past the end of the file", raw_address, size),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self { Self::Io(value) }
}


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ResourceIdentifier {
    Name(String), // name_offset: u32 -> Pascal UTF-16LE string
    Integer(u32),
}

/// Language ID to resource data.
pub type LanguageMap = BTreeMap<u32, Vec<u8>>;

/// Type to resource ID to language to data, mirroring the three levels of the resource directory.
pub type ResourceTree = BTreeMap<ResourceIdentifier, BTreeMap<ResourceIdentifier, LanguageMap>>;


/// Something that can extract the resource tree from a PE file.
pub trait PeResourceParser {
    /// Parses the resources of the given file.
    ///
    /// Must return [`Error::NotPe`] if and only if the data is not a PE file at all, so that the
    /// caller can try other formats; every other error means a broken PE file.
    fn parse(&self, data: &[u8]) -> Result<ResourceTree, Error>;
}


/// Reads the resource directory straight from the section table.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SectionResourceReader;
impl PeResourceParser for SectionResourceReader {
    fn parse(&self, data: &[u8]) -> Result<ResourceTree, Error> {
        let mut reader = Cursor::new(data);
        let pe_header_offset = locate_pe_header(&mut reader)?
            .ok_or(Error::NotPe)?;

        let mut coff_buf = [0u8; COFF_HEADER_SIZE];
        reader.read_exact(&mut coff_buf)?;
        let section_count = u16_at(&coff_buf, 2);
        let optional_header_size = u16_at(&coff_buf, 16);

        let mut optional_header = vec![0u8; optional_header_size.into()];
        reader.read_exact(&mut optional_header)?;
        let Some(resource_directory) = resource_directory_entry(&optional_header)? else {
            debug!("PE file has no resource directory");
            return Ok(ResourceTree::new());
        };

        // section table follows the optional header
        reader.seek(SeekFrom::Start(
            pe_header_offset + (SIGNATURE.len() + COFF_HEADER_SIZE) as u64 + u64::from(optional_header_size)
        ))?;
        let mut sections = Vec::with_capacity(section_count.into());
        for _ in 0..section_count {
            sections.push(SectionTableEntry::read(&mut reader)?);
        }

        let mut section = ResourceSection {
            reader: &mut reader,
            sections: &sections,
            start_virtual: resource_directory.address,
        };
        section.read_tree()
    }
}

/// Returns the offset of the PE signature if the data has both the MZ and the PE signatures.
fn locate_pe_header<R: Read + Seek>(reader: &mut R) -> Result<Option<u64>, Error> {
    let mut mz_buf = [0u8; 2];
    if reader.read_exact_or_eof(&mut mz_buf)? < mz_buf.len() || mz_buf != crate::mz::SIGNATURE {
        return Ok(None);
    }

    reader.seek(SeekFrom::Start(NEW_HEADER_OFFSET_OFFSET))?;
    let mut offset_buf = [0u8; 4];
    if reader.read_exact_or_eof(&mut offset_buf)? < offset_buf.len() {
        return Ok(None);
    }
    let pe_header_offset: u64 = u32::from_le_bytes(offset_buf).into();

    reader.seek(SeekFrom::Start(pe_header_offset))?;
    let mut signature_buf = [0u8; 4];
    if reader.read_exact_or_eof(&mut signature_buf)? < signature_buf.len() || signature_buf != SIGNATURE {
        return Ok(None);
    }
    Ok(Some(pe_header_offset))
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DataDirectoryEntry {
    pub address: u32,
    pub size: u32,
}

/// Finds the resource entry among the data directories at the end of the optional header.
fn resource_directory_entry(optional_header: &[u8]) -> Result<Option<DataDirectoryEntry>, Error> {
    if optional_header.len() < 2 {
        // not enough for even the magic value
        return Ok(None);
    }
    let magic = u16_at(optional_header, 0);
    let (count_offset, directories_offset) = match magic {
        0x010B => (92, 96), // PE32
        0x020B => (108, 112), // PE32+
        other => return Err(Error::UnknownOptionalHeader { magic: other }),
    };
    if optional_header.len() < count_offset + 4 {
        return Ok(None);
    }
    let directory_count = u32_at(optional_header, count_offset);
    if directory_count as usize <= RESOURCE_DATA_DIRECTORY_INDEX {
        return Ok(None);
    }

    let entry_offset = directories_offset + RESOURCE_DATA_DIRECTORY_INDEX * 8;
    if optional_header.len() < entry_offset + 8 {
        return Ok(None);
    }
    let entry = DataDirectoryEntry {
        address: u32_at(optional_header, entry_offset),
        size: u32_at(optional_header, entry_offset + 4),
    };
    if entry.address == 0 || entry.size == 0 {
        Ok(None)
    } else {
        Ok(Some(entry))
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SectionTableEntry {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub raw_data_size: u32,
    pub raw_data_pointer: u32,
}
impl SectionTableEntry {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, io::Error> {
        let mut entry_buf = [0u8; SECTION_TABLE_ENTRY_SIZE];
        reader.read_exact(&mut entry_buf)?;

        let mut name = [0u8; 8];
        name.copy_from_slice(&entry_buf[0..8]);
        // relocation and line number information is irrelevant for resources

        Ok(Self {
            name,
            virtual_size: u32_at(&entry_buf, 8),
            virtual_address: u32_at(&entry_buf, 12),
            raw_data_size: u32_at(&entry_buf, 16),
            raw_data_pointer: u32_at(&entry_buf, 20),
        })
    }

    fn mapped_size(&self) -> u32 {
        // some linkers leave the virtual size empty
        if self.virtual_size == 0 { self.raw_data_size } else { self.virtual_size }
    }
}

fn virtual_to_raw(sections: &[SectionTableEntry], virtual_addr: u32) -> Option<u32> {
    for entry in sections {
        let end = entry.virtual_address.saturating_add(entry.mapped_size());
        if virtual_addr >= entry.virtual_address && virtual_addr < end {
            let offset = virtual_addr - entry.virtual_address;
            if offset >= entry.raw_data_size {
                // that won't fit
                return None;
            }
            return entry.raw_data_pointer.checked_add(offset);
        }
    }
    None
}


struct ResourceSection<'a, R> {
    reader: &'a mut R,
    sections: &'a [SectionTableEntry],
    start_virtual: u32,
}
impl<'a, R: Read + Seek> ResourceSection<'a, R> {
    fn seek_virtual(&mut self, virtual_address: u32) -> Result<(), Error> {
        let raw = virtual_to_raw(self.sections, virtual_address)
            .ok_or(Error::UnmappedAddress { virtual_address })?;
        self.reader.seek(SeekFrom::Start(raw.into()))?;
        Ok(())
    }

    /// Reads the directory at the given offset from the start of the resource section.
    ///
    /// Returns each entry's identifier and the raw value word (subdirectory or data entry offset).
    fn read_directory(&mut self, level: usize, offset: u32) -> Result<Vec<(ResourceIdentifier, u32)>, Error> {
        self.seek_virtual(self.start_virtual.wrapping_add(offset))?;

        let mut header_buf = [0u8; 16];
        self.reader.read_exact(&mut header_buf)?;
        // characteristics, timestamp and version are not interesting
        let name_entry_count = u16_at(&header_buf, 12);
        let id_entry_count = u16_at(&header_buf, 14);

        let total_entry_count = usize::from(name_entry_count) + usize::from(id_entry_count);
        let mut entry_bytes = vec![0u8; total_entry_count * 8];
        self.reader.read_exact(&mut entry_bytes)?;

        let mut entries: Vec<(ResourceIdentifier, u32)> = Vec::with_capacity(total_entry_count);
        for (i, entry) in entry_bytes.chunks_exact(8).enumerate() {
            let key_value = u32_at(entry, 0);
            let value = u32_at(entry, 4);

            // named entries come first
            let key = if i < usize::from(name_entry_count) {
                if key_value & HIGH_BIT == 0 {
                    return Err(Error::NameWithoutHighBit { name_offset: key_value });
                }
                let name = self.read_name(key_value & !HIGH_BIT)?;
                ResourceIdentifier::Name(name)
            } else {
                ResourceIdentifier::Integer(key_value)
            };

            if entries.iter().any(|(k, _)| *k == key) {
                return Err(Error::DuplicateKey { level, key });
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    fn read_name(&mut self, offset: u32) -> Result<String, Error> {
        self.seek_virtual(self.start_virtual.wrapping_add(offset))?;
        let length = self.reader.read_u16_le()?;
        let mut units = Vec::with_capacity(length.into());
        for _ in 0..length {
            units.push(self.reader.read_u16_le()?);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    fn read_data(&mut self, offset: u32) -> Result<Vec<u8>, Error> {
        self.seek_virtual(self.start_virtual.wrapping_add(offset))?;
        let mut entry_buf = [0u8; 16];
        self.reader.read_exact(&mut entry_buf)?;
        let data_rva = u32_at(&entry_buf, 0);
        let size = u32_at(&entry_buf, 4);
        // followed by codepage and a reserved u32

        let raw_address = virtual_to_raw(self.sections, data_rva)
            .ok_or(Error::UnmappedAddress { virtual_address: data_rva })?;
        let file_length = self.reader.seek(SeekFrom::End(0))?;
        if u64::from(raw_address) + u64::from(size) > file_length {
            return Err(Error::DataOutOfBounds { raw_address, size });
        }
        self.reader.seek(SeekFrom::Start(raw_address.into()))?;
        let mut data = vec![0u8; size as usize];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }

    fn subdirectory_offset(value: u32, level: usize) -> Result<u32, Error> {
        if value & HIGH_BIT == 0 {
            Err(Error::UnexpectedData { level })
        } else {
            Ok(value & !HIGH_BIT)
        }
    }

    fn read_tree(&mut self) -> Result<ResourceTree, Error> {
        let mut tree = ResourceTree::new();
        for (type_id, type_value) in self.read_directory(0, 0)? {
            let type_offset = Self::subdirectory_offset(type_value, 0)?;

            let mut id_to_languages = BTreeMap::new();
            for (res_id, id_value) in self.read_directory(1, type_offset)? {
                let id_offset = Self::subdirectory_offset(id_value, 1)?;

                let mut languages = LanguageMap::new();
                for (language, language_value) in self.read_directory(2, id_offset)? {
                    let ResourceIdentifier::Integer(lang_id) = language else {
                        debug!("skipping resource {:?}/{:?} with named language {:?}", type_id, res_id, language);
                        continue;
                    };
                    if language_value & HIGH_BIT != 0 {
                        return Err(Error::UnexpectedSubdirectory);
                    }
                    let data = self.read_data(language_value)?;
                    languages.insert(lang_id, data);
                }
                id_to_languages.insert(res_id, languages);
            }
            tree.insert(type_id, id_to_languages);
        }
        Ok(tree)
    }
}
