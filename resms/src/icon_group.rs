//! Icon and cursor group directories.
//!
//! A group resource (`RT_GROUP_ICON` or `RT_GROUP_CURSOR`) lists the individual images (`RT_ICON` or
//! `RT_CURSOR` resources) that together make up one icon or cursor. Its layout resembles the
//! directory at the start of an `.ico`/`.cur` file, except that each entry references an image by
//! resource ID instead of by file offset.

use tracing::debug;

use crate::error::Error;
use crate::read_ext::{u16_at, u32_at};
use crate::resource::ResourceType;


pub const HEADER_SIZE: usize = 6;
pub const ENTRY_SIZE: usize = 14;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum GroupKind {
    Icon,
    Cursor,
}
impl GroupKind {
    /// The value of the type field in the group and file headers.
    pub fn header_type(&self) -> u16 {
        match self {
            Self::Icon => 1,
            Self::Cursor => 2,
        }
    }

    pub fn group_resource_type(&self) -> ResourceType {
        match self {
            Self::Icon => ResourceType::GroupIcon,
            Self::Cursor => ResourceType::GroupCursor,
        }
    }

    pub fn image_resource_type(&self) -> ResourceType {
        match self {
            Self::Icon => ResourceType::Icon,
            Self::Cursor => ResourceType::Cursor,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Icon => "ico",
            Self::Cursor => "cur",
        }
    }
}


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GroupDirectory {
    pub reserved: u16, // 0x0000
    pub group_type: u16, // 0x0001 for icons, 0x0002 for cursors
    // count: u16,
    pub entries: Vec<GroupDirectoryEntry>, // [GroupDirectoryEntry; count]
}
impl GroupDirectory {
    /// Parses the data of a group resource.
    ///
    /// Trailing bytes beyond the last entry are ignored.
    pub fn parse(bytes: &[u8], kind: GroupKind) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::TruncatedGroupDirectory {
                declared_entries: 0,
                available_bytes: bytes.len(),
            });
        }

        let reserved = u16_at(bytes, 0);
        let group_type = u16_at(bytes, 2);
        let count = u16_at(bytes, 4);
        if group_type != kind.header_type() {
            debug!("{:?} group has header type {}", kind, group_type);
        }

        let rest = &bytes[HEADER_SIZE..];
        if rest.len() < usize::from(count) * ENTRY_SIZE {
            return Err(Error::TruncatedGroupDirectory {
                declared_entries: count,
                available_bytes: bytes.len(),
            });
        }

        let entries = rest.chunks_exact(ENTRY_SIZE)
            .take(count.into())
            .map(|chunk| GroupDirectoryEntry::from_bytes(chunk, kind))
            .collect();
        Ok(Self {
            reserved,
            group_type,
            entries,
        })
    }
}


/// One image referenced by a group.
///
/// Icon entries store width and height as bytes, followed by a color count and a reserved byte;
/// cursor entries store width and height as words and have neither of the other two fields, which
/// are then zero. The height of a cursor entry includes the AND mask and is therefore doubled.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GroupDirectoryEntry {
    pub width: u16,
    pub height: u16,
    pub color_count: u8,
    pub reserved: u8,
    pub planes: u16,
    pub bit_count: u16,
    pub bytes_in_res: u32,
    pub image_id: u16,
}
impl GroupDirectoryEntry {
    fn from_bytes(bytes: &[u8], kind: GroupKind) -> Self {
        let (width, height, color_count, reserved) = match kind {
            GroupKind::Icon => (u16::from(bytes[0]), u16::from(bytes[1]), bytes[2], bytes[3]),
            GroupKind::Cursor => (u16_at(bytes, 0), u16_at(bytes, 2), 0, 0),
        };
        Self {
            width,
            height,
            color_count,
            reserved,
            planes: u16_at(bytes, 4),
            bit_count: u16_at(bytes, 6),
            bytes_in_res: u32_at(bytes, 8),
            image_id: u16_at(bytes, 12),
        }
    }
}
