//! Reassembly of standalone `.ico` and `.cur` files from group and image resources.
//!
//! The output has the well-known layout of these files: a 6-byte header (`reserved = 0`, type,
//! count), one 16-byte directory entry per image, then the image data in directory order.
//!
//! Icon directory entries are `{width: u8, height: u8, color_count: u8, reserved: u8, planes: u16,
//! bit_count: u16, bytes_in_res: u32, image_offset: u32}`. Cursor directory entries replace planes
//! and bit count with the hotspot coordinates; the hotspot is taken from the first four bytes of the
//! cursor resource, which are not part of the image and are therefore not copied.

use std::collections::BTreeMap;
use std::slice;

use tracing::debug;

use crate::error::Error;
use crate::icon_group::{GroupDirectory, GroupDirectoryEntry, GroupKind, HEADER_SIZE};
use crate::read_ext::u16_at;
use crate::resource::ResourceEntry;


pub const FILE_ENTRY_SIZE: usize = 16;
pub const CURSOR_HOTSPOT_SIZE: usize = 4;


/// Returns an iterator over every icon group in `entries`, along with the `.ico` file built from it.
pub fn extract_icons(entries: &[ResourceEntry]) -> GroupReassembler<'_> {
    GroupReassembler::new(entries, GroupKind::Icon)
}

/// Returns an iterator over every cursor group in `entries`, along with the `.cur` file built from
/// it.
pub fn extract_cursors(entries: &[ResourceEntry]) -> GroupReassembler<'_> {
    GroupReassembler::new(entries, GroupKind::Cursor)
}


/// Reassembles one group after the other.
///
/// A group that fails to reassemble yields an error; iteration then continues with the next group.
#[derive(Clone, Debug)]
pub struct GroupReassembler<'a> {
    kind: GroupKind,
    remaining: slice::Iter<'a, ResourceEntry>,
    images: BTreeMap<(u32, u32), &'a [u8]>, // (res_id, lang_id) -> data
}
impl<'a> GroupReassembler<'a> {
    pub fn new(entries: &'a [ResourceEntry], kind: GroupKind) -> Self {
        let image_type = kind.image_resource_type().to_base_type();
        let images = entries.iter()
            .filter(|e| e.type_id == image_type && e.name.is_none())
            .map(|e| ((e.res_id, e.lang_id), e.data.as_slice()))
            .collect();
        Self {
            kind,
            remaining: entries.iter(),
            images,
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Builds the file for a single group resource.
    pub fn reassemble(&self, group: &ResourceEntry) -> Result<Vec<u8>, Error> {
        let directory = GroupDirectory::parse(&group.data, self.kind)?;
        let mut images = Vec::with_capacity(directory.entries.len());
        for (i, entry) in directory.entries.iter().enumerate() {
            debug!("{}: {}/{}: {:?}", group, i + 1, directory.entries.len(), entry);
            let data = self.image_data(entry, group.lang_id)?;
            images.push(FileImage::new(self.kind, entry, data)?);
        }
        write_file(self.kind, &images)
    }

    /// Finds the image for a directory entry and cuts it to the size the entry declares.
    fn image_data(&self, entry: &GroupDirectoryEntry, lang_id: u32) -> Result<&'a [u8], Error> {
        let data = self.images.get(&(u32::from(entry.image_id), lang_id))
            .ok_or(Error::MissingIconData { image_id: entry.image_id, lang_id })?;
        let declared = usize::try_from(entry.bytes_in_res).unwrap_or(usize::MAX);
        if data.len() < declared {
            return Err(Error::TruncatedIconData {
                image_id: entry.image_id,
                declared: entry.bytes_in_res,
                available: data.len(),
            });
        }
        // anything beyond the declared size is padding
        Ok(&data[..declared])
    }
}
impl<'a> Iterator for GroupReassembler<'a> {
    type Item = Result<(&'a ResourceEntry, Vec<u8>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let group_type = self.kind.group_resource_type().to_base_type();
        let group = self.remaining.by_ref().find(|e| e.type_id == group_type)?;
        Some(self.reassemble(group).map(|data| (group, data)))
    }
}


/// An image as it will appear in the output file.
struct FileImage<'a> {
    width: u8,
    height: u8,
    color_count: u8,
    reserved: u8,
    planes_or_hotspot_x: u16,
    bit_count_or_hotspot_y: u16,
    data: &'a [u8],
}
impl<'a> FileImage<'a> {
    fn new(kind: GroupKind, entry: &GroupDirectoryEntry, data: &'a [u8]) -> Result<Self, Error> {
        match kind {
            GroupKind::Icon => Ok(Self {
                width: file_dimension(entry.width),
                height: file_dimension(entry.height),
                color_count: entry.color_count,
                reserved: entry.reserved,
                planes_or_hotspot_x: entry.planes,
                bit_count_or_hotspot_y: entry.bit_count,
                data,
            }),
            GroupKind::Cursor => {
                if data.len() < CURSOR_HOTSPOT_SIZE {
                    return Err(Error::TruncatedIconData {
                        image_id: entry.image_id,
                        declared: entry.bytes_in_res,
                        available: data.len(),
                    });
                }
                Ok(Self {
                    width: file_dimension(entry.width),
                    // the resource height covers both the XOR and the AND mask
                    height: file_dimension(entry.height / 2),
                    color_count: 0,
                    reserved: 0,
                    planes_or_hotspot_x: u16_at(data, 0),
                    bit_count_or_hotspot_y: u16_at(data, 2),
                    data: &data[CURSOR_HOTSPOT_SIZE..],
                })
            },
        }
    }
}

/// File directories store 256 (and anything larger) as 0.
fn file_dimension(value: u16) -> u8 {
    u8::try_from(value).unwrap_or(0)
}

fn write_file(kind: GroupKind, images: &[FileImage<'_>]) -> Result<Vec<u8>, Error> {
    // the group directory count is a u16, so this cannot overflow
    let count = images.len() as u16;

    let directory_end = HEADER_SIZE + FILE_ENTRY_SIZE * images.len();
    let total_size = directory_end + images.iter().map(|i| i.data.len()).sum::<usize>();
    if u32::try_from(total_size).is_err() {
        return Err(Error::OutputTooLarge);
    }

    let mut file = Vec::with_capacity(total_size);
    file.extend_from_slice(&0u16.to_le_bytes());
    file.extend_from_slice(&kind.header_type().to_le_bytes());
    file.extend_from_slice(&count.to_le_bytes());

    let mut offsets = Vec::with_capacity(images.len());
    let mut offset = directory_end;
    for image in images {
        offsets.push(offset);
        file.push(image.width);
        file.push(image.height);
        file.push(image.color_count);
        file.push(image.reserved);
        file.extend_from_slice(&image.planes_or_hotspot_x.to_le_bytes());
        file.extend_from_slice(&image.bit_count_or_hotspot_y.to_le_bytes());
        // both fit into u32 since the whole file does
        file.extend_from_slice(&(image.data.len() as u32).to_le_bytes());
        file.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += image.data.len();
    }

    for (offset, image) in offsets.iter().zip(images) {
        assert_eq!(file.len(), *offset, "image data not at its directory offset");
        file.extend_from_slice(image.data);
    }
    Ok(file)
}
