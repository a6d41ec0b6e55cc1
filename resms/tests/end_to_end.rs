use resms::{ResourceType, extract_cursors, extract_icons, materialize};


fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(buf[offset..offset+2].try_into().unwrap())
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset+4].try_into().unwrap())
}


/// Checks an `.ico` or `.cur` file the way an image viewer would and returns its images.
fn validate_icon_file(file: &[u8], file_type: u16) -> Vec<(&[u8; 16], &[u8])> {
    assert!(file.len() >= 6);
    assert_eq!(u16_at(file, 0), 0);
    assert_eq!(u16_at(file, 2), file_type);
    let count = usize::from(u16_at(file, 4));
    assert!(count > 0);

    let mut images = Vec::with_capacity(count);
    let mut expected_offset = 6 + 16 * count;
    for i in 0..count {
        let entry: &[u8; 16] = file[6 + 16*i..6 + 16*(i+1)].try_into().unwrap();
        let size = u32_at(entry, 8) as usize;
        let offset = u32_at(entry, 12) as usize;
        assert_eq!(offset, expected_offset);
        assert!(offset + size <= file.len());
        images.push((entry, &file[offset..offset+size]));
        expected_offset += size;
    }
    assert_eq!(expected_offset, file.len());
    images
}

fn icon_image(width: u32, fill: u8, length: usize) -> Vec<u8> {
    // starts like a BITMAPINFOHEADER
    let mut image = Vec::with_capacity(length);
    image.extend_from_slice(&40u32.to_le_bytes());
    image.extend_from_slice(&width.to_le_bytes());
    image.extend_from_slice(&(2 * width).to_le_bytes());
    image.resize(length, fill);
    image
}

fn icon_group(entries: &[(u8, u16, u32, u16)]) -> Vec<u8> {
    let mut group = vec![0x00, 0x00, 0x01, 0x00];
    group.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for &(size, bit_count, bytes_in_res, image_id) in entries {
        group.extend_from_slice(&[size, size, 0, 0]);
        group.extend_from_slice(&1u16.to_le_bytes());
        group.extend_from_slice(&bit_count.to_le_bytes());
        group.extend_from_slice(&bytes_in_res.to_le_bytes());
        group.extend_from_slice(&image_id.to_le_bytes());
    }
    group
}


/// Builds an NE executable whose resource table contains only numbered resources.
fn build_ne(align_shift: u16, types: &[(u16, Vec<(u16, Vec<u8>)>)]) -> Vec<u8> {
    const NE_OFFSET: usize = 0x80;
    const TABLE_RELATIVE: usize = 0x40;
    let table_pos = NE_OFFSET + TABLE_RELATIVE;
    let unit = 1usize << align_shift;

    let mut file = vec![0u8; table_pos];
    file[0..2].copy_from_slice(b"MZ");
    file[0x18..0x1A].copy_from_slice(&0x0040u16.to_le_bytes());
    file[0x3C..0x3E].copy_from_slice(&(NE_OFFSET as u16).to_le_bytes());
    file[NE_OFFSET..NE_OFFSET+2].copy_from_slice(b"NE");
    file[NE_OFFSET+0x24..NE_OFFSET+0x26].copy_from_slice(&(TABLE_RELATIVE as u16).to_le_bytes());
    file[NE_OFFSET+0x26..NE_OFFSET+0x28].copy_from_slice(&0x0400u16.to_le_bytes());

    let table_size = 2 + types.iter().map(|(_, r)| 8 + 12 * r.len()).sum::<usize>() + 2 + 1;
    let data_start = (table_pos + table_size).div_ceil(unit) * unit;

    let mut data_area = Vec::new();
    file.extend_from_slice(&align_shift.to_le_bytes());
    for (type_id, resources) in types {
        file.extend_from_slice(&(type_id | 0x8000).to_le_bytes());
        file.extend_from_slice(&(resources.len() as u16).to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());
        for (res_id, data) in resources {
            let length_units = data.len().div_ceil(unit);
            file.extend_from_slice(&(((data_start + data_area.len()) / unit) as u16).to_le_bytes());
            file.extend_from_slice(&(length_units as u16).to_le_bytes());
            file.extend_from_slice(&0x1030u16.to_le_bytes());
            file.extend_from_slice(&(res_id | 0x8000).to_le_bytes());
            file.extend_from_slice(&0u32.to_le_bytes());
            let padded_length = data_area.len() + length_units * unit;
            data_area.extend_from_slice(data);
            data_area.resize(padded_length, 0);
        }
    }
    file.extend_from_slice(&0u16.to_le_bytes());
    file.push(0); // empty name table

    file.resize(data_start, 0);
    file.extend_from_slice(&data_area);
    file
}


const RSRC_RVA: u32 = 0x1000;
const RSRC_RAW: usize = 0x200;
const SUBDIRECTORY: u32 = 0x8000_0000;

fn resource_directory(entries: &[(u32, u32)]) -> Vec<u8> {
    let mut directory = vec![0u8; 12];
    directory.extend_from_slice(&0u16.to_le_bytes()); // named entries
    directory.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (key, value) in entries {
        directory.extend_from_slice(&key.to_le_bytes());
        directory.extend_from_slice(&value.to_le_bytes());
    }
    directory
}

/// Builds the contents of a resource section; each resource is `(res_id, lang_id, data)`.
fn build_resource_section(types: &[(u32, Vec<(u32, u32, Vec<u8>)>)]) -> Vec<u8> {
    let leaf_count: usize = types.iter().map(|(_, r)| r.len()).sum();
    let root_size = 16 + 8 * types.len();
    let language_directories_start = root_size + types.iter().map(|(_, r)| 16 + 8 * r.len()).sum::<usize>();
    let data_entries_start = language_directories_start + 24 * leaf_count;
    let blobs_start = data_entries_start + 16 * leaf_count;

    let mut root_entries = Vec::new();
    let mut id_directories = Vec::new();
    let mut language_directories = Vec::new();
    let mut data_entries = Vec::new();
    let mut blobs = Vec::new();
    let mut leaf_index = 0;
    for (type_id, resources) in types {
        root_entries.push((*type_id, SUBDIRECTORY | (root_size + id_directories.len()) as u32));
        let mut id_entries = Vec::new();
        for (res_id, lang_id, data) in resources {
            id_entries.push((*res_id, SUBDIRECTORY | (language_directories_start + 24 * leaf_index) as u32));
            language_directories.extend(resource_directory(&[(*lang_id, (data_entries_start + 16 * leaf_index) as u32)]));

            data_entries.extend_from_slice(&(RSRC_RVA + (blobs_start + blobs.len()) as u32).to_le_bytes());
            data_entries.extend_from_slice(&(data.len() as u32).to_le_bytes());
            data_entries.extend_from_slice(&0u32.to_le_bytes()); // codepage
            data_entries.extend_from_slice(&0u32.to_le_bytes());
            blobs.extend_from_slice(data);
            leaf_index += 1;
        }
        id_directories.extend(resource_directory(&id_entries));
    }

    let mut section = resource_directory(&root_entries);
    section.extend(id_directories);
    assert_eq!(section.len(), language_directories_start);
    section.extend(language_directories);
    section.extend(data_entries);
    assert_eq!(section.len(), blobs_start);
    section.extend(blobs);
    section
}

/// Builds a PE32 executable with a single `.rsrc` section.
fn build_pe(section: &[u8]) -> Vec<u8> {
    const PE_OFFSET: usize = 0x40;
    const OPTIONAL_HEADER_SIZE: usize = 0xE0;
    let optional_header_pos = PE_OFFSET + 4 + 20;
    let section_table_pos = optional_header_pos + OPTIONAL_HEADER_SIZE;
    let raw_size = section.len().div_ceil(0x200) * 0x200;

    let mut file = vec![0u8; RSRC_RAW];
    file[0..2].copy_from_slice(b"MZ");
    file[0x3C..0x40].copy_from_slice(&(PE_OFFSET as u32).to_le_bytes());
    file[PE_OFFSET..PE_OFFSET+4].copy_from_slice(b"PE\0\0");

    let coff = PE_OFFSET + 4;
    file[coff..coff+2].copy_from_slice(&0x014Cu16.to_le_bytes()); // i386
    file[coff+2..coff+4].copy_from_slice(&1u16.to_le_bytes());
    file[coff+16..coff+18].copy_from_slice(&(OPTIONAL_HEADER_SIZE as u16).to_le_bytes());

    let opt = optional_header_pos;
    file[opt..opt+2].copy_from_slice(&0x010Bu16.to_le_bytes());
    file[opt+92..opt+96].copy_from_slice(&16u32.to_le_bytes());
    let resource_directory_pos = opt + 96 + 2 * 8;
    file[resource_directory_pos..resource_directory_pos+4].copy_from_slice(&RSRC_RVA.to_le_bytes());
    file[resource_directory_pos+4..resource_directory_pos+8].copy_from_slice(&(section.len() as u32).to_le_bytes());

    let sec = section_table_pos;
    file[sec..sec+5].copy_from_slice(b".rsrc");
    file[sec+8..sec+12].copy_from_slice(&(section.len() as u32).to_le_bytes());
    file[sec+12..sec+16].copy_from_slice(&RSRC_RVA.to_le_bytes());
    file[sec+16..sec+20].copy_from_slice(&(raw_size as u32).to_le_bytes());
    file[sec+20..sec+24].copy_from_slice(&(RSRC_RAW as u32).to_le_bytes());

    file.extend_from_slice(section);
    file.resize(RSRC_RAW + raw_size, 0);
    file
}


#[test]
fn test_ne_icon() {
    let image = icon_image(32, 0xAB, 40 + 64 + 128);
    let ne = build_ne(4, &[
        (14, vec![(1, icon_group(&[(32, 4, image.len() as u32, 1)]))]),
        (3, vec![(1, image.clone())]),
    ]);

    let entries = materialize(&ne).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.lang_id == 0));
    assert_eq!(entries[0].resource_type(), ResourceType::GroupIcon);

    let icons: Vec<_> = extract_icons(&entries).collect();
    assert_eq!(icons.len(), 1);
    let (group, ico) = icons.into_iter().next().unwrap().unwrap();
    assert_eq!(group.res_id, 1);

    let images = validate_icon_file(&ico, 1);
    assert_eq!(images.len(), 1);
    let (entry, data) = images[0];
    assert_eq!(entry[0], 32);
    assert_eq!(entry[1], 32);
    assert_eq!(u16_at(entry, 6), 4);
    // the padding to the NE alignment is gone
    assert_eq!(data, image.as_slice());

    assert_eq!(extract_cursors(&entries).count(), 0);
}

#[test]
fn test_pe_icons_and_cursors() {
    let large = icon_image(48, 0x11, 300);
    let small = icon_image(16, 0x22, 100);
    let mut cursor = vec![0x03, 0x00, 0x04, 0x00];
    cursor.extend(icon_image(32, 0x33, 200));

    let mut cursor_group = vec![0x00, 0x00, 0x02, 0x00, 0x01, 0x00];
    cursor_group.extend_from_slice(&32u16.to_le_bytes());
    cursor_group.extend_from_slice(&64u16.to_le_bytes());
    cursor_group.extend_from_slice(&1u16.to_le_bytes());
    cursor_group.extend_from_slice(&1u16.to_le_bytes());
    cursor_group.extend_from_slice(&(cursor.len() as u32).to_le_bytes());
    cursor_group.extend_from_slice(&5u16.to_le_bytes());

    let section = build_resource_section(&[
        (1, vec![(5, 1033, cursor.clone())]),
        (3, vec![(1, 1033, large.clone()), (2, 1033, small.clone())]),
        (12, vec![(200, 1033, cursor_group)]),
        (14, vec![(100, 1033, icon_group(&[(48, 32, 300, 1), (16, 8, 100, 2)]))]),
    ]);
    let pe = build_pe(&section);

    let entries = materialize(&pe).unwrap();
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e.lang_id == 1033 && e.name.is_none()));

    let icons: Vec<_> = extract_icons(&entries).collect();
    assert_eq!(icons.len(), 1);
    let (group, ico) = icons.into_iter().next().unwrap().unwrap();
    assert_eq!(group.res_id, 100);
    let images = validate_icon_file(&ico, 1);
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].0[0], 48);
    assert_eq!(images[0].1, large.as_slice());
    assert_eq!(images[1].0[0], 16);
    assert_eq!(images[1].1, small.as_slice());

    let cursors: Vec<_> = extract_cursors(&entries).collect();
    assert_eq!(cursors.len(), 1);
    let (group, cur) = cursors.into_iter().next().unwrap().unwrap();
    assert_eq!(group.res_id, 200);
    let images = validate_icon_file(&cur, 2);
    assert_eq!(images.len(), 1);
    let (entry, data) = images[0];
    assert_eq!(entry[0], 32);
    assert_eq!(entry[1], 32);
    assert_eq!(u16_at(entry, 4), 3);
    assert_eq!(u16_at(entry, 6), 4);
    assert_eq!(data, &cursor[4..]);
}
