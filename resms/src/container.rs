//! Turning an executable into a flat list of resources, whichever format it is in.


use std::collections::BTreeSet;
use std::io::Cursor;

use tracing::{debug, warn};

use crate::error::Error;
use crate::ne;
use crate::pe::{self, PeResourceParser, ResourceIdentifier, ResourceTree, SectionResourceReader};
use crate::resource::ResourceEntry;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ContainerKind {
    Pe,
    Ne,
}


/// The resources of an executable, along with the format they were found in.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Container {
    pub kind: ContainerKind,
    pub entries: Vec<ResourceEntry>,
}
impl Container {
    /// Reads the resources of a PE or NE executable.
    ///
    /// PE is tried first. Only if `pe_parser` reports that the data is not a PE file at all is NE
    /// attempted; a broken PE file is an error in its own right.
    pub fn read(data: &[u8], pe_parser: &dyn PeResourceParser) -> Result<Self, Error> {
        match pe_parser.parse(data) {
            Ok(tree) => {
                debug!("PE file with {} resource types", tree.len());
                return Ok(Self {
                    kind: ContainerKind::Pe,
                    entries: entries_from_pe_tree(tree),
                });
            },
            Err(pe::Error::NotPe) => {
                debug!("not a PE file; trying NE");
            },
            Err(e) => return Err(e.into()),
        }

        let records = match ne::read_resources(&mut Cursor::new(data)) {
            Ok(r) => r,
            Err(Error::NotAnNeContainer) => return Err(Error::UnsupportedContainer),
            Err(e) => return Err(e),
        };
        Ok(Self {
            kind: ContainerKind::Ne,
            entries: entries_from_ne_records(records),
        })
    }
}


/// Reads every resource of a PE or NE executable, using the built-in PE resource reader.
pub fn materialize(data: &[u8]) -> Result<Vec<ResourceEntry>, Error> {
    materialize_with(data, &SectionResourceReader)
}

/// Reads every resource of a PE or NE executable, using the given PE resource parser.
pub fn materialize_with(data: &[u8], pe_parser: &dyn PeResourceParser) -> Result<Vec<ResourceEntry>, Error> {
    Container::read(data, pe_parser)
        .map(|container| container.entries)
}


fn entries_from_pe_tree(tree: ResourceTree) -> Vec<ResourceEntry> {
    let mut entries = Vec::new();
    for (type_ident, ids) in tree {
        let type_id = match type_ident {
            ResourceIdentifier::Integer(t) => t,
            ResourceIdentifier::Name(name) => {
                debug!("skipping resources of named type {:?}", name);
                continue;
            },
        };
        for (id_ident, languages) in ids {
            let (res_id, name) = match id_ident {
                ResourceIdentifier::Integer(i) => (i, None),
                ResourceIdentifier::Name(n) => (0, Some(n)),
            };
            for (lang_id, data) in languages {
                entries.push(ResourceEntry {
                    type_id,
                    res_id,
                    name: name.clone(),
                    lang_id,
                    data,
                });
            }
        }
    }
    entries
}

fn entries_from_ne_records(records: Vec<(ne::RawResourceRecord, Vec<u8>)>) -> Vec<ResourceEntry> {
    let mut seen = BTreeSet::new();
    let mut entries = Vec::with_capacity(records.len());
    for (record, data) in records {
        let entry = ResourceEntry {
            type_id: record.type_id.into(),
            res_id: record.numeric_id.map(u32::from).unwrap_or(0),
            name: record.name,
            lang_id: 0,
            data,
        };
        // (type, id or name, language) identifies a resource; NE tables may repeat one, PE
        // directories cannot, so the first NE record wins
        let key = (entry.type_id, entry.res_id, entry.name.clone());
        if !seen.insert(key) {
            warn!("duplicate resource {}; keeping the first one", entry);
            continue;
        }
        entries.push(entry);
    }
    entries
}
