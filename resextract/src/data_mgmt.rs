use std::fmt;
use std::path::{Component, Path, PathBuf};

use resms::{ResourceEntry, ResourceType};
use resms::container::{Container, ContainerKind};
use resms::icon_group::{GroupDirectory, GroupKind};
use serde::Serialize;
use tracing::debug;


/// A resource as shown by the `list` command, without its data.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ListedResource {
    pub type_id: u32,
    pub resource_type: ResourceType,
    pub type_name: String,
    pub res_id: u32,
    pub name: Option<String>,
    pub lang_id: u32,
    pub length: usize,

    /// The decoded directory if this is an icon or cursor group.
    pub group: Option<GroupDirectory>,
}
impl ListedResource {
    pub fn new(entry: &ResourceEntry) -> Self {
        let group = group_kind(entry)
            .and_then(|kind| match GroupDirectory::parse(&entry.data, kind) {
                Ok(g) => Some(g),
                Err(e) => {
                    debug!("{} does not decode as a group: {}", entry, e);
                    None
                },
            });
        Self {
            type_id: entry.type_id,
            resource_type: entry.resource_type(),
            type_name: entry.resource_type().to_string(),
            res_id: entry.res_id,
            name: entry.name.clone(),
            lang_id: entry.lang_id,
            length: entry.data.len(),
            group,
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Listing {
    pub kind: ContainerKind,
    pub resources: Vec<ListedResource>,
}
impl From<&Container> for Listing {
    fn from(value: &Container) -> Self {
        Self {
            kind: value.kind,
            resources: value.entries.iter()
                .map(ListedResource::new)
                .collect(),
        }
    }
}

fn group_kind(entry: &ResourceEntry) -> Option<GroupKind> {
    [GroupKind::Icon, GroupKind::Cursor].into_iter()
        .find(|kind| kind.group_resource_type().to_base_type() == entry.type_id)
}


/// The file name for a reassembled icon or cursor group.
pub fn group_file_name(group: &ResourceEntry, kind: GroupKind) -> String {
    format!("{}.{}", group.filename_part(), kind.file_extension())
}

/// The file name for the verbatim data of a resource.
pub fn raw_file_name(entry: &ResourceEntry) -> String {
    format!("{}_{}.bin", entry.resource_type(), entry.filename_part())
}

/// Writes an output file into `dir`, creating the directory if necessary.
///
/// `file_name` must be a single plain path component; anything else would place the file outside
/// `dir`.
pub fn write_output(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf, Error> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {},
        _ => return Err(Error::UnsafeFileName(file_name.to_owned())),
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, data)?;
    debug!("wrote {} bytes to {}", data.len(), path.display());
    Ok(path)
}


/// Sometimes things go wrong.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Resources(resms::Error),
    Json(serde_json::Error),
    FailedGroups(usize),
    UnsafeFileName(String),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)
                => write!(f, "I/O error: {}", e),
            Self::Resources(e)
                => write!(f, "failed to read resources: {}", e),
            Self::Json(e)
                => write!(f, "failed to output JSON: {}", e),
            Self::FailedGroups(count)
                => write!(f, "{} groups could not be reassembled", count),
            Self::UnsafeFileName(name)
                => write!(f, "refusing to write to {:?}, which is not a plain file name", name),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Resources(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::FailedGroups(_) => None,
            Self::UnsafeFileName(_) => None,
        }
    }
}
impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self { Self::Io(value) }
}
impl From<resms::Error> for Error {
    fn from(value: resms::Error) -> Self { Self::Resources(value) }
}
impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self { Self::Json(value) }
}
