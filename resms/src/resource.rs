//! The resource model shared by NE and PE executables.

use std::fmt;

use from_to_repr::from_to_other;


/// The well-known resource types.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[from_to_other(base_type = u32, derive_compare = "as_int")]
pub enum ResourceType {
    Cursor = 1,
    Bitmap = 2,
    Icon = 3,
    Menu = 4,
    Dialog = 5,
    StringTable = 6,
    FontDirectory = 7,
    Font = 8,
    Accelerator = 9,
    RcData = 10,
    MessageTable = 11,
    GroupCursor = 12,
    GroupIcon = 14,
    Version = 16,
    DialogInclude = 17,
    PlugAndPlay = 19,
    Vxd = 20,
    AnimatedCursor = 21,
    AnimatedIcon = 22,
    Html = 23,
    Manifest = 24,
    Other(u32),
}
impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cursor => "RT_CURSOR",
            Self::Bitmap => "RT_BITMAP",
            Self::Icon => "RT_ICON",
            Self::Menu => "RT_MENU",
            Self::Dialog => "RT_DIALOG",
            Self::StringTable => "RT_STRING",
            Self::FontDirectory => "RT_FONTDIR",
            Self::Font => "RT_FONT",
            Self::Accelerator => "RT_ACCELERATOR",
            Self::RcData => "RT_RCDATA",
            Self::MessageTable => "RT_MESSAGETABLE",
            Self::GroupCursor => "RT_GROUP_CURSOR",
            Self::GroupIcon => "RT_GROUP_ICON",
            Self::Version => "RT_VERSION",
            Self::DialogInclude => "RT_DLGINCLUDE",
            Self::PlugAndPlay => "RT_PLUGPLAY",
            Self::Vxd => "RT_VXD",
            Self::AnimatedCursor => "RT_ANICURSOR",
            Self::AnimatedIcon => "RT_ANIICON",
            Self::Html => "RT_HTML",
            Self::Manifest => "RT_MANIFEST",
            Self::Other(other) => return write!(f, "{}", other),
        };
        f.write_str(name)
    }
}


/// A resource with its data, regardless of which kind of executable it came from.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ResourceEntry {
    pub type_id: u32,
    pub res_id: u32, // 0 if the resource is only known by name
    pub name: Option<String>,
    pub lang_id: u32, // always 0 for NE
    pub data: Vec<u8>,
}
impl ResourceEntry {
    pub fn resource_type(&self) -> ResourceType {
        ResourceType::from_base_type(self.type_id)
    }

    /// The identity of this resource within its type: `(res_id, name, lang_id)`.
    pub fn key(&self) -> (u32, Option<&str>, u32) {
        (self.res_id, self.name.as_deref(), self.lang_id)
    }

    /// A string suitable as part of an output file name: the name (or, failing that, the numeric
    /// ID), followed by the language if it is not neutral.
    ///
    /// Names come from the executable, so path separators, drive colons and control characters are
    /// replaced with `_`, as is a name consisting only of dots.
    pub fn filename_part(&self) -> String {
        let mut part = match &self.name {
            Some(name) => sanitize_name(name),
            None => self.res_id.to_string(),
        };
        if self.lang_id != 0 {
            part.push('_');
            part.push_str(&self.lang_id.to_string());
        }
        part
    }
}

fn sanitize_name(name: &str) -> String {
    if name.is_empty() || name.chars().all(|c| c == '.') {
        return "_".repeat(name.len().max(1));
    }
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

impl fmt::Display for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.resource_type())?;
        match &self.name {
            Some(name) => write!(f, "{:?}", name)?,
            None => write!(f, "{}", self.res_id)?,
        }
        write!(f, " @ {}, {} bytes)", self.lang_id, self.data.len())
    }
}
