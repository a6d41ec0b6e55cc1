use std::fmt;


/// Sometimes resources cannot be obtained.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Pe(crate::pe::Error),
    NotAnNeContainer,
    MalformedResourceTable { align_shift: u16 },
    TruncatedResource { offset: u64, declared: u64, available: u64 },
    UnsupportedContainer,
    TruncatedGroupDirectory { declared_entries: u16, available_bytes: usize },
    MissingIconData { image_id: u16, lang_id: u32 },
    TruncatedIconData { image_id: u16, declared: u32, available: usize },
    OutputTooLarge,
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)
                => write!(f, "I/O error: {}", e),
            Self::Pe(e)
                => write!(f, "PE resource error: {}", e),
            Self::NotAnNeContainer
                => write!(f, "not an NE executable"),
            Self::MalformedResourceTable { align_shift }
                => write!(f, "NE resource table alignment shift {} is implausibly large", align_shift),
            Self::TruncatedResource { offset, declared, available }
                => write!(f, "resource at {:#X} declares {} bytes but only {} are available", offset, declared, available),
            Self::UnsupportedContainer
                => write!(f, "neither a PE nor an NE executable"),
            Self::TruncatedGroupDirectory { declared_entries, available_bytes }
                => write!(f, "group directory declares {} entries but only has {} bytes", declared_entries, available_bytes),
            Self::MissingIconData { image_id, lang_id }
                => write!(f, "group references image {} (language {}) which does not exist", image_id, lang_id),
            Self::TruncatedIconData { image_id, declared, available }
                => write!(f, "image {} declares {} bytes but only {} are available", image_id, declared, available),
            Self::OutputTooLarge
                => write!(f, "reassembled file would exceed 4 GiB"),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Pe(e) => Some(e),
            Self::NotAnNeContainer => None,
            Self::MalformedResourceTable { .. } => None,
            Self::TruncatedResource { .. } => None,
            Self::UnsupportedContainer => None,
            Self::TruncatedGroupDirectory { .. } => None,
            Self::MissingIconData { .. } => None,
            Self::TruncatedIconData { .. } => None,
            Self::OutputTooLarge => None,
        }
    }
}
impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self { Self::Io(value) }
}
impl From<crate::pe::Error> for Error {
    fn from(value: crate::pe::Error) -> Self { Self::Pe(value) }
}
