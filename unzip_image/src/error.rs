use std::io;

/// An error while unpacking an archive block.
#[derive(Debug)]
pub enum UnpackError {
    /// IO error while reading an entry.
    Io(io::Error),
    /// The block is not a readable zip archive.
    Zip(zip::result::ZipError),
    /// An entry did not decode as an image (2D mode).
    Image(image::ImageError),
    /// The requested range reaches past the archive's last entry.
    MissingEntry { index: usize, len: usize },
}

impl std::error::Error for UnpackError {}

impl std::fmt::Display for UnpackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnpackError::Io(e) => write!(f, "IO error: {}", e),
            UnpackError::Zip(e) => write!(f, "unreadable archive: {}", e),
            UnpackError::Image(e) => write!(f, "entry did not decode as an image: {}", e),
            UnpackError::MissingEntry { index, len } => {
                write!(
                    f,
                    "entry {} requested from an archive with {} entries",
                    index, len
                )
            }
        }
    }
}

impl From<io::Error> for UnpackError {
    fn from(e: io::Error) -> Self {
        UnpackError::Io(e)
    }
}

impl From<zip::result::ZipError> for UnpackError {
    fn from(e: zip::result::ZipError) -> Self {
        UnpackError::Zip(e)
    }
}

impl From<image::ImageError> for UnpackError {
    fn from(e: image::ImageError) -> Self {
        UnpackError::Image(e)
    }
}
