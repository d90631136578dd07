/// An error while constructing the OpenH264 decoder.
#[derive(Debug)]
pub enum OpenError {
    /// The native decoder could not be initialized.
    Decoder(openh264::Error),
}

impl std::error::Error for OpenError {}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::Decoder(e) => write!(f, "failed to initialize OpenH264: {}", e),
        }
    }
}

impl From<openh264::Error> for OpenError {
    fn from(e: openh264::Error) -> Self {
        OpenError::Decoder(e)
    }
}
