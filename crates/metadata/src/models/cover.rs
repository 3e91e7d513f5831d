/// Cover image embedded in a book file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    /// Media type as declared by the container, e.g. `image/jpeg`.
    pub media_type: String,
    pub data: Vec<u8>,
}
impl Cover {
    pub fn new(media_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// File extension matching the media type, falling back to `img` for
    /// anything unrecognised.
    pub fn extension(&self) -> &'static str {
        match self.media_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            _ => "img",
        }
    }
}
