/// Object identity derived from a request URI such as `/photos/cat.heic`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageKey {
    /// Everything before the final `.`, leading `/` removed (`photos/cat`)
    pub name: String,
    /// Suffix after the final `.` of the last path segment (`heic`)
    pub extension: String,
}

impl ImageKey {
    /// Split a URI into name and extension.
    /// Returns `None` when the last path segment carries no extension.
    pub fn parse(uri: &str) -> Option<Self> {
        let path = uri.trim_start_matches('/');
        let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
        let dot = path[segment_start..].rfind('.')? + segment_start;

        let name = &path[..dot];
        if name.is_empty() || name.ends_with('/') {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            extension: path[dot + 1..].to_string(),
        })
    }

    /// S3 key of the original object
    pub fn storage_key(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::for_extension(&self.extension)
    }
}

/// Re-encoding target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    WebP,
}

impl OutputFormat {
    /// WebP input stays WebP; everything else (heic included) becomes JPEG
    pub fn for_extension(extension: &str) -> Self {
        if extension == "webp" {
            Self::WebP
        } else {
            Self::Jpeg
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }
}
