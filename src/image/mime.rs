pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        other => {
            tracing::warn!(
                "Unrecognized image extension '{}', falling back to application/octet-stream",
                other
            );
            "application/octet-stream"
        }
    }
}
