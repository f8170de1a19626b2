//! Filename utilities.

/// Container extensions stripped before parsing.
const MEDIA_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "m4v", "ts", "m2ts", "flv", "webm", "mpg", "mpeg", "rmvb",
    "ass", "ssa", "srt", "sup",
];

/// Get the extension of a filename in lowercase, if it is a known media container.
pub fn media_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    MEDIA_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Split a filename into its stem and known media extension.
pub fn split_extension(filename: &str) -> (&str, Option<String>) {
    match media_extension(filename) {
        Some(ext) => (&filename[..filename.len() - ext.len() - 1], Some(ext)),
        None => (filename, None),
    }
}

/// Strip any directory components, keeping only the file name.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("movie.MKV"), ("movie", Some("mkv".to_string())));
        assert_eq!(split_extension("Mr. Robot"), ("Mr. Robot", None));
        assert_eq!(split_extension("noext"), ("noext", None));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/media/tv/show.mkv"), "show.mkv");
        assert_eq!(file_name("C:\\tv\\show.mkv"), "show.mkv");
        assert_eq!(file_name("show.mkv"), "show.mkv");
    }
}
