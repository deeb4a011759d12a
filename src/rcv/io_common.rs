use std::path::Path;

/// The file name of a path, or the path itself if it has none.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Removes the blank ranks of a ballot.
pub fn assemble_choices(cells: &[String]) -> Vec<String> {
    cells
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
