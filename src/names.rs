//! Folder-name normalization shared by the presence index, the gap
//! analyzer, and the diagnostics builder. Every component that predicts
//! where a show lives on disk must agree on these rules exactly.

/// Characters replaced with `_` in on-disk folder names.
const UNSAFE: &[char] = &['/', ':', '*', '?', '"', '>', '<', '|'];

/// Album folder names are cut to this many code points before sanitizing.
pub const ALBUM_FOLDER_MAX_RUNES: usize = 120;

/// Replaces filesystem-hostile characters with `_` and drops a trailing tab.
pub fn sanitize(name: &str) -> String {
    let trimmed = name.trim_end_matches('\t');
    trimmed
        .chars()
        .map(|c| if UNSAFE.contains(&c) { '_' } else { c })
        .collect()
}

/// Folder name for one show: `<artist> - <containerInfo>`, right-trimmed,
/// truncated to [`ALBUM_FOLDER_MAX_RUNES`] code points, then sanitized.
pub fn album_folder_name(artist_name: &str, container_info: &str) -> String {
    let raw = format!("{} - {}", artist_name, container_info.trim_end());
    let cut: String = raw.chars().take(ALBUM_FOLDER_MAX_RUNES).collect();
    sanitize(&cut)
}

/// Key used by the artists index: lowercase, surrounding whitespace removed.
pub fn artist_index_key(artist_name: &str) -> String {
    artist_name.trim().to_lowercase()
}
