//! FFmpeg video filter definitions.

use std::path::Path;

/// Output frame width.
pub const FRAME_WIDTH: u32 = 1080;
/// Output frame height.
pub const FRAME_HEIGHT: u32 = 1920;

/// Scale-and-pad each still to portrait, then apply a slow Ken Burns
/// zoom so static scenes read as motion.
pub fn kenburns_filter(fps: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,\
         crop={w}:{h},\
         zoompan=z='min(zoom+0.0015,1.12)':\
         x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':\
         d=1:s={w}x{h}:fps={fps},\
         format=yuv420p",
        w = FRAME_WIDTH,
        h = FRAME_HEIGHT,
        fps = fps
    )
}

/// Subtitle burn filter for an SRT file.
pub fn subtitles_filter(srt_path: &Path) -> String {
    format!("subtitles='{}'", normalize_subtitle_path(srt_path))
}

/// Normalize a path for the subtitles filter.
///
/// The filter parser wants forward slashes everywhere, and on platforms
/// with drive letters the `:` doubles as a filter-argument separator, so
/// it must be escaped.
pub fn normalize_subtitle_path(path: &Path) -> String {
    let mut normalized = path.to_string_lossy().replace('\\', "/");

    let bytes = normalized.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        normalized = format!("{}\\:{}", &normalized[..1], &normalized[2..]);
    }
    normalized
}

/// Join the Ken Burns chain with an optional subtitle burn.
pub fn render_filter_chain(fps: u32, srt_path: Option<&Path>) -> String {
    match srt_path {
        Some(path) => format!("{},{}", kenburns_filter(fps), subtitles_filter(path)),
        None => kenburns_filter(fps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kenburns_targets_portrait_frame() {
        let filter = kenburns_filter(30);
        assert!(filter.contains("1080x1920"));
        assert!(filter.contains("zoompan"));
        assert!(filter.contains("fps=30"));
    }

    #[test]
    fn test_normalize_plain_unix_path() {
        let path = PathBuf::from("/tmp/work/captions.srt");
        assert_eq!(normalize_subtitle_path(&path), "/tmp/work/captions.srt");
    }

    #[test]
    fn test_normalize_windows_path() {
        let path = PathBuf::from(r"C:\work\captions.srt");
        assert_eq!(normalize_subtitle_path(&path), r"C\:/work/captions.srt");
    }

    #[test]
    fn test_chain_with_and_without_subtitles() {
        let srt = PathBuf::from("/w/captions.srt");
        let with = render_filter_chain(30, Some(&srt));
        assert!(with.contains("subtitles='/w/captions.srt'"));

        let without = render_filter_chain(30, None);
        assert!(!without.contains("subtitles"));
    }
}
