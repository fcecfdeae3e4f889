//! Bucket names and object path conventions.
//!
//! Paths are stable and bit-exact: the render engine, the asset
//! orchestrator and external consumers all derive the same keys from a
//! video id.

use reel_models::VideoId;

/// Scene stills.
pub const BUCKET_IMAGES: &str = "renders-images";
/// Narration audio.
pub const BUCKET_AUDIO: &str = "renders-audio";
/// SRT captions.
pub const BUCKET_CAPTIONS: &str = "renders-captions";
/// Final MP4s.
pub const BUCKET_VIDEOS: &str = "renders-videos";

/// Every bucket the pipeline writes, for startup provisioning.
pub const ALL_BUCKETS: [&str; 4] = [BUCKET_IMAGES, BUCKET_AUDIO, BUCKET_CAPTIONS, BUCKET_VIDEOS];

/// `videos/{id}/images/scene-{n}.jpg` with a 1-based scene number.
pub fn scene_image_path(id: &VideoId, scene_index: usize) -> String {
    format!("videos/{}/images/scene-{}.jpg", id, scene_index + 1)
}

/// `videos/{id}/audio.mp3`
pub fn audio_path(id: &VideoId) -> String {
    format!("videos/{}/audio.mp3", id)
}

/// `videos/{id}/captions.srt`
pub fn captions_path(id: &VideoId) -> String {
    format!("videos/{}/captions.srt", id)
}

/// `videos/{id}/final.mp4`
pub fn final_video_path(id: &VideoId) -> String {
    format!("videos/{}/final.mp4", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_conventions_are_bit_exact() {
        let id = VideoId::from_string("abc-123");
        assert_eq!(scene_image_path(&id, 0), "videos/abc-123/images/scene-1.jpg");
        assert_eq!(scene_image_path(&id, 5), "videos/abc-123/images/scene-6.jpg");
        assert_eq!(audio_path(&id), "videos/abc-123/audio.mp3");
        assert_eq!(captions_path(&id), "videos/abc-123/captions.srt");
        assert_eq!(final_video_path(&id), "videos/abc-123/final.mp4");
    }

    #[test]
    fn test_bucket_list_is_complete() {
        assert_eq!(ALL_BUCKETS.len(), 4);
        assert!(ALL_BUCKETS.contains(&BUCKET_IMAGES));
        assert!(ALL_BUCKETS.contains(&BUCKET_VIDEOS));
    }
}
