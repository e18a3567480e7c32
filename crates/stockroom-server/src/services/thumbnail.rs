//! Upload naming and on-demand thumbnails.
//!
//! Originals live directly under the upload directory. Resized copies are
//! written once to `<upload_dir>/cache/{name}_w{w}_h{h}{ext}` and served from
//! there on later requests.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use rand::Rng;

use crate::error::{AppError, AppResult};

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

const CACHE_DIR: &str = "cache";
const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAME_SUFFIX_LEN: usize = 8;

/// Target box for a thumbnail. A zero side follows the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbSize {
    pub width: u32,
    pub height: u32,
}

/// Lower-cased extension of an uploaded file name, with its leading dot,
/// if it is one we accept.
pub fn upload_extension(original_name: &str) -> AppResult<String> {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(|| AppError::BadRequest("Only jpg, jpeg, png and gif files are accepted".into()))?;
    Ok(format!(".{ext}"))
}

pub fn upload_filename(ext: &str) -> String {
    format!("{}_{}{ext}", chrono::Utc::now().timestamp(), random_suffix())
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..NAME_SUFFIX_LEN)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect()
}

/// Accepts a bare file name only; anything that could leave the upload
/// directory is refused.
pub fn safe_filename(name: &str) -> Option<&str> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.contains('\0');
    (!bad).then_some(name)
}

/// `None` means the original was asked for. Unparseable or negative sides
/// count as 0, and a request where both sides end up 0 also gets the original.
/// A side above `max_side` is rejected.
pub fn requested_size(w: Option<&str>, h: Option<&str>, max_side: u32) -> AppResult<Option<ThumbSize>> {
    fn side(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|s| !s.is_empty())
    }
    fn parse(v: Option<&str>) -> u32 {
        v.and_then(|s| s.parse::<u32>().ok()).unwrap_or(0)
    }

    let (w, h) = (side(w), side(h));
    if w.is_none() && h.is_none() {
        return Ok(None);
    }
    let size = ThumbSize {
        width: parse(w),
        height: parse(h),
    };
    check_bounds(size.width, size.height, max_side)?;
    Ok((size.width > 0 || size.height > 0).then_some(size))
}

fn check_bounds(width: u32, height: u32, max_side: u32) -> AppResult<()> {
    if width > max_side || height > max_side {
        return Err(AppError::BadRequest(format!(
            "Thumbnail sides may not exceed {max_side} pixels"
        )));
    }
    Ok(())
}

pub fn cache_path(upload_dir: &Path, filename: &str, size: ThumbSize) -> PathBuf {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    upload_dir
        .join(CACHE_DIR)
        .join(format!("{filename}_w{}_h{}{ext}", size.width, size.height))
}

pub fn content_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

fn target_dimensions(src_w: u32, src_h: u32, size: ThumbSize) -> (u32, u32) {
    let scale = |num: u32, other: u32, den: u32| -> u32 {
        if den == 0 {
            return 1;
        }
        ((num as f64 * other as f64 / den as f64).round() as u32).max(1)
    };
    match (size.width, size.height) {
        (0, h) => (scale(src_w, h, src_h), h),
        (w, 0) => (w, scale(src_h, w, src_w)),
        (w, h) => (w, h),
    }
}

/// Decodes `src`, resizes it and writes the result to `dst`. Blocking.
///
/// The image is encoded into a temporary sibling of `dst` and renamed into
/// place, so `dst` only ever exists complete.
pub fn render(src: &Path, dst: &Path, size: ThumbSize, max_side: u32) -> AppResult<()> {
    let img = image::open(src)?;
    let (w, h) = target_dimensions(img.width(), img.height(), size);
    check_bounds(w, h, max_side)?;

    let thumb = img.resize_exact(w, h, FilterType::Lanczos3);
    let thumb = match content_type(&dst.to_string_lossy()) {
        "image/jpeg" => DynamicImage::ImageRgb8(thumb.to_rgb8()),
        _ => thumb,
    };
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let format = ImageFormat::from_path(dst)?;
    let mut tmp = dst.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", random_suffix()));
    let tmp = PathBuf::from(tmp);

    let written = thumb
        .save_with_format(&tmp, format)
        .map_err(AppError::from)
        .and_then(|()| std::fs::rename(&tmp, dst).map_err(AppError::from));
    if written.is_err() {
        std::fs::remove_file(&tmp).ok();
    }
    written
}

/// Path of the bytes to serve for `filename` at `size`, rendering and
/// caching the thumbnail on first request.
pub async fn resolve(
    upload_dir: &Path,
    filename: &str,
    size: Option<ThumbSize>,
    max_side: u32,
) -> AppResult<PathBuf> {
    let filename = safe_filename(filename).ok_or_else(|| AppError::NotFound("File not found".into()))?;
    let src = upload_dir.join(filename);
    if !tokio::fs::try_exists(&src).await? {
        return Err(AppError::NotFound("File not found".into()));
    }

    let Some(size) = size else {
        return Ok(src);
    };
    let cached = cache_path(upload_dir, filename, size);
    if tokio::fs::try_exists(&cached).await? {
        return Ok(cached);
    }

    let dst = cached.clone();
    tokio::task::spawn_blocking(move || render(&src, &dst, size, max_side))
        .await
        .map_err(|e| AppError::Internal(format!("Thumbnail task failed: {e}")))??;
    tracing::debug!(filename, width = size.width, height = size.height, "Rendered thumbnail");
    Ok(cached)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u32 = 2000;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stockroom-thumb-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        assert_eq!(upload_extension("Photo.JPG").unwrap(), ".jpg");
        assert_eq!(upload_extension("a.b.png").unwrap(), ".png");
        assert!(upload_extension("notes.txt").is_err());
        assert!(upload_extension("noext").is_err());
    }

    #[test]
    fn generated_names_have_timestamp_and_suffix() {
        let name = upload_filename(".gif");
        let (ts, rest) = name.split_once('_').unwrap();
        assert!(ts.parse::<i64>().is_ok());
        assert_eq!(rest.len(), NAME_SUFFIX_LEN + ".gif".len());
        assert!(rest.ends_with(".gif"));
    }

    #[test]
    fn traversal_names_are_refused() {
        for bad in ["", "../etc/passwd", "a/b.png", "a\\b.png", "..png"] {
            assert!(safe_filename(bad).is_none(), "{bad}");
        }
        assert_eq!(safe_filename("1700000000_abc.png"), Some("1700000000_abc.png"));
    }

    #[test]
    fn size_parsing() {
        assert_eq!(requested_size(None, None, MAX).unwrap(), None);
        assert_eq!(requested_size(Some(""), Some(" "), MAX).unwrap(), None);
        assert_eq!(requested_size(Some("x"), Some("-3"), MAX).unwrap(), None);
        assert_eq!(
            requested_size(Some("100"), None, MAX).unwrap(),
            Some(ThumbSize { width: 100, height: 0 })
        );
        assert_eq!(
            requested_size(Some("2000"), Some("2000"), MAX).unwrap(),
            Some(ThumbSize { width: 2000, height: 2000 })
        );
    }

    #[test]
    fn oversized_sides_are_rejected() {
        for (w, h) in [(Some("100000"), Some("100000")), (Some("2001"), None), (None, Some("4294967295"))] {
            assert!(
                matches!(requested_size(w, h, MAX), Err(AppError::BadRequest(_))),
                "{w:?}x{h:?}"
            );
        }
    }

    #[test]
    fn cache_name_carries_dimensions() {
        let p = cache_path(Path::new("/up"), "a.png", ThumbSize { width: 50, height: 0 });
        assert_eq!(p, Path::new("/up/cache/a.png_w50_h0.png"));
    }

    #[test]
    fn missing_side_keeps_aspect_ratio() {
        assert_eq!(target_dimensions(400, 200, ThumbSize { width: 100, height: 0 }), (100, 50));
        assert_eq!(target_dimensions(400, 200, ThumbSize { width: 0, height: 50 }), (100, 50));
        assert_eq!(target_dimensions(400, 200, ThumbSize { width: 30, height: 30 }), (30, 30));
    }

    #[tokio::test]
    async fn resolve_renders_once_then_serves_cache() {
        let dir = scratch_dir();
        image::RgbImage::new(40, 20).save(dir.join("pic.png")).unwrap();

        let size = requested_size(Some("10"), None, MAX).unwrap();
        let path = resolve(&dir, "pic.png", size, MAX).await.unwrap();
        assert_eq!(path, dir.join("cache").join("pic.png_w10_h0.png"));
        let thumb = image::open(&path).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (10, 5));

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        let again = resolve(&dir, "pic.png", size, MAX).await.unwrap();
        assert_eq!(std::fs::metadata(&again).unwrap().modified().unwrap(), modified);

        assert_eq!(resolve(&dir, "pic.png", None, MAX).await.unwrap(), dir.join("pic.png"));
        assert!(matches!(
            resolve(&dir, "missing.png", size, MAX).await,
            Err(AppError::NotFound(_))
        ));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn jpeg_thumbnails_are_written() {
        let dir = scratch_dir();
        image::RgbImage::new(16, 16).save(dir.join("pic.jpg")).unwrap();
        let path = resolve(&dir, "pic.jpg", requested_size(Some("8"), Some("8"), MAX).unwrap(), MAX)
            .await
            .unwrap();
        assert_eq!(content_type(&path.to_string_lossy()), "image/jpeg");
        assert_eq!(image::open(&path).unwrap().width(), 8);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn render_leaves_only_the_finished_file() {
        let dir = scratch_dir();
        image::RgbImage::new(30, 30).save(dir.join("pic.png")).unwrap();
        let size = ThumbSize { width: 12, height: 0 };
        let dst = cache_path(&dir, "pic.png", size);

        render(&dir.join("pic.png"), &dst, size, MAX).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.join(CACHE_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["pic.png_w12_h0.png".to_string()]);
        assert_eq!(image::open(&dst).unwrap().width(), 12);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn failed_render_caches_nothing() {
        let dir = scratch_dir();
        std::fs::write(dir.join("broken.png"), b"not a png").unwrap();
        let size = requested_size(Some("10"), None, MAX).unwrap();

        assert!(resolve(&dir, "broken.png", size, MAX).await.is_err());
        assert!(!cache_path(&dir, "broken.png", size.unwrap()).exists());
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn derived_side_is_bounded_too() {
        let dir = scratch_dir();
        image::RgbImage::new(1, 100).save(dir.join("tall.png")).unwrap();
        let size = requested_size(Some("100"), None, MAX).unwrap();

        // 100 wide keeps the 1:100 ratio, so the height would be 10000.
        assert!(matches!(
            resolve(&dir, "tall.png", size, MAX).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(!cache_path(&dir, "tall.png", size.unwrap()).exists());
        std::fs::remove_dir_all(dir).ok();
    }
}
