use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::png::{PngDecoder, PngEncoder};
use image::io::Limits;
use image::{DynamicImage, ImageDecoder, ImageEncoder, RgbaImage};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasState, DEFAULT_DIM, MAX_DIM, clamp_dimension, resample_nearest};
use crate::components::colors::DEFAULT_COLOR_HEX;
use crate::error::{EditorError, Result};

/// Key the editor session is stored under.
pub const SESSION_KEY: &str = "pastel_pixel_editor_stable_v1";

/// Default file name for exported artwork.
pub const EXPORT_FILE_NAME: &str = "pastel_pixel.png";

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

// ============================================================================
// SESSION RECORD
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PanRecord {
    pub x: f32,
    pub y: f32,
}

/// Serialized editor session. Field aliases accept records written with the
/// short names (`w`, `h`, `img`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(alias = "w", default = "default_dim")]
    pub width: u32,
    #[serde(alias = "h", default = "default_dim")]
    pub height: u32,
    /// PNG image as a `data:image/png;base64,` URL.
    #[serde(alias = "img")]
    pub image: String,
    #[serde(default = "default_zoom")]
    pub zoom: f32,
    #[serde(default)]
    pub pan: PanRecord,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_brush")]
    pub brush: u32,
}

fn default_dim() -> u32 {
    DEFAULT_DIM
}

fn default_zoom() -> f32 {
    1.0
}

fn default_color() -> String {
    DEFAULT_COLOR_HEX.to_string()
}

fn default_brush() -> u32 {
    1
}

impl SessionRecord {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| EditorError::RestoreFailed(e.to_string()))
    }

    /// Decode the stored image and fit it to the recorded grid size.
    ///
    /// Records may hold the image at a display multiple of the grid (several
    /// pixels per cell); any size is resampled nearest-neighbor to
    /// `width`×`height` after those are clamped to the grid limits.
    pub fn decode_canvas(&self) -> Result<CanvasState> {
        let width = clamp_dimension(self.width as i64);
        let height = clamp_dimension(self.height as i64);
        let img = decode_data_url(&self.image)
            .map_err(|e| EditorError::RestoreFailed(format!("image: {}", e)))?;
        CanvasState::from_image(resample_nearest(&img, width, height))
    }
}

// ============================================================================
// PNG / DATA URL
// ============================================================================

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(out)
}

/// Largest image side accepted when decoding (a full grid at 32 pixels per cell).
pub const MAX_DECODE_DIM: u32 = MAX_DIM * 32;
const MAX_DECODE_BYTES: u64 = MAX_DECODE_DIM as u64 * MAX_DECODE_DIM as u64 * 4;

/// Decode a PNG, refusing headers larger than [`MAX_DECODE_DIM`] per side
/// before any pixel buffer is allocated.
pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIM);
    limits.max_image_height = Some(MAX_DECODE_DIM);
    limits.max_alloc = Some(MAX_DECODE_BYTES);

    let decoder = PngDecoder::with_limits(Cursor::new(bytes), limits)?;
    let (w, h) = decoder.dimensions();
    if w > MAX_DECODE_DIM || h > MAX_DECODE_DIM || decoder.total_bytes() > MAX_DECODE_BYTES {
        return Err(EditorError::RestoreFailed(format!(
            "image {}×{} exceeds {}×{}",
            w, h, MAX_DECODE_DIM, MAX_DECODE_DIM
        )));
    }
    let img = DynamicImage::from_decoder(decoder)?;
    Ok(img.into_rgba8())
}

pub fn encode_data_url(img: &RgbaImage) -> Result<String> {
    let png = encode_png(img)?;
    Ok(format!("{}{}", DATA_URL_PREFIX, BASE64.encode(png)))
}

pub fn decode_data_url(url: &str) -> Result<RgbaImage> {
    let payload = url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| EditorError::RestoreFailed("not a PNG data URL".into()))?;
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| EditorError::RestoreFailed(format!("base64: {}", e)))?;
    decode_png(&bytes)
}

/// Write `img` as a PNG file.
pub fn write_png(img: &RgbaImage, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    PngEncoder::new(writer).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(())
}

// ============================================================================
// KEY-VALUE STORES
// ============================================================================

/// Durable key-value storage for the session record.
pub trait SessionStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl SessionStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let fail = |e: std::io::Error| EditorError::PersistenceWriteFailed(e.to_string());
        fs::create_dir_all(&self.dir).map_err(fail)?;
        // Write beside the target then rename, so a crash never leaves half a record.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(fail)?;
        fs::rename(&tmp, &path).map_err(fail)?;
        Ok(())
    }
}

/// In-memory store with an optional byte quota (writes that would exceed it
/// fail like a full browser storage would).
#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SessionStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota {
            let others: usize = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(EditorError::PersistenceWriteFailed(format!(
                    "quota of {} bytes exceeded",
                    quota
                )));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

// ============================================================================
// SAVE SCHEDULER: coalesce bursts of saves into one write per frame
// ============================================================================

/// Pending-save flag with last-write-wins coalescing.
///
/// `schedule` marks a save as due; scheduling again before the next frame
/// supersedes the earlier request. `take_due` is called once per frame.
#[derive(Debug, Default)]
pub struct SaveScheduler {
    pending: bool,
    superseded: u64,
}

impl SaveScheduler {
    pub fn schedule(&mut self) {
        if self.pending {
            self.superseded += 1;
        }
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending flag. True when a write should happen now.
    pub fn take_due(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    /// Requests replaced by a later one before they were written.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}

// ============================================================================
// PLATFORM DIRECTORIES
// ============================================================================

/// Platform data directory (without the app sub-folder).
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// Default directory for the session store.
///
/// `%APPDATA%\PastelPix\storage\`                        (Windows)
/// `~/.local/share/PastelPix/storage/`                   (Linux)
/// `~/Library/Application Support/PastelPix/storage/`    (macOS)
pub fn storage_dir() -> PathBuf {
    data_dir().join("PastelPix").join("storage")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample_record() -> SessionRecord {
        let mut canvas = CanvasState::new(8, 6).unwrap();
        canvas.paint_cell(2, 3, Rgba([9, 8, 7, 255]));
        SessionRecord {
            width: 8,
            height: 6,
            image: encode_data_url(canvas.pixels()).unwrap(),
            zoom: 2.5,
            pan: PanRecord { x: 12.0, y: -4.0 },
            color: "#00ff00".into(),
            brush: 3,
        }
    }

    #[test]
    fn record_survives_json() {
        let rec = sample_record();
        let json = rec.to_json().unwrap();
        assert!(json.contains("\"width\":8"));
        let back = SessionRecord::from_json(&json).unwrap();
        assert_eq!(back, rec);
        let canvas = back.decode_canvas().unwrap();
        assert_eq!(canvas.get(2, 3), Some(Rgba([9, 8, 7, 255])));
    }

    #[test]
    fn short_field_names_and_defaults() {
        let img = encode_data_url(&RgbaImage::new(4, 4)).unwrap();
        let json = format!(r#"{{"w":4,"h":4,"img":"{}"}}"#, img);
        let rec = SessionRecord::from_json(&json).unwrap();
        assert_eq!((rec.width, rec.height), (4, 4));
        assert_eq!(rec.zoom, 1.0);
        assert_eq!(rec.pan, PanRecord::default());
        assert_eq!(rec.color, DEFAULT_COLOR_HEX);
        assert_eq!(rec.brush, 1);
    }

    #[test]
    fn display_multiple_image_is_resampled() {
        // 4x4 grid stored at 20 px per cell
        let mut big = RgbaImage::new(80, 80);
        for y in 20..40 {
            for x in 60..80 {
                big.put_pixel(x, y, Rgba([1, 2, 3, 255]));
            }
        }
        let rec = SessionRecord {
            width: 4,
            height: 4,
            image: encode_data_url(&big).unwrap(),
            zoom: 1.0,
            pan: PanRecord::default(),
            color: default_color(),
            brush: 1,
        };
        let canvas = rec.decode_canvas().unwrap();
        assert_eq!(canvas.get(3, 1), Some(Rgba([1, 2, 3, 255])));
        assert_eq!(canvas.get(2, 1), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn corrupt_records_fail_as_restore_errors() {
        assert!(matches!(
            SessionRecord::from_json("{not json"),
            Err(EditorError::RestoreFailed(_))
        ));
        let mut rec = sample_record();
        rec.image = "data:image/png;base64,!!!!".into();
        assert!(matches!(rec.decode_canvas(), Err(EditorError::RestoreFailed(_))));
        rec.image = "https://example.com/a.png".into();
        assert!(matches!(rec.decode_canvas(), Err(EditorError::RestoreFailed(_))));
    }

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &b in bytes {
            crc ^= b as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        let start = out.len();
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        let crc = crc32(&out[start..]);
        out.extend_from_slice(&crc.to_be_bytes());
    }

    /// A tiny PNG whose header claims `w`×`h` RGBA pixels.
    fn png_claiming(w: u32, h: u32) -> Vec<u8> {
        let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&w.to_be_bytes());
        ihdr.extend_from_slice(&h.to_be_bytes());
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
        chunk(&mut out, b"IHDR", &ihdr);
        // empty zlib stream
        chunk(&mut out, b"IDAT", &[0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
        chunk(&mut out, b"IEND", &[]);
        out
    }

    #[test]
    fn oversized_png_header_is_rejected_without_allocating() {
        let url = format!("{}{}", DATA_URL_PREFIX, BASE64.encode(png_claiming(60_000, 60_000)));
        assert!(decode_data_url(&url).is_err());

        let rec = SessionRecord {
            image: url,
            ..sample_record()
        };
        assert!(matches!(rec.decode_canvas(), Err(EditorError::RestoreFailed(_))));

        let mut store = MemoryStore::new();
        store.insert(SESSION_KEY, rec.to_json().unwrap());
        let editor = crate::project::Editor::restore(
            Box::new(store),
            &crate::settings::EditorSettings::default(),
        );
        assert_eq!((editor.canvas().width(), editor.canvas().height()), (32, 32));
        assert!(editor.canvas().is_blank());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested"));
        assert_eq!(store.read(SESSION_KEY).unwrap(), None);
        store.write(SESSION_KEY, "{}").unwrap();
        assert_eq!(store.read(SESSION_KEY).unwrap().as_deref(), Some("{}"));
        assert!(store.path_for("a/b").ends_with("a_b.json"));
    }

    #[test]
    fn memory_store_quota() {
        let mut store = MemoryStore::with_quota(10);
        assert!(store.write("k", "12345").is_ok());
        assert!(matches!(
            store.write("k", "1234567890"),
            Err(EditorError::PersistenceWriteFailed(_))
        ));
        assert_eq!(store.get("k"), Some("12345"));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn scheduler_coalesces() {
        let mut s = SaveScheduler::default();
        assert!(!s.take_due());
        s.schedule();
        s.schedule();
        s.schedule();
        assert_eq!(s.superseded(), 2);
        assert!(s.take_due());
        assert!(!s.take_due());
    }

    #[test]
    fn png_file_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXPORT_FILE_NAME);
        let mut img = RgbaImage::new(5, 3);
        img.put_pixel(4, 2, Rgba([255, 0, 0, 255]));
        write_png(&img, &path).unwrap();
        let back = decode_png(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, img);
    }
}
