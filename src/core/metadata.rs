//! GPS and Photo Sphere metadata extraction.
//!
//! Extraction is best-effort enrichment: every failure is logged and turns
//! into "no metadata" for that image, never into an error for the caller.

use crate::domain::model::{Exif, GPano, PhotoMeta, PhotoMetaMap};
use crate::utils::error::Result;
use exif::{In, Tag, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOS: u8 = 0xDA;
const MARKER_APP1: u8 = 0xE1;

pub const PHOTO_META_LEDGER: &str = "photo-meta.json";

#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    gpano_element: Regex,
    gpano_attribute: Regex,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self {
            gpano_element: Regex::new(r"(?i)<GPano:(\w+)\s*>([^<]*)</GPano:\w+\s*>")
                .expect("static GPano element pattern"),
            gpano_attribute: Regex::new(r#"(?i)\bGPano:(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
                .expect("static GPano attribute pattern"),
        }
    }

    /// [`extract`](Self::extract) on the blocking pool; panoramas are read whole.
    pub async fn extract_blocking(&self, path: &Path) -> Option<PhotoMeta> {
        let extractor = self.clone();
        let source = path.to_path_buf();
        match tokio::task::spawn_blocking(move || extractor.extract(&source)).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::error!("Metadata task for {} aborted: {}", path.display(), e);
                None
            }
        }
    }

    /// Reads GPS and GPano metadata from `path`. `None` when the file cannot be
    /// read or carries neither block.
    pub fn extract(&self, path: &Path) -> Option<PhotoMeta> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to read meta data from image {}: {}", path.display(), e);
                return None;
            }
        };

        let meta = PhotoMeta {
            exif: self.extract_exif(path, &data),
            gpano: self.extract_gpano(path, &data),
        };

        if meta.is_empty() {
            tracing::debug!("No GPS or GPano metadata in {}", path.display());
            None
        } else {
            Some(meta)
        }
    }

    fn extract_exif(&self, path: &Path, data: &[u8]) -> Option<Exif> {
        let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::debug!("No EXIF block in {}: {}", path.display(), e);
                return None;
            }
        };

        let longitude = gps_degrees(
            exif.get_field(Tag::GPSLongitude, In::PRIMARY)?,
            exif.get_field(Tag::GPSLongitudeRef, In::PRIMARY),
        )?;
        let latitude = gps_degrees(
            exif.get_field(Tag::GPSLatitude, In::PRIMARY)?,
            exif.get_field(Tag::GPSLatitudeRef, In::PRIMARY),
        )?;

        Some(Exif {
            longitude,
            latitude,
        })
    }

    fn extract_gpano(&self, path: &Path, data: &[u8]) -> Option<GPano> {
        let xmp = find_xmp(data)?;
        if xmp.trim().is_empty() {
            return None;
        }

        match self.parse_gpano(&xmp) {
            Ok(gpano) if !gpano.is_empty() => Some(gpano),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to parse GPano metadata from {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Collects every `GPano:*` property, strips the namespace prefix and wraps
    /// the fragments in a synthetic `<GPano>` root before deserializing.
    pub fn parse_gpano(&self, xmp: &str) -> std::result::Result<GPano, quick_xml::de::DeError> {
        let mut properties: Vec<(usize, &str, &str)> = Vec::new();
        for caps in self.gpano_element.captures_iter(xmp) {
            if let (Some(whole), Some(name), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) {
                properties.push((whole.start(), name.as_str(), value.as_str()));
            }
        }
        for caps in self.gpano_attribute.captures_iter(xmp) {
            let value = caps.get(2).or_else(|| caps.get(3));
            if let (Some(whole), Some(name), Some(value)) = (caps.get(0), caps.get(1), value) {
                properties.push((whole.start(), name.as_str(), value.as_str()));
            }
        }

        // a property repeated across forms or rdf:Description blocks keeps its last value
        properties.sort_by_key(|(position, _, _)| *position);
        let mut latest: BTreeMap<&str, &str> = BTreeMap::new();
        for (_, name, value) in properties {
            latest.insert(name, value);
        }

        let mut fragments = String::new();
        for (name, value) in latest {
            push_element(&mut fragments, name, value);
        }
        quick_xml::de::from_str(&format!("<GPano>{}</GPano>", fragments))
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn push_element(fragments: &mut String, name: &str, value: &str) {
    fragments.push('<');
    fragments.push_str(name);
    fragments.push('>');
    fragments.push_str(value.trim());
    fragments.push_str("</");
    fragments.push_str(name);
    fragments.push('>');
}

/// Degrees/minutes/seconds rationals to signed decimal degrees; `S` and `W` are negative.
pub fn gps_degrees(coordinate: &exif::Field, reference: Option<&exif::Field>) -> Option<f64> {
    let Value::Rational(ref parts) = coordinate.value else {
        return None;
    };

    let mut decimal = 0.0;
    for (part, divisor) in parts.iter().zip([1.0, 60.0, 3600.0]) {
        let value = part.to_f64();
        if !value.is_finite() {
            return None;
        }
        decimal += value / divisor;
    }

    let negative = reference
        .and_then(|field| match &field.value {
            Value::Ascii(values) => values.first().and_then(|v| v.first()).copied(),
            _ => None,
        })
        .is_some_and(|c| matches!(c.to_ascii_uppercase(), b'S' | b'W'));

    Some(if negative { -decimal } else { decimal })
}

/// Returns the XMP packet of a JPEG (first APP1 segment with the XMP namespace header).
pub fn find_xmp(data: &[u8]) -> Option<String> {
    if data.get(0..2)? != [0xFF, MARKER_SOI].as_slice() {
        return None;
    }

    let mut pos = 2;
    loop {
        if *data.get(pos)? != 0xFF {
            return None;
        }
        // fill bytes
        while *data.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        let marker = *data.get(pos + 1)?;
        match marker {
            MARKER_EOI | MARKER_SOS => return None,
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        let length = u16::from_be_bytes([*data.get(pos + 2)?, *data.get(pos + 3)?]) as usize;
        if length < 2 {
            return None;
        }
        let segment = data.get(pos + 4..pos + 2 + length)?;
        if marker == MARKER_APP1 && segment.starts_with(XMP_HEADER) {
            return Some(String::from_utf8_lossy(&segment[XMP_HEADER.len()..]).into_owned());
        }
        pos += 2 + length;
    }
}

/// Loads the photo-meta ledger a previous conversion left in the tour directory.
pub fn read_ledger(path: &Path) -> Result<PhotoMetaMap> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PhotoMetaMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Merges `entries` into the ledger at `path`; newer entries win.
pub fn merge_into_ledger(path: &Path, entries: &PhotoMetaMap) -> Result<()> {
    let mut ledger = read_ledger(path)?;
    ledger.extend(entries.iter().map(|(id, meta)| (id.clone(), meta.clone())));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(&ledger)?)?;
    Ok(())
}
