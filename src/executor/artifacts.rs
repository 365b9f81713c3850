use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// Classified kind of a produced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Audio,
    File,
}

/// A file the sandboxed code wrote under the workspace output directory.
///
/// The bytes are read out while the workspace still exists; the backing
/// path does not survive the invocation.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub mime_type: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One entry in the content-sniffing table. Matching is on leading bytes,
/// never on the file extension.
struct Signature {
    kind: ArtifactKind,
    mime: &'static str,
    matches: fn(&[u8]) -> bool,
}

/// Ordered from most to least specific; the loose MP3 frame-sync check
/// goes last.
const SIGNATURES: &[Signature] = &[
    Signature {
        kind: ArtifactKind::Image,
        mime: "image/png",
        matches: is_png,
    },
    Signature {
        kind: ArtifactKind::Image,
        mime: "image/jpeg",
        matches: is_jpeg,
    },
    Signature {
        kind: ArtifactKind::Image,
        mime: "image/gif",
        matches: is_gif,
    },
    Signature {
        kind: ArtifactKind::Image,
        mime: "image/webp",
        matches: is_webp,
    },
    Signature {
        kind: ArtifactKind::Image,
        mime: "image/tiff",
        matches: is_tiff,
    },
    Signature {
        kind: ArtifactKind::Image,
        mime: "image/bmp",
        matches: is_bmp,
    },
    Signature {
        kind: ArtifactKind::Audio,
        mime: "audio/x-wav",
        matches: is_wav,
    },
    Signature {
        kind: ArtifactKind::Audio,
        mime: "audio/ogg",
        matches: is_ogg,
    },
    Signature {
        kind: ArtifactKind::Audio,
        mime: "audio/x-flac",
        matches: is_flac,
    },
    Signature {
        kind: ArtifactKind::Audio,
        mime: "audio/midi",
        matches: is_midi,
    },
    Signature {
        kind: ArtifactKind::Audio,
        mime: "audio/mpeg",
        matches: is_mp3,
    },
];

fn is_png(b: &[u8]) -> bool {
    b.starts_with(b"\x89PNG\r\n\x1a\n")
}

fn is_jpeg(b: &[u8]) -> bool {
    b.starts_with(&[0xFF, 0xD8, 0xFF])
}

fn is_gif(b: &[u8]) -> bool {
    b.starts_with(b"GIF87a") || b.starts_with(b"GIF89a")
}

fn is_webp(b: &[u8]) -> bool {
    b.len() >= 12 && &b[0..4] == b"RIFF" && &b[8..12] == b"WEBP"
}

fn is_tiff(b: &[u8]) -> bool {
    b.starts_with(b"II*\0") || b.starts_with(b"MM\0*")
}

fn is_bmp(b: &[u8]) -> bool {
    b.starts_with(b"BM")
}

fn is_wav(b: &[u8]) -> bool {
    b.len() >= 12 && &b[0..4] == b"RIFF" && &b[8..12] == b"WAVE"
}

fn is_ogg(b: &[u8]) -> bool {
    b.starts_with(b"OggS")
}

fn is_flac(b: &[u8]) -> bool {
    b.starts_with(b"fLaC")
}

fn is_midi(b: &[u8]) -> bool {
    b.starts_with(b"MThd")
}

fn is_mp3(b: &[u8]) -> bool {
    // ID3 tag, or a bare MPEG audio frame sync (11 set bits)
    b.starts_with(b"ID3") || (b.len() >= 2 && b[0] == 0xFF && b[1] & 0xE0 == 0xE0)
}

/// Sniff the content type of a produced file.
///
/// Unrecognized content is not an error; it degrades to a generic file,
/// labelled `text/plain` when the bytes are valid UTF-8 and
/// `application/octet-stream` otherwise.
pub fn classify_bytes(bytes: &[u8]) -> (ArtifactKind, &'static str) {
    for signature in SIGNATURES {
        if (signature.matches)(bytes) {
            return (signature.kind, signature.mime);
        }
    }

    if std::str::from_utf8(bytes).is_ok() {
        (ArtifactKind::File, "text/plain")
    } else {
        (ArtifactKind::File, "application/octet-stream")
    }
}

/// Read and classify every file directly under `output_dir`.
///
/// Only direct children are inspected. The sandbox policy confines writes to
/// the output directory, so files elsewhere are the sandbox's problem to
/// deny, not ours to surface. Entries are ordered by name so repeated calls
/// see a stable sequence.
pub fn collect_artifacts(output_dir: &Path) -> Result<Vec<Artifact>> {
    let mut paths: Vec<_> = std::fs::read_dir(output_dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    paths.sort();

    let mut artifacts = Vec::new();
    for path in paths {
        if !path.is_file() {
            continue;
        }

        let bytes = std::fs::read(&path)?;
        let (kind, mime) = classify_bytes(&bytes);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(file = %file_name, kind = ?kind, mime = %mime, size = bytes.len(), "Classified output file");

        artifacts.push(Artifact {
            kind,
            mime_type: mime.to_string(),
            file_name,
            bytes,
        });
    }

    Ok(artifacts)
}
