//! Writing projected series to disk with a digest manifest.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::fortune::FortunePoint;
use crate::logging::{log_export, ts_now};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesManifest {
    pub path: String,
    pub sha256: String,
    pub points: usize,
    pub first_year: i32,
    pub last_year: i32,
    pub generated_at: String,
}

/// SHA-256 of the compact JSON encoding of a series.
pub fn series_digest(points: &[FortunePoint]) -> String {
    let bytes = serde_json::to_vec(points).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `fortune_<birth_year>.json` inside `dir`.
pub fn series_path(dir: &Path, birth_year: i32) -> PathBuf {
    dir.join(format!("fortune_{}.json", birth_year))
}

pub fn manifest_path(series: &Path) -> PathBuf {
    series.with_extension("manifest.json")
}

/// Write the series as pretty JSON and a manifest next to it.
pub fn write_series(dir: &Path, birth_year: i32, points: &[FortunePoint]) -> Result<SeriesManifest> {
    let (first, last) = match (points.first(), points.last()) {
        (Some(f), Some(l)) => (f.year, l.year),
        _ => return Err(anyhow!("refusing to export an empty series")),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = series_path(dir, birth_year);
    fs::write(&path, serde_json::to_string_pretty(points)?)
        .with_context(|| format!("writing {}", path.display()))?;

    let manifest = SeriesManifest {
        path: path.to_string_lossy().into_owned(),
        sha256: file_sha256(&path)?,
        points: points.len(),
        first_year: first,
        last_year: last,
        generated_at: ts_now(),
    };
    let mpath = manifest_path(&path);
    fs::write(&mpath, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("writing {}", mpath.display()))?;

    log_export(&manifest.path, &manifest.sha256, manifest.points);
    Ok(manifest)
}

/// Re-hash an exported series and compare with its manifest.
pub fn verify_manifest(manifest: &SeriesManifest) -> Result<bool> {
    Ok(file_sha256(Path::new(&manifest.path))? == manifest.sha256)
}
