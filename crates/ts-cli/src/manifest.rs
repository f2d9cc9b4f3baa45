//! `torusspec measure` input manifest.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use ts_measure::{MeasurementKey, SpectralData};
use ts_spectrum::io;

/// Spectral-data files of one key. Relative paths are resolved against the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// e.g. `523_5_1xfe_7590_27`
    pub key: MeasurementKey,
    /// Fe Kα flux density file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_flux_density: Option<PathBuf>,
    /// Continuum flux density file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuum_flux_density: Option<PathBuf>,
    /// Continuum count spectrum file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuum_spectrum: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub measurements: Vec<ManifestEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let bytes = std::fs::read(path).with_context(|| format!("reading manifest {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let mut manifest: Manifest = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        // Default: YAML (serde_yaml_ng).
        serde_yaml_ng::from_slice(&bytes)?
    };
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}

impl Manifest {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.base_dir.join(path) }
    }

    fn open(&self, path: &Path) -> Result<BufReader<File>> {
        let path = self.resolve(path);
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        Ok(BufReader::new(file))
    }

    /// Read every listed file. Missing entries stay `None` and are reported by the
    /// aggregator; unreadable files are errors.
    pub fn load(&self) -> Result<BTreeMap<MeasurementKey, SpectralData>> {
        let mut inputs = BTreeMap::new();
        for entry in &self.measurements {
            let data = SpectralData {
                line_flux_density: match &entry.line_flux_density {
                    Some(p) => Some(io::read_flux_density(self.open(p)?)?),
                    None => None,
                },
                continuum_flux_density: match &entry.continuum_flux_density {
                    Some(p) => Some(io::read_flux_density(self.open(p)?)?),
                    None => None,
                },
                continuum_spectrum: match &entry.continuum_spectrum {
                    Some(p) => Some(io::read_spectrum(self.open(p)?)?),
                    None => None,
                },
            };
            if inputs.insert(entry.key, data).is_some() {
                anyhow::bail!("manifest lists {} twice", entry.key);
            }
        }
        Ok(inputs)
    }
}

/// Write the spectral data of every key into `dir` as `<key>_FeKalpha.fluxdensity`,
/// `<key>_CONTINUUM.fluxdensity` and `<key>_CONTINUUM.spectrum`, plus a `manifest.yaml`
/// listing them.
pub fn write_spectral_data(dir: &Path, inputs: &BTreeMap<MeasurementKey, SpectralData>) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let create = |name: String| -> Result<(BufWriter<File>, PathBuf)> {
        let file = File::create(dir.join(&name)).with_context(|| format!("creating {name}"))?;
        Ok((BufWriter::new(file), PathBuf::from(name)))
    };

    let mut measurements = Vec::with_capacity(inputs.len());
    for (key, data) in inputs {
        let mut entry = ManifestEntry {
            key: *key,
            line_flux_density: None,
            continuum_flux_density: None,
            continuum_spectrum: None,
        };
        if let Some(fd) = &data.line_flux_density {
            let (w, name) = create(format!("{key}_FeKalpha.fluxdensity"))?;
            io::write_flux_density(w, fd)?;
            entry.line_flux_density = Some(name);
        }
        if let Some(fd) = &data.continuum_flux_density {
            let (w, name) = create(format!("{key}_CONTINUUM.fluxdensity"))?;
            io::write_flux_density(w, fd)?;
            entry.continuum_flux_density = Some(name);
        }
        if let Some(sp) = &data.continuum_spectrum {
            let (w, name) = create(format!("{key}_CONTINUUM.spectrum"))?;
            io::write_spectrum(w, sp)?;
            entry.continuum_spectrum = Some(name);
        }
        measurements.push(entry);
    }

    let manifest = Manifest { measurements, base_dir: dir.to_path_buf() };
    let (w, _) = create("manifest.yaml".to_string())?;
    serde_yaml_ng::to_writer(w, &manifest)?;
    tracing::info!(dir = %dir.display(), keys = inputs.len(), "spectral data written");
    Ok(())
}
