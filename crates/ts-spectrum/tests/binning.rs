//! End-to-end binning: photon files to spectrum sets.

use std::io::Write;
use std::path::PathBuf;

use ts_core::{MalformedLinePolicy, ProcessingConfig, ViewingInterval};
use ts_spectrum::{
    AnomalyLog, ClampSide, FluorescentLine, LogAxis, PhotonType, RegistrationKey, Spectrum, SpectrumCount,
    TorusGeometry, build_from_files,
};

fn write_photons(dir: &tempfile::TempDir, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    path
}

fn config() -> ProcessingConfig {
    ProcessingConfig { length_to_cm: 1.0, ..ProcessingConfig::default() }
}

fn geometry() -> TorusGeometry {
    // n_H = 1e23 cm^-3: an effective length of 1 cm is a column density of 1e23.
    TorusGeometry::new(0.0, 1.0, 1.0, 1e23).unwrap()
}

fn full_sky() -> ViewingInterval {
    ViewingInterval::new(0.0, 90.0).unwrap()
}

#[test]
fn three_fe_kalpha_photons_fill_three_bins() {
    let axis = LogAxis::new(100.0, 300_000.0, 2000).unwrap();
    let mut spectrum = SpectrumCount::build_log_empty(&axis);
    let mut anomalies = AnomalyLog::new();
    for energy in [100.0, 6404.0, 300_000.0] {
        spectrum.count_photon(energy, &mut anomalies, Some("FeKalpha")).unwrap();
    }

    let filled: Vec<usize> = spectrum.y().iter().enumerate().filter(|(_, y)| **y > 0.0).map(|(i, _)| i).collect();
    assert_eq!(filled, vec![0, 1039, 1999]);
    assert!(filled.iter().all(|&i| spectrum.y()[i] == 1.0 && spectrum.y_err()[i] == 1.0));
    assert_eq!(anomalies.count("energy", ClampSide::Above), 1);
}

#[test]
fn file_order_does_not_change_spectra() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_photons(
        &dir,
        "a.dat",
        &["6404 0 0.5 3 13 1 1.0", "8000 0 0.5 2 0 1 1.0", "1000 0 0.5 0 0 0 0.0"],
    );
    let b = write_photons(
        &dir,
        "b.dat",
        &["6404 0 0.5 3 13 1 1.0", "9000 0.1 0.2 1 0 2 5.0 0 1 1 1 0.2", "7000 0 0.5 2 0 1 3.0"],
    );

    let ab = build_from_files(&[a.clone(), b.clone()], &config(), &geometry(), full_sky()).unwrap();
    let ba = build_from_files(&[b, a], &config(), &geometry(), full_sky()).unwrap();

    assert_eq!(ab.spectra().len(), ba.spectra().len());
    for (key, spectrum) in ab.spectra() {
        assert_eq!(spectrum.y(), ba.get(key).unwrap().y(), "{key}");
    }
    assert_eq!(ab.reference().y(), ba.reference().y());
    assert_eq!(ab.stats(), ba.stats());

    let fe = RegistrationKey { nh_index: 13, photon_type: PhotonType::Fluorescent, line: FluorescentLine::FeKalpha };
    assert_eq!(ab.get(&fe).unwrap().total(), 2.0);
    assert_eq!(ab.stats().photons_seen, 6);
}

#[test]
fn malformed_lines_follow_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_photons(&dir, "bad.dat", &["6404 0 0.5 3 13 1 1.0", "garbage", "8000 0 0.5 2 0 1 1.0"]);

    let set = build_from_files(std::slice::from_ref(&path), &config(), &geometry(), full_sky()).unwrap();
    assert_eq!(set.stats().malformed_skipped, 1);
    assert_eq!(set.stats().accepted, 2);

    let strict = ProcessingConfig { malformed_lines: MalformedLinePolicy::Abort, ..config() };
    assert!(build_from_files(&[path], &strict, &geometry(), full_sky()).is_err());
}

#[test]
fn missing_file_is_an_error() {
    let missing = PathBuf::from("/nonexistent/photons.dat");
    assert!(build_from_files(&[missing], &config(), &geometry(), full_sky()).is_err());
}
