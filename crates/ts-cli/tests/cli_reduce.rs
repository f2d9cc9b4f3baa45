use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_torusspec"))
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("torusspec_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn energy_midpoint(i: usize) -> f64 {
    let edge = |k: usize| 100.0 * 3000f64.powf(k as f64 / 2000.0);
    0.5 * (edge(i) + edge(i + 1))
}

/// Flat continuum with a 40 % absorption edge above 7 keV, a Fe Kα line, and source
/// photons for the normalisation.
fn write_photons(path: &Path) {
    let mut text = String::new();
    for i in 0..2000 {
        let e = energy_midpoint(i);
        if !(900.0..=60000.0).contains(&e) {
            continue;
        }
        let count = if e < 7000.0 { 40 } else { 24 };
        for k in 0..count {
            let ty = if k % 2 == 0 { 1 } else { 2 };
            text.push_str(&format!("{e} 0.0 0.4 {ty} 0 1 1.0\n"));
        }
        text.push_str(&format!("{e} 0.0 0.4 0 0 0 0.0\n"));
    }
    for _ in 0..200 {
        text.push_str("6404.0 0.0 0.4 3 13 1 1.0\n");
    }
    for _ in 0..20 {
        text.push_str("6300.0 0.0 0.4 3 13 1 1.0\n");
    }
    std::fs::write(path, text).unwrap();
}

fn measurement_fields(line: &str) -> (String, Vec<f64>) {
    let (key, rest) = line.split_once('#').expect("key#values");
    let values = rest
        .split_whitespace()
        .flat_map(|group| group.split(':'))
        .map(|v| v.parse::<f64>().unwrap())
        .collect();
    (key.to_string(), values)
}

#[test]
fn reduce_then_measure_from_manifest() {
    let dir = tmp_path("reduce");
    std::fs::create_dir_all(&dir).unwrap();
    let photons = dir.join("photons.txt");
    write_photons(&photons);
    let measurements = dir.join("measurements.txt");
    let spectral_data = dir.join("spectral_data");

    let out = run(&[
        "reduce",
        photons.to_str().unwrap(),
        "--r-inner",
        "0",
        "--r-outer",
        "1",
        "--filling-factor",
        "1",
        "--nh-aver",
        "1e23",
        "--angle-begin",
        "60",
        "--angle-length",
        "15",
        "--n-aver",
        "5",
        "--abundance",
        "1xfe",
        "--output",
        measurements.to_str().unwrap(),
        "--spectral-data-dir",
        spectral_data.to_str().unwrap(),
        "--threads",
        "1",
    ]);
    assert!(out.status.success(), "reduce should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let text = std::fs::read_to_string(&measurements).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1, "only bin 13 has a line and a continuum: {text}");
    let (key, values) = measurement_fields(lines[0]);
    assert_eq!(key, "23_5_1xfe_6075_13");
    assert_eq!(values.len(), 10);
    assert!(values[0] > 0.0, "equivalent width");
    assert!((values[6] - 0.4).abs() < 0.05, "edge depth {}", values[6]);
    // Bin 0 (source photons only) is reported, not fatal.
    assert!(String::from_utf8_lossy(&out.stderr).contains("23_5_1xfe_6075_0"));

    let manifest = spectral_data.join("manifest.yaml");
    assert!(manifest.exists());
    for name in [
        "23_5_1xfe_6075_13_FeKalpha.fluxdensity",
        "23_5_1xfe_6075_13_CONTINUUM.fluxdensity",
        "23_5_1xfe_6075_13_CONTINUUM.spectrum",
    ] {
        assert!(spectral_data.join(name).exists(), "missing {name}");
    }

    let out = run(&["measure", "--manifest", manifest.to_str().unwrap()]);
    assert!(out.status.success(), "measure should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "{stdout}");
    let (key_again, again) = measurement_fields(lines[0]);
    assert_eq!(key_again, key);
    // Files round energies to 0.1 eV, so values agree closely but not exactly.
    for (a, b) in values.iter().zip(&again).take(6) {
        assert!((a - b).abs() <= 1e-2 * a.abs().max(1e-12), "{a} vs {b}");
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn measure_rejects_bad_manifest_key() {
    let dir = tmp_path("bad_manifest");
    std::fs::create_dir_all(&dir).unwrap();
    let manifest = dir.join("manifest.json");
    std::fs::write(&manifest, r#"{"measurements": [{"key": "523_5_9xfe_7590_27"}]}"#).unwrap();
    let out = run(&["measure", "--manifest", manifest.to_str().unwrap()]);
    assert!(!out.status.success(), "an unknown abundance code must fail");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn measure_skips_incomplete_keys() {
    let dir = tmp_path("incomplete_manifest");
    std::fs::create_dir_all(&dir).unwrap();
    let manifest = dir.join("manifest.yaml");
    std::fs::write(&manifest, "measurements:\n  - key: 523_5_1xfe_7590_27\n").unwrap();
    let out = run(&["measure", "--manifest", manifest.to_str().unwrap()]);
    assert!(out.status.success(), "missing components are not fatal, stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("523_5_1xfe_7590_27"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reduce_rejects_unknown_abundance() {
    let out = run(&[
        "reduce",
        "photons.txt",
        "--r-inner",
        "0",
        "--r-outer",
        "1",
        "--filling-factor",
        "1",
        "--nh-aver",
        "1e23",
        "--angle-begin",
        "60",
        "--angle-length",
        "15",
        "--n-aver",
        "5",
        "--abundance",
        "3xfe",
    ]);
    assert!(!out.status.success());
}
