use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// File extensions understood by the persistence layer.
pub const VALID_FORMATS: &[&str] = &["json"];

fn check_format(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ext) if VALID_FORMATS.contains(&ext.as_str()) => Ok(()),
        _ => Err(Error::UnsupportedFormat {
            path: path.to_path_buf(),
            expected: VALID_FORMATS,
        }),
    }
}

pub(crate) fn file_io(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    }
}

fn file_format(path: &Path) -> impl FnOnce(serde_json::Error) -> Error + '_ {
    move |source| Error::FileFormat {
        path: path.to_path_buf(),
        source,
    }
}

/// JSON has no encoding for NaN or infinity, so such values cannot be persisted.
pub(crate) fn check_finite<'a, I>(values: I, what: &str) -> Result<()>
where
    I: IntoIterator<Item = &'a f64>,
{
    match values.into_iter().position(|value| !value.is_finite()) {
        Some(index) => Err(Error::config(format!(
            "{} holds a non-finite value at element {}, it cannot be saved",
            what, index
        ))),
        None => Ok(()),
    }
}

pub fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    check_format(path)?;
    let mut writer = BufWriter::new(File::create(path).map_err(file_io(path))?);
    serde_json::to_writer(&mut writer, value).map_err(file_format(path))?;
    writer.flush().map_err(file_io(path))?;
    debug!(path = %path.display(), "saved");
    Ok(())
}

pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    check_format(path)?;
    let reader = BufReader::new(File::open(path).map_err(file_io(path))?);
    serde_json::from_reader(reader).map_err(file_format(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_json(&vec![1, 2, 3], dir.path().join("data.pickle")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert!(err.is_io());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_json::<Vec<u8>, _>("nowhere/data.json").unwrap_err();
        assert!(matches!(err, Error::FileIo { .. }));
        assert!(err.is_io());
        assert!(err.to_string().contains("nowhere/data.json"));
    }

    #[test]
    fn malformed_json_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2,").unwrap();
        let err = load_json::<Vec<u8>, _>(&path).unwrap_err();
        assert!(matches!(err, Error::FileFormat { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn floats_survive_a_round_trip_bit_for_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floats.json");
        let values: Vec<f64> = (0..600).map(|i| (i as f64 * 0.37).sin() / 3.0).collect();
        save_json(&values, &path).unwrap();
        let loaded: Vec<f64> = load_json(&path).unwrap();
        for (before, after) in values.iter().zip(&loaded) {
            assert_eq!(before.to_bits(), after.to_bits());
        }
    }

    #[test]
    fn non_finite_values_are_reported() {
        assert!(check_finite(&[0.5, 1.0], "matrix").is_ok());
        let err = check_finite(&[0.5, f64::NEG_INFINITY], "matrix").unwrap_err();
        assert!(err.to_string().contains("element 1"));
    }
}
