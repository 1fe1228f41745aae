use std::{
    io::BufWriter,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    definitions::{PROCESSED_DATA_FILE_NAME, PROCESSED_DATA_FILE_PREFIX},
    ResultStoreError::{self, *},
};

/// The records of one analysis run, in output order: experiments in the order of the input
/// files, and frames in order within each experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet<R> {
    records: Vec<R>,
}

impl<R> Default for ResultSet<R> {
    fn default() -> Self {
        Self { records: vec![] }
    }
}

impl<R> ResultSet<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self { records }
    }

    /// Join result sets end to end, keeping the order of `sets`.
    pub fn concat(sets: impl IntoIterator<Item = ResultSet<R>>) -> Self {
        sets.into_iter().flat_map(|set| set.records).collect()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R> FromIterator<R> for ResultSet<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, R> IntoIterator for &'a ResultSet<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<R: Serialize> ResultSet<R> {
    /// Write the result set to `path`, replacing any previous file there.
    ///
    /// The data is written to a temporary file beside `path`, synced, and then renamed over
    /// `path`, so an interrupted save leaves the previous file intact.
    pub fn save(&self, path: &Path) -> Result<(), ResultStoreError> {
        let io_err = |src: std::io::Error| StoreFileIo {
            src,
            path: path.to_path_buf(),
        };

        if let Some(parent_dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent_dir).map_err(io_err)?;
        }

        let temp_store_path = path.with_extension("tmp");

        log::info!(
            target: "result_store",
            "Saving {} records to {}",
            self.len(),
            path.display()
        );

        let temp_file = std::fs::File::create(&temp_store_path).map_err(io_err)?;
        let mut buf = BufWriter::new(temp_file);

        if let Err(e) = bincode::serialize_into(&mut buf, self) {
            return Err(Serialization {
                src: format!("{e}"),
                path: path.to_path_buf(),
            });
        }

        let temp_file = buf.into_inner().map_err(|e| io_err(e.into_error()))?;
        temp_file.sync_all().map_err(io_err)?;

        //now move the new file over the old one.
        std::fs::rename(&temp_store_path, path).map_err(io_err)?;

        Ok(())
    }
}

impl<R: DeserializeOwned> ResultSet<R> {
    /// Read back a result set written by [`ResultSet::save`].
    pub fn load(path: &Path) -> Result<Self, ResultStoreError> {
        let file = std::fs::File::open(path).map_err(|src| StoreFileIo {
            src,
            path: path.to_path_buf(),
        })?;

        let reader = std::io::BufReader::new(file);
        let set: Self = bincode::deserialize_from(reader).map_err(|e| Deserialization {
            src: format!("{e}"),
            path: path.to_path_buf(),
        })?;

        log::trace!(target: "result_store", "Loaded {} records from {}", set.len(), path.display());
        Ok(set)
    }
}

/// Where the result set of an analysis of `input` is kept: inside `input` when it is a
/// directory, otherwise beside it, named after its file stem.
pub fn result_store_path(input: &Path) -> PathBuf {
    if input.is_dir() {
        return input.join(PROCESSED_DATA_FILE_NAME);
    }

    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{PROCESSED_DATA_FILE_PREFIX}{stem}.bin"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{BubbleRecord, FrontRecord};

    fn front_records() -> ResultSet<FrontRecord> {
        (0..4)
            .map(|i| FrontRecord {
                exp_name: format!("Exp{}", i % 2),
                frame_index: i,
                area: u64::from(i) * 37,
                min_row: i,
                min_col: 0,
                max_row: 40,
                max_col: 25,
                height_px: f64::from(i) * 37.0 / 3.0,
            })
            .collect()
    }

    #[test]
    fn test_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROCESSED_DATA_FILE_NAME);

        let saved = front_records();
        saved.save(&path).unwrap();
        let loaded = ResultSet::<FrontRecord>::load(&path).unwrap();

        assert_eq!(loaded, saved);
        for (a, b) in loaded.iter().zip(saved.iter()) {
            assert_eq!(a.height_px.to_bits(), b.height_px.to_bits());
        }
    }

    #[test]
    fn test_save_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.bin");

        front_records().save(&path).unwrap();
        let smaller = ResultSet::new(front_records().into_records()[..1].to_vec());
        smaller.save(&path).unwrap();

        assert_eq!(ResultSet::<FrontRecord>::load(&path).unwrap(), smaller);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = ResultSet::<BubbleRecord>::load(&dir.path().join("missing.bin"));
        assert!(matches!(missing, Err(StoreFileIo { .. })));

        let junk_path = dir.path().join("junk.bin");
        std::fs::write(&junk_path, [1u8, 2, 3]).unwrap();
        let junk = ResultSet::<BubbleRecord>::load(&junk_path);
        assert!(matches!(junk, Err(Deserialization { .. })));
    }

    #[test]
    fn test_concat_keeps_order() {
        let a = ResultSet::new(vec![1, 2]);
        let b = ResultSet::new(vec![]);
        let c = ResultSet::new(vec![3]);

        assert_eq!(ResultSet::concat([a, b, c]).into_records(), vec![1, 2, 3]);
    }

    #[test]
    fn test_result_store_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            result_store_path(dir.path()),
            dir.path().join("ProcessedData.bin")
        );

        let image = dir.path().join("Bubbles_04.png");
        assert_eq!(
            result_store_path(&image),
            dir.path().join("ProcessedData_Bubbles_04.bin")
        );
    }
}
