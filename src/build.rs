//! The two-stage build pipeline.
//!
//! Sorted keys first become a minimized word graph, which the layout pass
//! then flattens into the packed unit array. The graph is dropped as soon
//! as the layout exists; peak memory is the graph plus the growing image.

use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::dawg::{Dawg, DawgBuilder};
use crate::double_array::DoubleArrayBuilder;
use crate::search::DoubleArray;
use crate::BuildError;

impl DoubleArray {
    /// Builds a dictionary from sorted, unique keys. Each key's value is
    /// its index in `keys`.
    ///
    /// # Errors
    ///
    /// See [`DawgBuilder::insert`] for the rejected inputs; layout may also
    /// fail with [`BuildError::OffsetOverflow`] on absurdly large keysets.
    ///
    /// # Examples
    ///
    /// ```
    /// use dawgdict::DoubleArray;
    ///
    /// let keys: Vec<&[u8]> = vec![b"bd", b"bda", b"bdb"];
    /// let dict = DoubleArray::build(&keys).unwrap();
    /// assert_eq!(dict.exact_match(b"bda"), Some(1));
    /// ```
    pub fn build<K: AsRef<[u8]>>(keys: &[K]) -> Result<Self, BuildError> {
        Self::build_with_progress(keys, None, |_, _| {})
    }

    /// Builds a dictionary with one explicit value per key.
    ///
    /// # Panics
    ///
    /// Panics if `keys` and `values` differ in length.
    pub fn build_with_values<K: AsRef<[u8]>>(
        keys: &[K],
        values: &[u32],
    ) -> Result<Self, BuildError> {
        Self::build_with_progress(keys, Some(values), |_, _| {})
    }

    /// Builds a dictionary, reporting `(done, total)` after every inserted
    /// key and once more when the image is finished.
    ///
    /// # Panics
    ///
    /// Panics if `values` is given and differs from `keys` in length.
    pub fn build_with_progress<K, F>(
        keys: &[K],
        values: Option<&[u32]>,
        mut progress: F,
    ) -> Result<Self, BuildError>
    where
        K: AsRef<[u8]>,
        F: FnMut(usize, usize),
    {
        if let Some(values) = values {
            assert_eq!(keys.len(), values.len(), "one value per key");
        }

        let mut builder = DawgBuilder::new();
        let total = keys.len() + 1;
        for (i, key) in keys.iter().enumerate() {
            let value = values.map_or(i as u32, |values| values[i]);
            builder.insert(key.as_ref(), value)?;
            progress(i + 1, total);
        }

        let dawg = builder.finish();
        let dict = Self::from_dawg(&dawg)?;
        drop(dawg);

        progress(total, total);
        Ok(dict)
    }

    /// Runs only the layout stage over an already-built word graph.
    pub fn from_dawg(dawg: &Dawg) -> Result<Self, BuildError> {
        let units = DoubleArrayBuilder::build(dawg)?;
        Ok(Self::from_units(units))
    }

    /// Builds a dictionary from a sorted word list, one key per line.
    ///
    /// Blank lines and lines starting with `#` are skipped; accepted keys
    /// get consecutive values starting at 0.
    pub fn build_from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut builder = DawgBuilder::new();

        // read_line into a reused buffer instead of the lines() iterator,
        // so long lists do not allocate a string per line.
        let mut buf = String::with_capacity(80);
        let mut num_keys = 0u32;
        loop {
            if reader.read_line(&mut buf)? == 0 {
                break;
            }
            let key = buf.trim_end();
            if !key.is_empty() && !is_comment(key) {
                builder.insert(key.as_bytes(), num_keys)?;
                num_keys += 1;
            }
            buf.clear();
        }

        let dawg = builder.finish();
        Ok(Self::from_dawg(&dawg)?)
    }
}

/// Returns true if this line is a comment.
fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_values_are_key_indices() {
        let keys: Vec<&[u8]> = vec![b"alfa", b"bravo", b"charlie"];
        let dict = DoubleArray::build(&keys).unwrap();
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(dict.exact_match(key), Some(i as u32));
        }
    }

    #[test]
    fn build_empty_keyset() {
        let keys: Vec<&[u8]> = vec![];
        let dict = DoubleArray::build(&keys).unwrap();
        assert!(dict.len() > 0);
        assert_eq!(dict.exact_match(b"anything"), None);
        assert_eq!(dict.common_prefix_search(b"abc").count(), 0);
    }

    #[test]
    fn build_propagates_order_errors() {
        let res = DoubleArray::build(&[&b"b"[..], b"a"]);
        assert_eq!(
            res.unwrap_err(),
            BuildError::KeyOrder {
                prev: b"b".to_vec(),
                next: b"a".to_vec(),
            }
        );
    }

    #[test]
    #[should_panic(expected = "one value per key")]
    fn mismatched_values_panic() {
        let _ = DoubleArray::build_with_values(&[&b"a"[..], b"b"], &[1]);
    }

    #[test]
    fn progress_reports_every_key_and_the_finish() {
        let keys: Vec<&[u8]> = vec![b"a", b"b", b"c"];
        let mut calls = Vec::new();
        DoubleArray::build_with_progress(&keys, None, |done, total| calls.push((done, total)))
            .unwrap();
        assert_eq!(calls, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn two_stage_build_matches_one_shot() {
        let mut builder = DawgBuilder::new();
        for (i, key) in [&b"ab"[..], b"ac", b"b"].iter().enumerate() {
            builder.insert(key, i as u32).unwrap();
        }
        let staged = DoubleArray::from_dawg(&builder.finish()).unwrap();

        let direct = DoubleArray::build(&[&b"ab"[..], b"ac", b"b"]).unwrap();
        assert_eq!(staged.units(), direct.units());
    }

    #[test]
    fn build_from_file_skips_blanks_and_comments() {
        let mut path = std::env::temp_dir();
        path.push(format!("dawgdict-{}-wordlist.txt", std::process::id()));
        std::fs::write(&path, "# sorted word list\nbake\n\ncake\n  # indented comment\nlake\n")
            .unwrap();

        let dict = DoubleArray::build_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(dict.exact_match(b"bake"), Some(0));
        assert_eq!(dict.exact_match(b"cake"), Some(1));
        assert_eq!(dict.exact_match(b"lake"), Some(2));
        assert_eq!(dict.exact_match(b"fake"), None);
    }

    #[test]
    fn build_from_file_reports_order_errors() {
        let mut path = std::env::temp_dir();
        path.push(format!("dawgdict-{}-unsorted.txt", std::process::id()));
        std::fs::write(&path, "cake\nbake\n").unwrap();

        let res = DoubleArray::build_from_file(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(res.is_err());
    }

    #[test]
    fn comment_detection() {
        assert!(is_comment("# a comment"));
        assert!(is_comment("   # indented"));
        assert!(!is_comment("word"));
        assert!(!is_comment(" word"));
    }
}
