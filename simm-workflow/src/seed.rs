//! Raw-data seeding.
//!
//! Files are first copied into a staging directory next to the queue, then
//! renamed into the queue. The engine only ever sees complete files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, WorkflowError};

/// `<parent>/.<queue name>-staging`, on the same filesystem as the queue.
pub fn staging_dir(queue: &Path) -> PathBuf {
    let name = queue
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "queue".to_string());
    let staging = format!(".{name}-staging");
    match queue.parent() {
        Some(parent) => parent.join(staging),
        None => PathBuf::from(staging),
    }
}

/// Copy every file into `queue`. Returns the final paths.
pub fn seed_queue(files: &[PathBuf], queue: &Path) -> Result<Vec<PathBuf>, WorkflowError> {
    let staging = staging_dir(queue);
    fs::create_dir_all(queue).map_err(|e| io_err(queue, e))?;
    fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;

    let mut seeded = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let tmp = staging.join(name);
        let dest = queue.join(name);

        fs::copy(file, &tmp).map_err(|e| io_err(file, e))?;
        if let Err(e) = fs::rename(&tmp, &dest) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(&dest, e));
        }
        tracing::debug!(file = %dest.display(), "seeded");
        seeded.push(dest);
    }

    if let Err(err) = fs::remove_dir(&staging) {
        tracing::debug!(dir = %staging.display(), error = %err, "staging directory left in place");
    }
    tracing::info!(files = seeded.len(), queue = %queue.display(), "raw data copied");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("/data/gsm/simm", "/data/gsm/.simm-staging")]
    #[case("/data/umts/queue", "/data/umts/.queue-staging")]
    fn staging_sits_beside_queue(#[case] queue: &str, #[case] staging: &str) {
        assert_eq!(staging_dir(Path::new(queue)), PathBuf::from(staging));
    }

    #[test]
    fn seed_copies_and_leaves_sources() {
        let input = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let files: Vec<PathBuf> = ["a.dat", "b.dat"]
            .iter()
            .map(|n| {
                let p = input.path().join(n);
                fs::write(&p, format!("content of {n}")).unwrap();
                p
            })
            .collect();
        let queue = data.path().join("gsm").join("simm");

        let seeded = seed_queue(&files, &queue).expect("seed");

        assert_eq!(seeded, vec![queue.join("a.dat"), queue.join("b.dat")]);
        assert_eq!(fs::read_to_string(queue.join("b.dat")).unwrap(), "content of b.dat");
        assert!(files.iter().all(|f| f.exists()));
        assert!(!staging_dir(&queue).exists());
    }

    #[test]
    fn missing_source_is_reported_with_its_path() {
        let data = TempDir::new().unwrap();
        let missing = data.path().join("gone.dat");
        let err = seed_queue(&[missing.clone()], &data.path().join("q")).unwrap_err();
        assert!(matches!(err, WorkflowError::Io { ref path, .. } if *path == missing));
    }
}
