// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::episode::EpisodeCandidate;
use crate::error::HarvestError;

/// A slice of the work list processed together in its own directory
///
/// The batch borrows its episodes mutably from the full list, so processing
/// updates them in place.
#[derive(Debug)]
pub struct Batch<'a> {
    /// 1-based ordinal
    pub number: usize,
    pub dir: PathBuf,
    pub episodes: &'a mut [EpisodeCandidate],
}

/// Directory name for batch `number`: `batch_001`, `batch_002`, ...
pub fn batch_dir_name(number: usize) -> String {
    format!("batch_{number:03}")
}

/// Split `episodes` into consecutive batches of at most `batch_size`
///
/// Each batch gets `root/batch_NNN`, created if absent. An empty list yields
/// no batches and creates no directories.
pub async fn plan_batches<'a>(
    episodes: &'a mut [EpisodeCandidate],
    root: &Path,
    batch_size: usize,
) -> Result<Vec<Batch<'a>>, HarvestError> {
    if batch_size == 0 {
        return Err(HarvestError::InvalidOption(
            "batch size must be at least 1".to_string(),
        ));
    }

    let mut batches = Vec::new();
    for (index, chunk) in episodes.chunks_mut(batch_size).enumerate() {
        let number = index + 1;
        let dir = root.join(batch_dir_name(number));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| HarvestError::CreateDirectoryFailed {
                path: dir.clone(),
                source: e,
            })?;
        batches.push(Batch {
            number,
            dir,
            episodes: chunk,
        });
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::make_candidate;
    use tempfile::tempdir;

    fn episodes(count: usize) -> Vec<EpisodeCandidate> {
        (0..count)
            .map(|i| make_candidate(&format!("Episode {i}")))
            .collect()
    }

    #[tokio::test]
    async fn partitions_107_into_50_50_7() {
        let dir = tempdir().unwrap();
        let mut list = episodes(107);
        let expected: Vec<String> = list.iter().map(|e| e.id.clone()).collect();

        let batches = plan_batches(&mut list, dir.path(), 50).await.unwrap();

        let sizes: Vec<_> = batches.iter().map(|b| b.episodes.len()).collect();
        assert_eq!(sizes, vec![50, 50, 7]);

        let flattened: Vec<String> = batches
            .iter()
            .flat_map(|b| b.episodes.iter().map(|e| e.id.clone()))
            .collect();
        assert_eq!(flattened, expected);
    }

    #[tokio::test]
    async fn batch_directories_are_numbered_and_created() {
        let dir = tempdir().unwrap();
        let mut list = episodes(5);

        let batches = plan_batches(&mut list, dir.path(), 2).await.unwrap();

        let numbers: Vec<_> = batches.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(batches[0].dir, dir.path().join("batch_001"));
        assert_eq!(batches[2].dir, dir.path().join("batch_003"));
        assert!(batches.iter().all(|b| b.dir.is_dir()));
    }

    #[tokio::test]
    async fn large_batch_size_yields_single_batch() {
        let dir = tempdir().unwrap();
        let mut list = episodes(3);

        let batches = plan_batches(&mut list, dir.path(), 3).await.unwrap();
        assert_eq!(batches.len(), 1);

        let mut list = episodes(3);
        let batches = plan_batches(&mut list, dir.path(), 100).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].episodes.len(), 3);
    }

    #[tokio::test]
    async fn empty_list_yields_no_batches() {
        let dir = tempdir().unwrap();
        let mut list = episodes(0);

        let batches = plan_batches(&mut list, dir.path(), 50).await.unwrap();

        assert!(batches.is_empty());
        assert!(!dir.path().join("batch_001").exists());
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let dir = tempdir().unwrap();
        let mut list = episodes(3);

        let result = plan_batches(&mut list, dir.path(), 0).await;
        assert!(matches!(result, Err(HarvestError::InvalidOption(_))));
    }

    #[test]
    fn batch_dir_name_pads_to_three_digits() {
        assert_eq!(batch_dir_name(1), "batch_001");
        assert_eq!(batch_dir_name(42), "batch_042");
        assert_eq!(batch_dir_name(1000), "batch_1000");
    }
}
