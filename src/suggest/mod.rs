//! Destination-directory suggestion.
//!
//! When a reference tree of already-sorted images is configured, every
//! directory in it becomes a [`PathCluster`]. A small classifier is trained
//! on colour histograms of the reference images and then scores every
//! candidate against the reference directories; the scores are appended to
//! the report so the user can see where each duplicate most likely belongs.
//!
//! The classifier is retrained from scratch on every run and the trained
//! model is written to [`MODEL_FILE`].

pub mod features;
pub mod mlp;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::seq::SliceRandom;

pub use features::{colour_histogram, featurise, FEATURE_LEN};
pub use mlp::{Mlp, ModelError, TrainingReport};

use crate::cache::Cache;
use crate::cluster::Cluster;
use crate::scanner::{compute_fingerprints, Enumerator, FileRecord};

/// Back-propagation learning rate.
pub const LEARNING_RATE: f64 = 0.1;
/// Upper bound on training passes over the reference set.
pub const MAX_TRAIN_ITERATIONS: usize = 10_000;
/// Training stops early when the mean squared error reaches this value.
pub const TARGET_TRAIN_ERROR: f64 = 0.01;
/// Hidden-layer width per reference directory.
pub const HIDDEN_PER_CLUSTER: usize = 20;
/// Where the trained model is persisted.
pub const MODEL_FILE: &str = "./mlpfile";

/// One reference cluster: all images found directly in one directory of the
/// reference tree.
#[derive(Debug, Clone)]
pub struct PathCluster {
    name: String,
    members: Vec<FileRecord>,
}

impl PathCluster {
    /// The directory path that produced this cluster.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference images in this directory.
    #[must_use]
    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    /// Worst perceptual-hash distance from `record` to any member.
    ///
    /// Unlike candidate clustering this deliberately uses only the pHash,
    /// not the combined metric. Records without a perceptual hash are
    /// infinitely far away.
    #[must_use]
    pub fn distance_to(&self, record: &FileRecord) -> f64 {
        let Some(candidate) = &record.perceptual_hash else {
            return f64::INFINITY;
        };
        let mut worst = 0.0f64;
        for member in &self.members {
            match &member.perceptual_hash {
                Some(reference) => worst = worst.max(candidate.distance(reference)),
                None => return f64::INFINITY,
            }
        }
        worst
    }
}

/// Classifier scores for one candidate file.
#[derive(Debug, Clone)]
pub struct SuggestionRow {
    /// Candidate path the scores belong to.
    pub path: PathBuf,
    /// One score per reference directory, in cluster-name order.
    pub scores: Vec<f32>,
}

/// Everything the report needs to print the suggestion appendix.
#[derive(Debug, Clone)]
pub struct Suggestions {
    /// Reference directory names in score order.
    pub cluster_names: Vec<String>,
    /// One row per candidate that could be featurised.
    pub rows: Vec<SuggestionRow>,
}

/// Builds reference clusters and produces per-candidate scores.
#[derive(Debug)]
pub struct Suggester {
    path_clusters: Vec<PathCluster>,
}

impl Suggester {
    /// Enumerate the reference tree and fingerprint its images.
    ///
    /// Every image file is appended to the cluster of its directory;
    /// directories whose path starts with `exclude_prefix` are skipped.
    /// Clusters are ordered by directory path.
    #[must_use]
    pub fn build(
        reference_root: &Path,
        exclude_prefix: Option<&str>,
        follow_symlinks: bool,
        cache: &Mutex<Cache>,
    ) -> Self {
        let enumerator = Enumerator::new(follow_symlinks, 0, u64::MAX);
        let mut records = Vec::new();
        enumerator.scan_root(reference_root, 0, &mut records);

        records.retain(FileRecord::is_image);
        if let Some(prefix) = exclude_prefix {
            records.retain(|record| {
                let directory = record
                    .path
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                !directory.starts_with(prefix)
            });
        }

        compute_fingerprints(&mut records, cache, None);

        let mut grouped: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
        for record in records {
            let directory = record
                .path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            grouped.entry(directory).or_default().push(record);
        }

        let path_clusters = grouped
            .into_iter()
            .map(|(name, members)| PathCluster { name, members })
            .collect();

        Self { path_clusters }
    }

    /// Reference clusters in name order.
    #[must_use]
    pub fn path_clusters(&self) -> &[PathCluster] {
        &self.path_clusters
    }

    /// True when the reference tree contributed no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path_clusters.is_empty()
    }

    /// Assemble the training set: one row per non-invalid reference image
    /// that can be featurised, targeting `+1` at its own cluster and `-1`
    /// everywhere else.
    fn training_rows(&self) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        let cluster_count = self.path_clusters.len();
        let mut inputs = Vec::new();
        let mut targets = Vec::new();

        for (index, path_cluster) in self.path_clusters.iter().enumerate() {
            for member in &path_cluster.members {
                if member.invalid {
                    continue;
                }
                let Some(features) = featurise(&member.path) else {
                    continue;
                };
                let mut target = vec![-1.0f32; cluster_count];
                target[index] = 1.0;
                inputs.push(features);
                targets.push(target);
            }
        }

        (inputs, targets)
    }

    /// Train the classifier and score every member of `clusters`.
    ///
    /// Returns `None` when there is nothing to train on. The trained model
    /// is persisted to [`MODEL_FILE`]; a write failure is logged and does
    /// not fail the run.
    #[must_use]
    pub fn suggest(&self, clusters: &[Cluster]) -> Option<Suggestions> {
        self.suggest_with_model(clusters, Path::new(MODEL_FILE))
    }

    /// [`Suggester::suggest`] with an explicit model file location.
    #[must_use]
    pub fn suggest_with_model(
        &self,
        clusters: &[Cluster],
        model_path: &Path,
    ) -> Option<Suggestions> {
        if self.path_clusters.is_empty() {
            return None;
        }

        let (mut inputs, mut targets) = self.training_rows();
        if inputs.is_empty() {
            log::warn!("Reference tree produced no usable training images");
            return None;
        }

        let mut rng = rand::thread_rng();

        // one joint permutation over inputs and targets
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        order.shuffle(&mut rng);
        inputs = order.iter().map(|&i| std::mem::take(&mut inputs[i])).collect();
        targets = order.iter().map(|&i| std::mem::take(&mut targets[i])).collect();

        let cluster_count = self.path_clusters.len();
        let mut network = Mlp::new(
            FEATURE_LEN,
            HIDDEN_PER_CLUSTER * cluster_count,
            cluster_count,
            &mut rng,
        );
        let report = network.train(
            &inputs,
            &targets,
            LEARNING_RATE,
            MAX_TRAIN_ITERATIONS,
            TARGET_TRAIN_ERROR,
        );
        log::info!(
            "Trained sorting classifier on {} images in {} iterations (error {:.4})",
            inputs.len(),
            report.iterations,
            report.error
        );

        if let Err(e) = network.save(model_path) {
            log::warn!("Could not persist classifier model: {e}");
        }

        if log::log_enabled!(log::Level::Debug) {
            self.log_cluster_distances(clusters);
        }

        let mut rows = Vec::new();
        for cluster in clusters {
            for member in cluster.members() {
                let Some(features) = featurise(&member.path) else {
                    continue;
                };
                rows.push(SuggestionRow {
                    path: member.path.clone(),
                    scores: network.predict(&features),
                });
            }
        }

        Some(Suggestions {
            cluster_names: self
                .path_clusters
                .iter()
                .map(|c| c.name.clone())
                .collect(),
            rows,
        })
    }

    /// Debug view of how far each candidate cluster sits from each
    /// reference directory under the perceptual hash.
    fn log_cluster_distances(&self, clusters: &[Cluster]) {
        for cluster in clusters {
            log::debug!(
                "Sorting cluster (size:{}, distance:{})",
                cluster.len(),
                cluster.distance()
            );
            for path_cluster in &self.path_clusters {
                let mut min = f64::MAX;
                let mut max = 0.0f64;
                for member in cluster.members() {
                    if member.invalid {
                        continue;
                    }
                    let d = path_cluster.distance_to(member);
                    min = min.min(d);
                    max = max.max(d);
                }
                log::debug!("  {} min:{min} max:{max}", path_cluster.name);
            }
        }
    }
}
