//! End-to-end pipeline tests over real temp directories and images.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use imgdupe::cache::Cache;
use imgdupe::cluster::{self, Cluster};
use imgdupe::output::render_report;
use imgdupe::scanner::{
    compute_fingerprints, mark_items, sort_tail_by_depth_and_path, Enumerator, FileRecord,
};

/// A left-to-right gradient; visually distinct from [`gradient_y`].
fn gradient_x(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        let v = (x * 255 / width.max(1)) as u8;
        Rgb([v, v, v])
    })
}

/// A top-to-bottom gradient.
fn gradient_y(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| {
        let v = (y * 255 / height.max(1)) as u8;
        Rgb([v, v, v])
    })
}

fn enumerate(roots: &[&Path], deterministic: bool) -> Vec<FileRecord> {
    let enumerator = Enumerator::new(false, 1, u64::MAX);
    let mut records = Vec::new();
    for (index, root) in roots.iter().enumerate() {
        let first = records.len();
        enumerator.scan_root(root, index, &mut records);
        if deterministic {
            sort_tail_by_depth_and_path(&mut records, first);
        }
    }
    mark_items(&mut records);
    records
}

/// The full candidate pipeline, as `main` drives it.
fn run_pipeline(roots: &[&Path], cache: &Mutex<Cache>, deterministic: bool) -> Vec<Cluster> {
    let mut records = enumerate(roots, deterministic);
    cluster::remove_identical_inodes(&mut records);
    cluster::remove_non_images(&mut records);
    compute_fingerprints(&mut records, cache, None);
    cluster::remove_invalid_images(&mut records);
    let mut clusters = cluster::build_clusters(records);
    cluster::sort_clusters(&mut clusters);
    clusters
}

fn report_text(clusters: &[Cluster]) -> String {
    let mut buffer = Vec::new();
    render_report(&mut buffer, clusters, None).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[test]
fn test_empty_roots_produce_empty_report() {
    let root_a = TempDir::new().unwrap();
    let root_b = TempDir::new().unwrap();
    let cache = Mutex::new(Cache::disabled());

    let clusters = run_pipeline(&[root_a.path(), root_b.path()], &cache, false);

    assert!(clusters.is_empty());
    assert_eq!(report_text(&clusters), "");
}

#[test]
fn test_duplicate_pair_across_roots() {
    let root_a = TempDir::new().unwrap();
    let root_b = TempDir::new().unwrap();
    gradient_x(32, 32).save(root_a.path().join("one.jpg")).unwrap();
    std::fs::copy(
        root_a.path().join("one.jpg"),
        root_b.path().join("copy.jpg"),
    )
    .unwrap();

    let cache = Mutex::new(Cache::disabled());
    let clusters = run_pipeline(&[root_a.path(), root_b.path()], &cache, false);

    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].len(), 2);
    assert_eq!(clusters[0].distance(), 0.0);

    let text = report_text(&clusters);
    assert!(text.starts_with("# Section (size:2, distance:0)\n"));
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn test_dissimilar_images_stay_apart() {
    let root = TempDir::new().unwrap();
    gradient_x(32, 32).save(root.path().join("x.png")).unwrap();
    gradient_y(32, 32).save(root.path().join("y.png")).unwrap();

    let cache = Mutex::new(Cache::disabled());
    let clusters = run_pipeline(&[root.path()], &cache, false);

    assert_eq!(clusters.len(), 2);
    assert!(clusters.iter().all(Cluster::is_single));
    // single-member clusters never reach the report
    assert_eq!(report_text(&clusters), "");
}

#[test]
fn test_non_images_are_filtered() {
    let root = TempDir::new().unwrap();
    gradient_x(16, 16).save(root.path().join("img.png")).unwrap();
    std::fs::write(root.path().join("readme.txt"), b"hello").unwrap();
    std::fs::write(root.path().join("upper.PNG"), b"some bytes").unwrap();

    let mut records = enumerate(&[root.path()], false);
    assert_eq!(records.len(), 3);

    cluster::remove_non_images(&mut records);
    assert_eq!(records.len(), 1);
    assert!(records[0].path.ends_with("img.png"));
}

#[test]
#[cfg(unix)]
fn test_identical_inode_collapse_prefers_earlier_root() {
    let root_a = TempDir::new().unwrap();
    let root_b = TempDir::new().unwrap();
    let original = root_a.path().join("photo.jpg");
    gradient_x(16, 16).save(&original).unwrap();
    std::fs::hard_link(&original, root_b.path().join("linked.jpg")).unwrap();

    let mut records = enumerate(&[root_a.path(), root_b.path()], false);
    assert_eq!(records.len(), 2);

    let removed = cluster::remove_identical_inodes(&mut records);
    assert_eq!(removed, 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cmdline_index, 0);
}

#[test]
fn test_invalid_image_dropped_and_remembered() {
    let root = TempDir::new().unwrap();
    let bad = root.path().join("broken.png");
    std::fs::write(&bad, b"png in name only").unwrap();
    gradient_x(16, 16).save(root.path().join("fine.png")).unwrap();

    let cache_dir = TempDir::new().unwrap();
    let cache_file = cache_dir.path().join("cache.json");
    let cache = Mutex::new(Cache::load(cache_file.clone()));

    let mut records = enumerate(&[root.path()], false);
    cluster::remove_non_images(&mut records);
    compute_fingerprints(&mut records, &cache, None);

    let broken = records.iter().find(|r| r.path.ends_with("broken.png")).unwrap();
    assert!(broken.invalid);

    let removed = cluster::remove_invalid_images(&mut records);
    assert_eq!(removed, 1);
    assert!(records.iter().all(|r| !r.path.ends_with("broken.png")));

    cache.into_inner().unwrap().save().unwrap();
    let text = std::fs::read_to_string(&cache_file).unwrap();
    assert!(text.contains("isInvalidImage"));
    assert!(text.contains("broken.png"));
}

#[test]
fn test_cache_hit_skips_decoding_on_second_run() {
    let root = TempDir::new().unwrap();
    let image_path = root.path().join("stable.png");
    gradient_x(32, 32).save(&image_path).unwrap();
    let twin_path = root.path().join("twin.png");
    std::fs::copy(&image_path, &twin_path).unwrap();

    let cache_dir = TempDir::new().unwrap();
    let cache_file = cache_dir.path().join("cache.json");

    let cache = Mutex::new(Cache::load(cache_file.clone()));
    let first_clusters = run_pipeline(&[root.path()], &cache, true);
    assert_eq!(first_clusters.len(), 1);
    cache.into_inner().unwrap().save().unwrap();

    // replace both files with undecodable bytes of the same length; only a
    // cache hit can explain fingerprints appearing on the second run
    let size = std::fs::metadata(&image_path).unwrap().len();
    std::fs::write(&image_path, vec![0u8; size as usize]).unwrap();
    std::fs::write(&twin_path, vec![0u8; size as usize]).unwrap();

    let cache = Mutex::new(Cache::load(cache_file));
    let second_clusters = run_pipeline(&[root.path()], &cache, true);

    assert_eq!(second_clusters.len(), 1);
    assert_eq!(second_clusters[0].len(), 2);
    assert_eq!(second_clusters[0].distance(), 0.0);
}

#[test]
fn test_deterministic_runs_are_byte_identical() {
    let root = TempDir::new().unwrap();
    for name in ["b.png", "a.png", "c.png"] {
        gradient_x(32, 32).save(root.path().join(name)).unwrap();
    }
    std::fs::create_dir(root.path().join("sub")).unwrap();
    gradient_y(32, 32)
        .save(root.path().join("sub").join("d.png"))
        .unwrap();

    let cache = Mutex::new(Cache::disabled());
    let first = report_text(&run_pipeline(&[root.path()], &cache, true));
    let cache = Mutex::new(Cache::disabled());
    let second = report_text(&run_pipeline(&[root.path()], &cache, true));

    assert_eq!(first, second);
    assert!(first.contains("# Section (size:3, distance:0)"));
}

#[test]
fn test_size_window_drops_small_files_before_hashing() {
    let root = TempDir::new().unwrap();
    gradient_x(32, 32).save(root.path().join("big.png")).unwrap();
    std::fs::write(root.path().join("tiny.png"), b"x").unwrap();

    let enumerator = Enumerator::new(false, 2, u64::MAX);
    let mut records = Vec::new();
    enumerator.scan_root(root.path(), 0, &mut records);

    assert_eq!(records.len(), 1);
    assert!(records[0].path.ends_with("big.png"));
}

#[test]
fn test_report_with_suggestions_appendix() {
    use imgdupe::suggest::Suggester;

    let reference = TempDir::new().unwrap();
    let shelf = reference.path().join("shelf");
    std::fs::create_dir(&shelf).unwrap();
    gradient_x(16, 16).save(shelf.join("r1.png")).unwrap();
    gradient_x(16, 16).save(shelf.join("r2.png")).unwrap();

    let root = TempDir::new().unwrap();
    gradient_x(32, 32).save(root.path().join("a.png")).unwrap();
    std::fs::copy(root.path().join("a.png"), root.path().join("b.png")).unwrap();

    let cache = Mutex::new(Cache::disabled());
    let suggester = Suggester::build(reference.path(), None, false, &cache);
    let clusters = run_pipeline(&[root.path()], &cache, true);

    let model_dir = TempDir::new().unwrap();
    let suggestions = suggester
        .suggest_with_model(&clusters, &model_dir.path().join("mlpfile"))
        .unwrap();

    let mut buffer = Vec::new();
    render_report(&mut buffer, &clusters, Some(&suggestions)).unwrap();
    let text = String::from_utf8(buffer).unwrap();

    assert!(text.contains("### Sorting ###"));
    assert!(text.contains("Clusters:\n0: "));
    assert!(text.contains(&shelf.display().to_string()));
    // one score block per candidate image
    assert_eq!(text.matches("\n0: ").count(), 3);
    assert!(model_dir.path().join("mlpfile").exists());
}

#[test]
fn test_report_paths_round_trip() {
    // cluster member paths appear verbatim in the report
    let root = TempDir::new().unwrap();
    gradient_x(32, 32).save(root.path().join("first.jpg")).unwrap();
    std::fs::copy(
        root.path().join("first.jpg"),
        root.path().join("second.jpg"),
    )
    .unwrap();

    let cache = Mutex::new(Cache::disabled());
    let clusters = run_pipeline(&[root.path()], &cache, true);
    let text = report_text(&clusters);

    let expected_first: PathBuf = root.path().join("first.jpg");
    let expected_second: PathBuf = root.path().join("second.jpg");
    assert!(text.contains(&expected_first.display().to_string()));
    assert!(text.contains(&expected_second.display().to_string()));
}
