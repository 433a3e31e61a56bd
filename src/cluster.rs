//! PCA projection and K-means clustering of author summaries.
//!
//! Each author becomes a point over five style and cadence features. The
//! points are rotated onto their principal components and then grouped with
//! K-means (k-means++ seeding, best of several restarts). The first two
//! component coordinates are kept for plotting.

use std::fs::{create_dir_all, File};
use std::path::Path;

use csv::Writer;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;
use crate::db::Database;
use crate::error::{ChatStyleError, Result};
use crate::logging::OperationTimer;
use crate::models::{AuthorCluster, AuthorSummary};

/// Names of the clustered features, in matrix column order
pub const FEATURES: [&str; 5] = ["frac_unique", "int_mean", "int_median", "int_std", "mean_area"];

const JACOBI_MAX_SWEEPS: usize = 100;
const KMEANS_TOLERANCE: f64 = 1e-10;

fn feature_row(summary: &AuthorSummary) -> [f64; 5] {
    [
        summary.frac_unique,
        summary.int_mean,
        summary.int_median,
        summary.int_std,
        summary.mean_area,
    ]
}

/// Principal component decomposition of a data matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    means: Vec<f64>,
    /// Unit component vectors, largest variance first
    components: Vec<Vec<f64>>,
    explained_variance: Vec<f64>,
}

impl Pca {
    /// Fit on `rows`, keeping every component
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        let Some(dims) = rows.first().map(Vec::len) else {
            return Err(ChatStyleError::InvalidInput("PCA needs at least one row".to_string()));
        };

        let means: Vec<f64> = (0..dims)
            .map(|j| rows.iter().map(|row| row[j]).sum::<f64>() / n as f64)
            .collect();

        let denominator = n.saturating_sub(1).max(1) as f64;
        let mut covariance = vec![vec![0.0; dims]; dims];
        for row in rows {
            for a in 0..dims {
                for b in a..dims {
                    covariance[a][b] += (row[a] - means[a]) * (row[b] - means[b]) / denominator;
                }
            }
        }
        for a in 0..dims {
            for b in 0..a {
                covariance[a][b] = covariance[b][a];
            }
        }

        let (values, vectors) = jacobi_eigen(covariance);
        let mut order: Vec<usize> = (0..dims).collect();
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

        Ok(Self {
            components: order
                .iter()
                .map(|&k| (0..dims).map(|i| vectors[i][k]).collect())
                .collect(),
            explained_variance: order.iter().map(|&k| values[k].max(0.0)).collect(),
            means,
        })
    }

    /// Coordinates of `row` on every component
    #[must_use]
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        self.components
            .iter()
            .map(|component| {
                component
                    .iter()
                    .zip(row.iter().zip(&self.means))
                    .map(|(c, (x, mu))| c * (x - mu))
                    .sum()
            })
            .collect()
    }

    /// Share of total variance per component; zeros when the data has no variance
    #[must_use]
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        let total: f64 = self.explained_variance.iter().sum();
        self.explained_variance
            .iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect()
    }
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns eigenvalues and a matrix whose columns are the matching unit eigenvectors.
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off_diagonal < 1e-24 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + theta.mul_add(theta, 1.0).sqrt());
                let c = 1.0 / t.mul_add(t, 1.0).sqrt();
                let s = t * c;

                for row in &mut a {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in &mut v {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    ((0..n).map(|i| a[i][i]).collect(), v)
}

/// One K-means fit
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index per point
    pub labels: Vec<usize>,
    /// Cluster centers
    pub centers: Vec<Vec<f64>>,
    /// Sum of squared distances from each point to its center
    pub inertia: f64,
    /// Lloyd iterations run
    pub iterations: usize,
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: &[f64], centers: &[Vec<f64>]) -> (usize, f64) {
    centers
        .iter()
        .enumerate()
        .map(|(idx, center)| (idx, squared_distance(point, center)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, f64::INFINITY))
}

/// k-means++ seeding: each new center is drawn with probability proportional
/// to its squared distance from the nearest chosen center
fn seed_centers<R: Rng>(points: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let mut centers = vec![points[rng.gen_range(0..points.len())].clone()];
    while centers.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centers).1).collect();
        // All weights are zero when every point coincides with a center
        let next = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..points.len()),
        };
        centers.push(points[next].clone());
    }
    centers
}

/// Lloyd iterations from k-means++ seeds
fn kmeans_once<R: Rng>(points: &[Vec<f64>], k: usize, max_iterations: usize, rng: &mut R) -> KMeansFit {
    let dims = points[0].len();
    let mut centers = seed_centers(points, k, rng);
    let mut labels = vec![0; points.len()];
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        for (label, point) in labels.iter_mut().zip(points) {
            *label = nearest(point, &centers).0;
        }

        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0_usize; k];
        for (&label, point) in labels.iter().zip(points) {
            counts[label] += 1;
            for (sum, x) in sums[label].iter_mut().zip(point) {
                *sum += x;
            }
        }

        let mut shift = 0.0;
        for ((center, sum), count) in centers.iter_mut().zip(sums).zip(counts) {
            // An empty cluster keeps its previous center
            if count == 0 {
                continue;
            }
            let updated: Vec<f64> = sum.iter().map(|s| s / count as f64).collect();
            shift += squared_distance(center, &updated);
            *center = updated;
        }
        if shift <= KMEANS_TOLERANCE {
            break;
        }
    }

    let mut inertia = 0.0;
    for (label, point) in labels.iter_mut().zip(points) {
        let (idx, distance) = nearest(point, &centers);
        *label = idx;
        inertia += distance;
    }

    KMeansFit {
        labels,
        centers,
        inertia,
        iterations,
    }
}

/// Best of `n_init` K-means fits by inertia
pub fn kmeans(points: &[Vec<f64>], config: &ClusterConfig) -> Result<KMeansFit> {
    let k = config.n_clusters;
    if k == 0 || config.n_init == 0 {
        return Err(ChatStyleError::InvalidConfig(
            "n_clusters and n_init must be greater than 0".to_string(),
        ));
    }
    if points.len() < k {
        return Err(ChatStyleError::InvalidInput(format!(
            "{} points cannot form {k} clusters",
            points.len()
        )));
    }

    let mut rng = config
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

    let mut best: Option<KMeansFit> = None;
    for run in 0..config.n_init {
        let fit = kmeans_once(points, k, config.max_iterations, &mut rng);
        debug!(run, inertia = fit.inertia, iterations = fit.iterations, "K-means run finished");
        if !matches!(&best, Some(current) if current.inertia <= fit.inertia) {
            best = Some(fit);
        }
    }
    best.ok_or_else(|| ChatStyleError::Other("K-means produced no fit".to_string()))
}

/// Cluster assignments plus the models behind them
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    /// Cluster and projected coordinates per clustered author
    pub assignments: Vec<AuthorCluster>,
    /// Cluster centers in PCA space
    pub centers: Vec<Vec<f64>>,
    /// Share of variance per principal component
    pub explained_variance_ratio: Vec<f64>,
    /// Sum of squared distances to the assigned centers
    pub inertia: f64,
}

/// Summary of one clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    /// Authors assigned to a cluster
    pub authors: usize,
    /// Authors left out for a non-finite feature
    pub authors_skipped: usize,
    /// Authors per cluster, by cluster index
    pub cluster_sizes: Vec<usize>,
    /// Share of variance per principal component
    pub explained_variance_ratio: Vec<f64>,
    /// Inertia of the best K-means fit
    pub inertia: f64,
}

/// Project and cluster author summaries.
///
/// Authors with a non-finite feature are left out. Fewer remaining authors
/// than clusters is an [`ChatStyleError::InvalidInput`] error.
pub fn cluster_authors(summaries: &[AuthorSummary], config: &ClusterConfig) -> Result<ClusterResult> {
    let (usable, rows): (Vec<&AuthorSummary>, Vec<Vec<f64>>) = summaries
        .iter()
        .filter_map(|summary| {
            let row = feature_row(summary);
            if row.iter().all(|v| v.is_finite()) {
                Some((summary, row.to_vec()))
            } else {
                debug!(author = %summary.author, "Skipping author with missing features");
                None
            }
        })
        .unzip();

    if rows.len() < config.n_clusters {
        return Err(ChatStyleError::InvalidInput(format!(
            "{} usable authors cannot form {} clusters",
            rows.len(),
            config.n_clusters
        )));
    }

    let pca = Pca::fit(&rows)?;
    let projected: Vec<Vec<f64>> = rows.iter().map(|row| pca.transform(row)).collect();
    let fit = kmeans(&projected, config)?;

    let assignments = usable
        .iter()
        .zip(&projected)
        .zip(&fit.labels)
        .map(|((summary, coords), &cluster)| AuthorCluster {
            author: summary.author.clone(),
            cluster,
            pc1: coords.first().copied().unwrap_or(f64::NAN),
            pc2: coords.get(1).copied().unwrap_or(f64::NAN),
        })
        .collect();

    Ok(ClusterResult {
        assignments,
        centers: fit.centers,
        explained_variance_ratio: pca.explained_variance_ratio(),
        inertia: fit.inertia,
    })
}

/// Write assignments as CSV with header `author,cluster,pc1,pc2`
pub fn write_clusters_csv(clusters: &[AuthorCluster], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let mut writer = Writer::from_writer(File::create(path)?);
    writer.write_record(["author", "cluster", "pc1", "pc2"])?;
    for cluster in clusters {
        writer.write_record([
            cluster.author.clone(),
            cluster.cluster.to_string(),
            cluster.pc1.to_string(),
            cluster.pc2.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Cluster the stored author summaries and replace the cluster table
pub fn run_clustering(db: &mut Database, config: &ClusterConfig) -> Result<ClusterReport> {
    let timer = OperationTimer::new("cluster");

    let summaries = db.load_authors()?;
    let result = cluster_authors(&summaries, config)?;
    db.replace_clusters(&result.assignments)?;

    if let Some(path) = &config.csv_path {
        write_clusters_csv(&result.assignments, path)?;
        info!(path = %path.display(), "Exported cluster assignments");
    }

    let mut cluster_sizes = vec![0; config.n_clusters];
    for assignment in &result.assignments {
        cluster_sizes[assignment.cluster] += 1;
    }
    if cluster_sizes.contains(&0) {
        warn!(?cluster_sizes, "At least one cluster is empty");
    }

    let report = ClusterReport {
        authors: result.assignments.len(),
        authors_skipped: summaries.len() - result.assignments.len(),
        cluster_sizes,
        explained_variance_ratio: result.explained_variance_ratio,
        inertia: result.inertia,
    };
    info!(
        authors = report.authors,
        clusters = config.n_clusters,
        inertia = report.inertia,
        "Clustering complete"
    );

    timer.finish();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(author: &str, base: f64) -> AuthorSummary {
        AuthorSummary {
            author: author.to_string(),
            num_messages: 0.0,
            unique_messages: 0.0,
            frac_unique: base,
            mean_area: base / 2.0,
            int_median: base * 3.0,
            int_mean: base * 3.0 + 0.1,
            int_std: base - 0.2,
            int_skew: f64::NAN,
        }
    }

    fn seeded(n_clusters: usize) -> ClusterConfig {
        ClusterConfig {
            n_clusters,
            seed: Some(11),
            ..ClusterConfig::default()
        }
    }

    #[test]
    fn test_jacobi_diagonalizes() {
        let matrix = vec![
            vec![4.0, 1.0, 2.0],
            vec![1.0, 3.0, 0.5],
            vec![2.0, 0.5, 5.0],
        ];
        let (values, vectors) = jacobi_eigen(matrix.clone());
        for k in 0..3 {
            for i in 0..3 {
                let av: f64 = (0..3).map(|j| matrix[i][j] * vectors[j][k]).sum();
                assert!((av - values[k] * vectors[i][k]).abs() < 1e-9);
            }
        }
        assert!((values.iter().sum::<f64>() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_pca_orders_components() {
        // Variance lies almost entirely along the first axis
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|i| vec![f64::from(i), f64::from(i % 2) * 0.1])
            .collect();
        let pca = Pca::fit(&rows).expect("pca");
        let ratio = pca.explained_variance_ratio();
        assert!(ratio[0] > 0.99);
        assert!((ratio.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(pca.transform(&pca.means.clone()).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_two_separated_groups() {
        let mut summaries: Vec<AuthorSummary> =
            (0..6).map(|i| summary(&format!("low{i}"), 0.1 + f64::from(i) * 0.01)).collect();
        summaries.extend((0..6).map(|i| summary(&format!("high{i}"), 5.0 + f64::from(i) * 0.01)));

        let result = cluster_authors(&summaries, &seeded(2)).expect("cluster");
        assert_eq!(result.assignments.len(), 12);
        let low = result.assignments[0].cluster;
        let high = result.assignments[6].cluster;
        assert_ne!(low, high);
        assert!(result.assignments[..6].iter().all(|a| a.cluster == low));
        assert!(result.assignments[6..].iter().all(|a| a.cluster == high));
    }

    #[test]
    fn test_too_few_authors() {
        let summaries = vec![summary("only", 1.0)];
        let result = cluster_authors(&summaries, &seeded(2));
        assert!(matches!(result, Err(ChatStyleError::InvalidInput(_))));
    }

    #[test]
    fn test_non_finite_authors_are_skipped() {
        let mut broken = summary("broken", 1.0);
        broken.int_std = f64::NAN;
        let summaries = vec![summary("a", 0.0), broken, summary("b", 2.0)];
        let result = cluster_authors(&summaries, &seeded(2)).expect("cluster");
        let authors: Vec<&str> = result.assignments.iter().map(|a| a.author.as_str()).collect();
        assert_eq!(authors, vec!["a", "b"]);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let summaries: Vec<AuthorSummary> = (0..20)
            .map(|i| summary(&format!("a{i}"), f64::from(i * 7 % 13)))
            .collect();
        let first = cluster_authors(&summaries, &seeded(3)).expect("cluster");
        let second = cluster_authors(&summaries, &seeded(3)).expect("cluster");
        assert_eq!(first, second);
    }

    #[test]
    fn test_identical_points_do_not_panic() {
        let summaries: Vec<AuthorSummary> = (0..4).map(|i| summary(&format!("a{i}"), 1.0)).collect();
        let result = cluster_authors(&summaries, &seeded(2)).expect("cluster");
        assert!(result.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out").join("clusters.csv");
        let clusters = vec![AuthorCluster {
            author: "Trader, Joe".to_string(),
            cluster: 1,
            pc1: 0.5,
            pc2: -1.25,
        }];
        write_clusters_csv(&clusters, &path).expect("write");
        let written = std::fs::read_to_string(&path).expect("read");
        assert_eq!(written, "author,cluster,pc1,pc2\n\"Trader, Joe\",1,0.5,-1.25\n");
    }
}
