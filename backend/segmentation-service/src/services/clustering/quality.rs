//! Internal cluster-validity indices.
//!
//! Labels are dense (`0..k`). All indices return finite values; degenerate
//! partitions (k < 2) score 0.

use super::distance::DistanceMetric;
use ndarray::{Array2, Axis};

/// Smallest centroid separation used as a Davies–Bouldin denominator
const MIN_SEPARATION: f64 = 1e-12;

/// Per-cluster mean rows, `k × d`
pub fn centroids(matrix: &Array2<f64>, labels: &[usize], k: usize) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros((k, matrix.ncols()));
    let mut counts = vec![0usize; k];

    for (row, &label) in matrix.axis_iter(Axis(0)).zip(labels.iter()) {
        let mut target = sums.row_mut(label);
        target += &row;
        counts[label] += 1;
    }

    for (mut row, count) in sums.axis_iter_mut(Axis(0)).zip(counts.iter()) {
        if *count > 0 {
            row.mapv_inplace(|v| v / *count as f64);
        }
    }
    sums
}

/// Mean over points of (b - a) / max(a, b), computed from a precomputed
/// distance matrix. Points in singleton clusters contribute 0.
pub fn silhouette_score(distances: &Array2<f64>, labels: &[usize], k: usize) -> f64 {
    let n = labels.len();
    if n == 0 || k < 2 {
        return 0.0;
    }

    let mut sizes = vec![0usize; k];
    for &label in labels {
        sizes[label] += 1;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }

        let mut sums = vec![0.0; k];
        for j in 0..n {
            if i != j {
                sums[labels[j]] += distances[[i, j]];
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        if !b.is_finite() {
            continue;
        }
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    (total / n as f64).clamp(-1.0, 1.0)
}

/// Average over clusters of max_j (S_i + S_j) / d(c_i, c_j), where S is the
/// mean member-to-centroid distance. Lower is better.
pub fn davies_bouldin_index(
    matrix: &Array2<f64>,
    labels: &[usize],
    k: usize,
    metric: DistanceMetric,
) -> f64 {
    if k < 2 {
        return 0.0;
    }

    let centers = centroids(matrix, labels, k);
    let mut scatter = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (row, &label) in matrix.axis_iter(Axis(0)).zip(labels.iter()) {
        scatter[label] += metric.compute(row, centers.row(label));
        counts[label] += 1;
    }
    for (s, count) in scatter.iter_mut().zip(counts.iter()) {
        if *count > 0 {
            *s /= *count as f64;
        }
    }

    let mut total = 0.0;
    for i in 0..k {
        let worst = (0..k)
            .filter(|&j| j != i)
            .map(|j| {
                let separation = metric
                    .compute(centers.row(i), centers.row(j))
                    .max(MIN_SEPARATION);
                (scatter[i] + scatter[j]) / separation
            })
            .fold(0.0, f64::max);
        total += worst;
    }

    total / k as f64
}

/// [B / (k - 1)] / [W / (n - k)] with squared euclidean dispersion.
/// Returns 1.0 when every cluster is a single point cloud (W = 0).
pub fn calinski_harabasz_index(matrix: &Array2<f64>, labels: &[usize], k: usize) -> f64 {
    let n = labels.len();
    if k < 2 || n <= k {
        return 0.0;
    }

    let overall = match matrix.mean_axis(Axis(0)) {
        Some(mean) => mean,
        None => return 0.0,
    };
    let centers = centroids(matrix, labels, k);

    let mut counts = vec![0usize; k];
    let mut within = 0.0;
    for (row, &label) in matrix.axis_iter(Axis(0)).zip(labels.iter()) {
        counts[label] += 1;
        within += (&row - &centers.row(label)).mapv(|v| v * v).sum();
    }

    let between: f64 = centers
        .axis_iter(Axis(0))
        .zip(counts.iter())
        .map(|(center, count)| *count as f64 * (&center - &overall).mapv(|v| v * v).sum())
        .sum();

    if within == 0.0 {
        return 1.0;
    }
    (between * (n - k) as f64) / (within * (k - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clustering::distance::pairwise_distances;
    use ndarray::arr2;

    fn two_blobs() -> (Array2<f64>, Vec<usize>) {
        let m = arr2(&[
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
        ]);
        (m, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_centroids() {
        let (m, labels) = two_blobs();
        let c = centroids(&m, &labels, 2);
        assert!((c[[0, 0]] - 0.1 / 3.0).abs() < 1e-12);
        assert!((c[[1, 1]] - 15.1 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_separated_blobs() {
        let (m, labels) = two_blobs();
        let d = pairwise_distances(&m, DistanceMetric::Euclidean);
        let s = silhouette_score(&d, &labels, 2);
        assert!(s > 0.9, "silhouette {}", s);
        assert!(s <= 1.0);
    }

    #[test]
    fn test_silhouette_bad_partition_is_negative() {
        let (m, _) = two_blobs();
        let d = pairwise_distances(&m, DistanceMetric::Euclidean);
        // Each cluster pairs one point from each blob
        let labels = vec![0, 1, 2, 0, 1, 2];
        let s = silhouette_score(&d, &labels, 3);
        assert!(s < 0.0, "silhouette {}", s);
        assert!(s >= -1.0);
    }

    #[test]
    fn test_silhouette_singletons_score_zero() {
        let m = arr2(&[[0.0], [1.0]]);
        let d = pairwise_distances(&m, DistanceMetric::Euclidean);
        assert_eq!(silhouette_score(&d, &[0, 1], 2), 0.0);
    }

    #[test]
    fn test_davies_bouldin_lower_for_better_partition() {
        let (m, good) = two_blobs();
        let bad = vec![0, 1, 0, 1, 0, 1];
        let good_db = davies_bouldin_index(&m, &good, 2, DistanceMetric::Euclidean);
        let bad_db = davies_bouldin_index(&m, &bad, 2, DistanceMetric::Euclidean);

        assert!(good_db >= 0.0);
        assert!(good_db < bad_db);
    }

    #[test]
    fn test_calinski_harabasz() {
        let (m, good) = two_blobs();
        let bad = vec![0, 1, 0, 1, 0, 1];
        let good_ch = calinski_harabasz_index(&m, &good, 2);
        let bad_ch = calinski_harabasz_index(&m, &bad, 2);

        assert!(good_ch > bad_ch);
        assert!(bad_ch >= 0.0);
        assert_eq!(calinski_harabasz_index(&m, &[0; 6], 1), 0.0);
    }
}
