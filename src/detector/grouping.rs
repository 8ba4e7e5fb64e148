/// Relative tolerance used when deciding whether two raw detections belong
/// to the same face.
pub const GROUP_EPS: f64 = 0.2;

/// Raw detection window in original image coordinates. May extend past the
/// image until it is clamped into a `FaceRegion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Candidate {
    fn similar(&self, other: &Candidate, eps: f64) -> bool {
        let delta =
            eps * (self.width.min(other.width) + self.height.min(other.height)) as f64 * 0.5;
        let close = |a: i64, b: i64| ((a - b).abs() as f64) <= delta;
        close(self.x, other.x)
            && close(self.y, other.y)
            && close(self.x + self.width, other.x + other.width)
            && close(self.y + self.height, other.y + other.height)
    }

    fn contains_with_margin(&self, inner: &Candidate, eps: f64) -> bool {
        let dx = (self.width as f64 * eps).round() as i64;
        let dy = (self.height as f64 * eps).round() as i64;
        inner.x >= self.x - dx
            && inner.y >= self.y - dy
            && inner.x + inner.width <= self.x + self.width + dx
            && inner.y + inner.height <= self.y + self.height + dy
    }
}

/// Clusters overlapping detections and keeps clusters backed by more than
/// `min_neighbors` raw windows.
///
/// Each surviving cluster is replaced by the average of its members.
/// Clusters that sit inside a stronger cluster are dropped. With
/// `min_neighbors == 0` the raw detections are returned untouched.
/// Output order follows the first member of each cluster.
pub fn group_candidates(candidates: &[Candidate], min_neighbors: u32, eps: f64) -> Vec<Candidate> {
    if min_neighbors == 0 || candidates.is_empty() {
        return candidates.to_vec();
    }

    let labels = partition(candidates, eps);
    let clusters = labels.iter().copied().max().map_or(0, |max| max + 1);

    let mut sums = vec![[0i64; 4]; clusters];
    let mut counts = vec![0i64; clusters];
    for (candidate, &label) in candidates.iter().zip(&labels) {
        let sum = &mut sums[label];
        sum[0] += candidate.x;
        sum[1] += candidate.y;
        sum[2] += candidate.width;
        sum[3] += candidate.height;
        counts[label] += 1;
    }

    let averaged: Vec<Candidate> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| {
            let avg = |v: i64| (v as f64 / count as f64).round() as i64;
            Candidate {
                x: avg(sum[0]),
                y: avg(sum[1]),
                width: avg(sum[2]),
                height: avg(sum[3]),
            }
        })
        .collect();

    let threshold = i64::from(min_neighbors);
    let mut kept = Vec::new();
    for (i, inner) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= threshold {
            continue;
        }

        let swallowed = averaged.iter().enumerate().any(|(j, outer)| {
            let n2 = counts[j];
            j != i
                && n2 > threshold
                && outer.contains_with_margin(inner, eps)
                && (n2 > n1.max(3) || n1 < 3)
        });

        if !swallowed {
            kept.push(*inner);
        }
    }
    kept
}

/// Equivalence classes under `Candidate::similar`, numbered in order of
/// first appearance.
fn partition(candidates: &[Candidate], eps: f64) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..candidates.len()).collect();

    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..candidates.len() {
        for j in 0..i {
            if candidates[i].similar(&candidates[j], eps) {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut label_of_root = vec![usize::MAX; candidates.len()];
    let mut next = 0;
    (0..candidates.len())
        .map(|i| {
            let r = root(&mut parent, i);
            if label_of_root[r] == usize::MAX {
                label_of_root[r] = next;
                next += 1;
            }
            label_of_root[r]
        })
        .collect()
}
