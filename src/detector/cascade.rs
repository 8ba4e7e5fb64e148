//! Boosted Haar cascade model in the OpenCV `opencv-cascade-classifier`
//! XML layout (`haarcascade_frontalface_default.xml` and friends).

use std::path::Path;

use roxmltree::{Document, Node};
use thiserror::Error;

use crate::error::DetectionError;

/// Subtracted from every stage threshold at load time, so that windows
/// scoring exactly on the trained threshold still pass.
const STAGE_THRESHOLD_EPS: f64 = 1e-5;

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("missing <{0}> element")]
    Missing(&'static str),

    #[error("invalid number {value:?} in <{element}>")]
    Number {
        value: String,
        element: &'static str,
    },

    #[error("unsupported cascade: {0}")]
    Unsupported(String),

    #[error("malformed cascade: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

/// Weighted sum of up to three rectangle sums inside the detection window.
#[derive(Debug, Clone, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    /// Child taken when the feature value is below `threshold`. Values
    /// `<= 0` name a leaf (`leaves[-left]`).
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

impl WeakClassifier {
    fn predict(&self, mut feature_value: impl FnMut(usize) -> f64) -> f64 {
        let mut idx = 0i32;
        loop {
            let node = &self.nodes[idx as usize];
            idx = if feature_value(node.feature) < node.threshold {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return self.leaves[(-idx) as usize];
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

/// Summed-area tables of an 8-bit grayscale image, one row and one column
/// larger than the image.
pub struct IntegralImage {
    stride: usize,
    sum: Vec<i64>,
    sq_sum: Vec<i64>,
}

impl IntegralImage {
    pub fn new(gray: &image::GrayImage) -> Self {
        let (width, height) = (gray.width() as usize, gray.height() as usize);
        let stride = width + 1;
        let mut sum = vec![0i64; stride * (height + 1)];
        let mut sq_sum = vec![0i64; stride * (height + 1)];

        for y in 0..height {
            let mut row = 0i64;
            let mut sq_row = 0i64;
            for x in 0..width {
                let v = i64::from(gray.get_pixel(x as u32, y as u32)[0]);
                row += v;
                sq_row += v * v;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row;
                sq_sum[at] = sq_sum[at - stride] + sq_row;
            }
        }

        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    fn area(table: &[i64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> i64 {
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        let top = y * stride;
        let bottom = (y + h) * stride;
        table[bottom + x + w] - table[top + x + w] - table[bottom + x] + table[top + x]
    }

    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> i64 {
        Self::area(&self.sum, self.stride, x, y, w, h)
    }

    pub fn rect_sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> i64 {
        Self::area(&self.sq_sum, self.stride, x, y, w, h)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    window_width: u32,
    window_height: u32,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    /// Builds a cascade from parts, checking that every tree is well formed.
    pub fn new(
        window_width: u32,
        window_height: u32,
        stages: Vec<Stage>,
        features: Vec<HaarFeature>,
    ) -> Result<Self, CascadeError> {
        if window_width < 3 || window_height < 3 {
            return Err(CascadeError::Malformed(format!(
                "window {window_width}x{window_height} is too small"
            )));
        }
        if stages.is_empty() {
            return Err(CascadeError::Malformed("no stages".into()));
        }

        for feature in &features {
            for rect in &feature.rects {
                let fits = |start: u32, len: u32, limit: u32| start.checked_add(len).is_some_and(|end| end <= limit);
                if !fits(rect.x, rect.width, window_width) || !fits(rect.y, rect.height, window_height) {
                    return Err(CascadeError::Malformed(format!(
                        "feature rectangle {}x{}+{}+{} exceeds the window",
                        rect.width, rect.height, rect.x, rect.y
                    )));
                }
            }
        }

        for (stage_idx, stage) in stages.iter().enumerate() {
            for weak in &stage.classifiers {
                check_tree(weak, features.len())
                    .map_err(|reason| CascadeError::Malformed(format!("stage {stage_idx}: {reason}")))?;
            }
        }

        Ok(Self {
            window_width,
            window_height,
            stages,
            features,
        })
    }

    pub fn from_xml(xml: &str) -> Result<Self, CascadeError> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        let cascade = if root.has_tag_name("cascade") {
            root
        } else {
            child(root, "cascade")?
        };

        let stage_type = child_text(cascade, "stageType")?;
        if stage_type != "BOOST" {
            return Err(CascadeError::Unsupported(format!("stage type {stage_type}")));
        }
        let feature_type = child_text(cascade, "featureType")?;
        if feature_type != "HAAR" {
            return Err(CascadeError::Unsupported(format!("feature type {feature_type}")));
        }

        let window_width = parse_one::<u32>(cascade, "width")?;
        let window_height = parse_one::<u32>(cascade, "height")?;

        let mut stages = Vec::new();
        for stage_node in items(child(cascade, "stages")?) {
            let threshold = parse_one::<f64>(stage_node, "stageThreshold")? - STAGE_THRESHOLD_EPS;
            let mut classifiers = Vec::new();
            for weak_node in items(child(stage_node, "weakClassifiers")?) {
                classifiers.push(parse_weak(weak_node)?);
            }
            stages.push(Stage {
                threshold,
                classifiers,
            });
        }

        let mut features = Vec::new();
        for feature_node in items(child(cascade, "features")?) {
            if let Ok(tilted) = child_text(feature_node, "tilted") {
                if tilted.trim() != "0" {
                    return Err(CascadeError::Unsupported("tilted Haar features".into()));
                }
            }
            let mut rects = Vec::new();
            for rect_node in items(child(feature_node, "rects")?) {
                let values = numbers::<f64>(rect_node.text().unwrap_or(""), "rects")?;
                let &[x, y, w, h, weight] = values.as_slice() else {
                    return Err(CascadeError::Malformed(format!(
                        "feature rectangle needs 5 values, got {}",
                        values.len()
                    )));
                };
                rects.push(WeightedRect {
                    x: rect_coord(x)?,
                    y: rect_coord(y)?,
                    width: rect_coord(w)?,
                    height: rect_coord(h)?,
                    weight,
                });
            }
            features.push(HaarFeature { rects });
        }

        Self::new(window_width, window_height, stages, features)
    }

    pub fn load(path: &Path) -> Result<Self, DetectionError> {
        let xml = std::fs::read_to_string(path).map_err(|e| DetectionError::Model {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_xml(&xml).map_err(|e| DetectionError::Model {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs every stage on the window whose top-left corner is `(x, y)` in
    /// the integral image. The caller keeps the window inside the image.
    pub fn accepts(&self, integral: &IntegralImage, x: u32, y: u32) -> bool {
        let norm = self.variance_norm(integral, x, y);

        self.stages.iter().all(|stage| {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|weak| weak.predict(|f| self.feature_value(integral, f, x, y) * norm))
                .sum();
            score >= stage.threshold
        })
    }

    /// `1 / (area * stddev)` over the window interior (one-pixel border
    /// excluded). Flat windows get a factor of 1.
    fn variance_norm(&self, integral: &IntegralImage, x: u32, y: u32) -> f64 {
        let (w, h) = (self.window_width - 2, self.window_height - 2);
        let area = f64::from(w) * f64::from(h);
        let sum = integral.rect_sum(x + 1, y + 1, w, h) as f64;
        let sq_sum = integral.rect_sq_sum(x + 1, y + 1, w, h) as f64;

        let nf = area * sq_sum - sum * sum;
        if nf <= 0.0 {
            return 1.0;
        }
        1.0 / nf.sqrt()
    }

    fn feature_value(&self, integral: &IntegralImage, feature: usize, x: u32, y: u32) -> f64 {
        self.features[feature]
            .rects
            .iter()
            .map(|r| r.weight * integral.rect_sum(x + r.x, y + r.y, r.width, r.height) as f64)
            .sum()
    }
}

/// Rectangle coordinates must be non-negative integers.
fn rect_coord(value: f64) -> Result<u32, CascadeError> {
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(CascadeError::Malformed(format!("invalid rectangle coordinate {value}")));
    }
    Ok(value as u32)
}

fn check_tree(weak: &WeakClassifier, feature_count: usize) -> Result<(), String> {
    if weak.nodes.is_empty() {
        return Err("weak classifier without nodes".into());
    }
    for (idx, node) in weak.nodes.iter().enumerate() {
        if node.feature >= feature_count {
            return Err(format!("feature index {} out of range", node.feature));
        }
        for next in [node.left, node.right] {
            if next > 0 {
                // Children always come after their parent, so evaluation terminates.
                if next as usize <= idx || next as usize >= weak.nodes.len() {
                    return Err(format!("node {idx} points to invalid child {next}"));
                }
            } else if (-next) as usize >= weak.leaves.len() {
                return Err(format!("node {idx} points to missing leaf {}", -next));
            }
        }
    }
    Ok(())
}

fn parse_weak(node: Node) -> Result<WeakClassifier, CascadeError> {
    let raw_nodes = numbers::<f64>(child_text(node, "internalNodes")?, "internalNodes")?;
    if raw_nodes.is_empty() || raw_nodes.len() % 4 != 0 {
        return Err(CascadeError::Malformed(format!(
            "internalNodes must hold groups of 4 values, got {}",
            raw_nodes.len()
        )));
    }
    let nodes = raw_nodes
        .chunks_exact(4)
        .map(|n| TreeNode {
            left: n[0] as i32,
            right: n[1] as i32,
            feature: n[2] as usize,
            threshold: n[3],
        })
        .collect();
    let leaves = numbers::<f64>(child_text(node, "leafValues")?, "leafValues")?;
    Ok(WeakClassifier { nodes, leaves })
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &'static str) -> Result<Node<'a, 'input>, CascadeError> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .ok_or(CascadeError::Missing(name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &'static str) -> Result<&'a str, CascadeError> {
    Ok(child(node, name)?.text().unwrap_or("").trim())
}

/// `<_>` list items of a sequence node.
fn items<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.has_tag_name("_"))
}

fn parse_one<T: std::str::FromStr>(node: Node, name: &'static str) -> Result<T, CascadeError> {
    let text = child_text(node, name)?;
    text.parse().map_err(|_| CascadeError::Number {
        value: text.to_string(),
        element: name,
    })
}

fn numbers<T: std::str::FromStr>(text: &str, element: &'static str) -> Result<Vec<T>, CascadeError> {
    text.split_whitespace()
        .map(|token| {
            token.parse().map_err(|_| CascadeError::Number {
                value: token.to_string(),
                element,
            })
        })
        .collect()
}
