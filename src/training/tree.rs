//! C4.5-style decision tree
//!
//! Splits are chosen by information gain ratio among attributes whose gain is
//! at least the average gain. Numeric attributes split in two at a threshold,
//! nominal attributes split into one branch per value.

use std::fmt::Write as _;

use anyhow::{bail, Result};

use super::dataset::{Attribute, Dataset, Value};
use super::{Classifier, TrainedModel};

/// Tree growth settings
#[derive(Debug, Clone)]
pub struct DecisionTree {
    /// Minimum instances in at least two branches of a split
    pub min_leaf: usize,
    /// Depth limit
    pub max_depth: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self {
            min_leaf: 2,
            max_depth: 32,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        class: usize,
        count: usize,
        errors: usize,
    },
    Threshold {
        attr: usize,
        threshold: f64,
        /// Branch taken by instances with a missing value
        missing: usize,
        children: [Box<Node>; 2],
    },
    Nominal {
        attr: usize,
        missing: usize,
        children: Vec<Node>,
    },
}

/// Fitted decision tree
#[derive(Debug, Clone)]
pub struct TreeModel {
    root: Node,
    attributes: Vec<Attribute>,
}

/// Candidate split for one attribute
struct Split {
    attr: usize,
    gain: f64,
    gain_ratio: f64,
    threshold: Option<f64>,
}

impl Classifier for DecisionTree {
    type Model = TreeModel;

    fn fit(&self, data: &Dataset) -> Result<TreeModel> {
        let class_index = data.class_index();
        let rows: Vec<&[Value]> = data
            .rows
            .iter()
            .map(Vec::as_slice)
            .filter(|r| data.class_of(r).is_some())
            .collect();
        if rows.is_empty() {
            bail!("no instances with a known class label");
        }

        let builder = Builder {
            config: self,
            data,
            class_index,
            num_classes: data.num_classes(),
        };
        let root = builder.grow(&rows, 0);

        tracing::debug!(
            "Fitted decision tree on {} instances of '{}'",
            rows.len(),
            data.relation
        );

        Ok(TreeModel {
            root,
            attributes: data.attributes.clone(),
        })
    }
}

struct Builder<'a> {
    config: &'a DecisionTree,
    data: &'a Dataset,
    class_index: usize,
    num_classes: usize,
}

impl Builder<'_> {
    fn class_counts(&self, rows: &[&[Value]]) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for row in rows {
            if let Some(c) = self.data.class_of(row) {
                counts[c] += 1;
            }
        }
        counts
    }

    fn leaf(&self, rows: &[&[Value]], fallback: usize) -> Node {
        let counts = self.class_counts(rows);
        let count: usize = counts.iter().sum();
        let class = if count == 0 { fallback } else { majority(&counts) };
        Node::Leaf {
            class,
            count,
            errors: count - counts.get(class).copied().unwrap_or(0),
        }
    }

    fn grow(&self, rows: &[&[Value]], depth: usize) -> Node {
        let counts = self.class_counts(rows);
        let majority_class = majority(&counts);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        if pure || rows.len() < 2 * self.config.min_leaf || depth >= self.config.max_depth {
            return self.leaf(rows, majority_class);
        }

        let Some(split) = self.best_split(rows) else {
            return self.leaf(rows, majority_class);
        };

        let node = match split.threshold {
            Some(threshold) => {
                let (left, right): (Vec<&[Value]>, Vec<&[Value]>) =
                    rows.iter().copied().partition(|r| match r[split.attr] {
                        Value::Numeric(v) => v <= threshold,
                        _ => false,
                    });
                let known_left = left.iter().filter(|r| is_known(r[split.attr])).count();
                let known_right = right.iter().filter(|r| is_known(r[split.attr])).count();
                let missing = usize::from(known_right > known_left);

                // Missing values went right in the partition; move them if needed
                let (left, right) = if missing == 0 {
                    let (unknown, right): (Vec<&[Value]>, Vec<&[Value]>) =
                        right.into_iter().partition(|r| !is_known(r[split.attr]));
                    let mut left = left;
                    left.extend(unknown);
                    (left, right)
                } else {
                    (left, right)
                };

                Node::Threshold {
                    attr: split.attr,
                    threshold,
                    missing,
                    children: [
                        Box::new(self.grow(&left, depth + 1)),
                        Box::new(self.grow(&right, depth + 1)),
                    ],
                }
            }
            None => {
                let num_values = self.data.attributes[split.attr].values().len();
                let mut branches: Vec<Vec<&[Value]>> = vec![Vec::new(); num_values];
                let mut unknown = Vec::new();
                for row in rows {
                    match row[split.attr] {
                        Value::Nominal(v) if v < num_values => branches[v].push(*row),
                        _ => unknown.push(*row),
                    }
                }
                let missing = branches
                    .iter()
                    .enumerate()
                    .max_by_key(|&(i, b)| (b.len(), std::cmp::Reverse(i)))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                branches[missing].extend(unknown);

                let children = branches
                    .iter()
                    .map(|b| {
                        if b.is_empty() {
                            self.leaf(b, majority_class)
                        } else {
                            self.grow(b, depth + 1)
                        }
                    })
                    .collect();

                Node::Nominal {
                    attr: split.attr,
                    missing,
                    children,
                }
            }
        };

        collapse(node)
    }

    fn best_split(&self, rows: &[&[Value]]) -> Option<Split> {
        let total = rows.len() as f64;

        let candidates: Vec<Split> = (0..self.data.attributes.len())
            .filter(|&a| a != self.class_index)
            .filter_map(|attr| {
                let known: Vec<&[Value]> = rows
                    .iter()
                    .copied()
                    .filter(|r| is_known(r[attr]))
                    .collect();
                if known.len() < 2 * self.config.min_leaf {
                    return None;
                }
                let known_fraction = known.len() as f64 / total;
                let known_entropy = entropy(&self.class_counts(&known));

                let (partitions, threshold) = if self.data.attributes[attr].is_numeric() {
                    self.best_threshold(&known, attr, known_entropy)?
                } else {
                    (self.nominal_partitions(&known, attr)?, None)
                };

                let weighted: f64 = partitions
                    .iter()
                    .map(|p| {
                        let n: usize = p.iter().sum();
                        n as f64 / known.len() as f64 * entropy(p)
                    })
                    .sum();
                // Gain is discounted by the fraction of known values
                let gain = known_fraction * (known_entropy - weighted).max(0.0);
                let sizes: Vec<usize> = partitions.iter().map(|p| p.iter().sum()).collect();
                let split_info = entropy(&sizes);
                if gain <= 1e-9 || split_info <= 1e-9 {
                    return None;
                }

                Some(Split {
                    attr,
                    gain,
                    gain_ratio: gain / split_info,
                    threshold,
                })
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }
        let average_gain = candidates.iter().map(|s| s.gain).sum::<f64>() / candidates.len() as f64;

        candidates
            .into_iter()
            .filter(|s| s.gain >= average_gain - 1e-9)
            .max_by(|a, b| a.gain_ratio.total_cmp(&b.gain_ratio))
    }

    /// Class counts per nominal value, if at least two branches are big enough
    fn nominal_partitions(&self, known: &[&[Value]], attr: usize) -> Option<Vec<Vec<usize>>> {
        let num_values = self.data.attributes[attr].values().len();
        let mut partitions = vec![vec![0; self.num_classes]; num_values];
        for row in known {
            if let (Value::Nominal(v), Some(c)) = (row[attr], self.data.class_of(row)) {
                if v < num_values {
                    partitions[v][c] += 1;
                }
            }
        }

        let big_enough = partitions
            .iter()
            .filter(|p| p.iter().sum::<usize>() >= self.config.min_leaf)
            .count();
        (big_enough >= 2).then_some(partitions)
    }

    /// Best binary threshold on a numeric attribute.
    ///
    /// The threshold is the largest value on the left side, so the split
    /// reads `attr <= threshold`.
    fn best_threshold(
        &self,
        known: &[&[Value]],
        attr: usize,
        known_entropy: f64,
    ) -> Option<(Vec<Vec<usize>>, Option<f64>)> {
        let mut points: Vec<(f64, usize)> = known
            .iter()
            .filter_map(|r| match (r[attr], self.data.class_of(r)) {
                (Value::Numeric(v), Some(c)) => Some((v, c)),
                _ => None,
            })
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = points.len();
        let mut left = vec![0usize; self.num_classes];
        let mut right = vec![0usize; self.num_classes];
        for &(_, c) in &points {
            right[c] += 1;
        }

        let mut best: Option<(f64, f64, Vec<usize>, Vec<usize>)> = None;
        for i in 0..n.saturating_sub(1) {
            let (value, class) = points[i];
            left[class] += 1;
            right[class] -= 1;

            let left_n = i + 1;
            if points[i + 1].0 <= value
                || left_n < self.config.min_leaf
                || n - left_n < self.config.min_leaf
            {
                continue;
            }

            let weighted = left_n as f64 / n as f64 * entropy(&left)
                + (n - left_n) as f64 / n as f64 * entropy(&right);
            let gain = known_entropy - weighted;
            if best.as_ref().map_or(true, |(g, ..)| gain > *g) {
                best = Some((gain, value, left.clone(), right.clone()));
            }
        }

        best.map(|(_, threshold, l, r)| (vec![l, r], Some(threshold)))
    }
}

fn is_known(value: Value) -> bool {
    !matches!(value, Value::Missing)
}

/// Index of the largest count, lowest index on ties
fn majority(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .max_by_key(|&(i, &c)| (c, std::cmp::Reverse(i)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Shannon entropy (bits) of a count vector
fn entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Replace a split whose children are all leaves of the same class
fn collapse(node: Node) -> Node {
    let merged = match &node {
        Node::Leaf { .. } => None,
        Node::Threshold { children, .. } => merge_leaves(children.iter().map(|c| c.as_ref())),
        Node::Nominal { children, .. } => merge_leaves(children.iter()),
    };
    merged.unwrap_or(node)
}

fn merge_leaves<'a>(children: impl Iterator<Item = &'a Node>) -> Option<Node> {
    let mut class = None;
    let mut count = 0;
    let mut errors = 0;
    for child in children {
        let Node::Leaf {
            class: c,
            count: n,
            errors: e,
        } = child
        else {
            return None;
        };
        if *n > 0 {
            if class.map_or(false, |k| k != *c) {
                return None;
            }
            class = Some(*c);
        }
        count += *n;
        errors += *e;
    }

    class.map(|class| Node::Leaf {
        class,
        count,
        errors,
    })
}

impl TreeModel {
    /// Header of the data the tree was fitted on
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn num_leaves(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Threshold { children, .. } => {
                    children.iter().map(Box::as_ref).map(walk).sum()
                }
                Node::Nominal { children, .. } => children.iter().map(walk).sum(),
            }
        }
        walk(&self.root)
    }

    pub fn size(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Threshold { children, .. } => {
                    1 + children.iter().map(Box::as_ref).map(walk).sum::<usize>()
                }
                Node::Nominal { children, .. } => 1 + children.iter().map(walk).sum::<usize>(),
            }
        }
        walk(&self.root)
    }

    fn class_name(&self, class: usize) -> &str {
        self.attributes
            .last()
            .and_then(|a| a.values().get(class))
            .map(String::as_str)
            .unwrap_or("?")
    }

    fn write_leaf(&self, out: &mut String, class: usize, count: usize, errors: usize) {
        if errors > 0 {
            let _ = write!(out, ": {} ({}.0/{}.0)", self.class_name(class), count, errors);
        } else {
            let _ = write!(out, ": {} ({}.0)", self.class_name(class), count);
        }
    }

    fn write_node(&self, out: &mut String, node: &Node, depth: usize) {
        let branches: Vec<(String, &Node)> = match node {
            Node::Leaf {
                class,
                count,
                errors,
            } => {
                self.write_leaf(out, *class, *count, *errors);
                return;
            }
            Node::Threshold {
                attr,
                threshold,
                children,
                ..
            } => {
                let name = &self.attributes[*attr].name;
                let t = format_number(*threshold);
                vec![
                    (format!("{} <= {}", name, t), children[0].as_ref()),
                    (format!("{} > {}", name, t), children[1].as_ref()),
                ]
            }
            Node::Nominal { attr, children, .. } => {
                let attribute = &self.attributes[*attr];
                attribute
                    .values()
                    .iter()
                    .zip(children)
                    .map(|(value, child)| (format!("{} = {}", attribute.name, value), child))
                    .collect()
            }
        };

        for (label, child) in branches {
            out.push('\n');
            out.push_str(&"|   ".repeat(depth));
            out.push_str(&label);
            self.write_node(out, child, depth + 1);
        }
    }

    fn descend<'a>(&'a self, node: &'a Node, row: &[Value]) -> &'a Node {
        match node {
            Node::Leaf { .. } => node,
            Node::Threshold {
                attr,
                threshold,
                missing,
                children,
            } => {
                let branch = match row.get(*attr) {
                    Some(Value::Numeric(v)) => usize::from(*v > *threshold),
                    _ => *missing,
                };
                self.descend(&children[branch], row)
            }
            Node::Nominal {
                attr,
                missing,
                children,
            } => {
                let branch = match row.get(*attr) {
                    Some(Value::Nominal(v)) if *v < children.len() => *v,
                    _ => *missing,
                };
                self.descend(&children[branch], row)
            }
        }
    }
}

impl TrainedModel for TreeModel {
    fn describe(&self) -> String {
        let mut out = String::from("Decision tree\n------------------\n");
        if matches!(self.root, Node::Leaf { .. }) {
            out.push('\n');
        }
        self.write_node(&mut out, &self.root, 0);
        let _ = write!(
            out,
            "\n\nNumber of Leaves  : \t{}\n\nSize of the tree : \t{}\n",
            self.num_leaves(),
            self.size()
        );
        out
    }

    fn classify(&self, row: &[Value]) -> Option<String> {
        match self.descend(&self.root, row) {
            Node::Leaf { class, .. } => Some(self.class_name(*class).to_string()),
            _ => None,
        }
    }
}

/// Render a threshold without trailing zeros
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.6}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::dataset::WEATHER_ARFF;

    fn weather() -> Dataset {
        Dataset::parse_arff(WEATHER_ARFF).unwrap()
    }

    #[test]
    fn test_entropy() {
        assert_eq!(entropy(&[0, 0]), 0.0);
        assert_eq!(entropy(&[4, 0]), 0.0);
        assert!((entropy(&[5, 5]) - 1.0).abs() < 1e-12);
        assert!((entropy(&[9, 5]) - 0.940286).abs() < 1e-5);
    }

    #[test]
    fn test_majority_prefers_lowest_index_on_tie() {
        assert_eq!(majority(&[3, 3]), 0);
        assert_eq!(majority(&[1, 4, 2]), 1);
    }

    #[test]
    fn test_weather_tree_splits_on_outlook() {
        let model = DecisionTree::default().fit(&weather()).unwrap();
        let text = model.describe();

        assert!(text.starts_with("Decision tree"));
        assert!(text.contains("\noutlook = overcast: yes (4.0)"));
        assert!(text.contains("\n|   humidity <= 70: yes (2.0)"));
        assert!(text.contains("\n|   windy = TRUE: no (2.0)"));
        assert!(text.contains("Number of Leaves  : \t5"));
        assert!(text.contains("Size of the tree : \t8"));
        assert_eq!(model.num_leaves(), 5);
        assert_eq!(model.size(), 8);
    }

    #[test]
    fn test_weather_tree_fits_training_data() {
        let data = weather();
        let model = DecisionTree::default().fit(&data).unwrap();

        let correct = data
            .rows
            .iter()
            .filter(|row| {
                let expected = data.class_attribute().values()[data.class_of(row).unwrap()].clone();
                model.classify(row) == Some(expected)
            })
            .count();
        assert_eq!(correct, data.rows.len());
    }

    #[test]
    fn test_pure_dataset_is_single_leaf() {
        let arff = "@attribute x numeric\n@attribute y {a,b}\n@data\n1,a\n2,a\n3,a\n";
        let data = Dataset::parse_arff(arff).unwrap();
        let model = DecisionTree::default().fit(&data).unwrap();

        assert_eq!(model.num_leaves(), 1);
        assert_eq!(model.size(), 1);
        assert!(model.describe().contains(": a (3.0)"));
    }

    #[test]
    fn test_numeric_threshold_split() {
        let arff = "\
@attribute x numeric
@attribute y {low,high}
@data
1,low
2,low
3,low
10,high
11,high
12,high
";
        let data = Dataset::parse_arff(arff).unwrap();
        let model = DecisionTree::default().fit(&data).unwrap();
        let text = model.describe();

        assert!(text.contains("x <= 3: low (3.0)"));
        assert!(text.contains("x > 3: high (3.0)"));
        assert_eq!(
            model.classify(&[Value::Numeric(2.5), Value::Missing]),
            Some("low".to_string())
        );
        assert_eq!(
            model.classify(&[Value::Numeric(50.0), Value::Missing]),
            Some("high".to_string())
        );
    }

    #[test]
    fn test_missing_labels_are_ignored() {
        let arff = "@attribute x numeric\n@attribute y {a,b}\n@data\n1,?\n2,?\n";
        let data = Dataset::parse_arff(arff).unwrap();
        assert!(DecisionTree::default().fit(&data).is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(75.0), "75");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-0.125), "-0.125");
    }
}
