// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class taxonomy: ordered mapping from class index to label

use anyhow::{Context, Result};
use std::path::Path;

/// COCO class labels (80 classes), the default for stock YOLO exports
#[rustfmt::skip]
pub const COCO_CLASS_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat", "traffic light",
    "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog", "horse", "sheep", "cow",
    "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove", "skateboard", "surfboard",
    "tennis racket", "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard",
    "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase",
    "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Ordered class labels of a loaded model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTaxonomy {
    labels: Vec<String>,
}

impl ClassTaxonomy {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn coco() -> Self {
        Self::new(COCO_CLASS_LABELS)
    }

    /// Load labels from a text file, one label per line
    ///
    /// Blank lines are skipped; surrounding whitespace is trimmed.
    pub fn from_labels_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read labels file {}", path.display()))?;

        let labels: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if labels.is_empty() {
            anyhow::bail!("Labels file {} contains no labels", path.display());
        }

        Ok(Self { labels })
    }

    /// Parse the `names` metadata entry written by YOLO exporters
    ///
    /// The value is a dict literal such as `{0: 'person', 1: 'bicycle'}`.
    /// Indices must be contiguous from zero.
    pub fn from_names_metadata(raw: &str) -> Result<Self> {
        let body = raw
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| anyhow::anyhow!("names metadata is not a dict literal"))?;

        let mut entries: Vec<(usize, String)> = Vec::new();
        let mut chars = body.chars().peekable();

        loop {
            while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }

            let mut digits = String::new();
            while let Some(c) = chars.peek().copied() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            let index: usize = digits
                .parse()
                .with_context(|| format!("invalid class index near '{}'", digits))?;

            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            if chars.next() != Some(':') {
                anyhow::bail!("expected ':' after class index {}", index);
            }
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }

            let quote = match chars.next() {
                Some(q @ ('\'' | '"')) => q,
                _ => anyhow::bail!("expected quoted label for class index {}", index),
            };

            let mut label = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        label.push(escaped);
                    }
                } else if c == quote {
                    closed = true;
                    break;
                } else {
                    label.push(c);
                }
            }
            if !closed {
                anyhow::bail!("unterminated label for class index {}", index);
            }

            entries.push((index, label));
        }

        if entries.is_empty() {
            anyhow::bail!("names metadata contains no classes");
        }

        entries.sort_by_key(|(index, _)| *index);
        for (expected, (index, _)) in entries.iter().enumerate() {
            if *index != expected {
                anyhow::bail!(
                    "names metadata is not contiguous: expected index {}, found {}",
                    expected,
                    index
                );
            }
        }

        Ok(Self {
            labels: entries.into_iter().map(|(_, label)| label).collect(),
        })
    }

    /// Label for a class index, if the taxonomy has one
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}
