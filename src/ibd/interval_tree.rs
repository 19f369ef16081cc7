use crate::ibd::hap_segment::HapSegment;

/**
 * Centered interval tree over marker-index segments. Each node stores the
 * segments overlapping its center marker twice, sorted by start and by
 * end, so a point query touches only the segments that can contain the
 * query marker. The tree is immutable after construction.
 */
#[derive(Debug, Clone)]
pub struct CenteredIntervalTree {
    root: Option<Box<TreeNode>>,
    n_segments: usize,
}

#[derive(Debug, Clone)]
struct TreeNode {
    center: usize,
    by_start: Vec<HapSegment>,
    by_end: Vec<HapSegment>,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl CenteredIntervalTree {
    /**
     * @param n_markers the marker index range [0, n_markers) the segments
     * lie in
     */
    pub fn new(n_markers: usize, segments: Vec<HapSegment>) -> CenteredIntervalTree {
        assert!(n_markers > 0, "marker range must be nonempty");
        for segment in segments.iter() {
            assert!(
                segment.end() < n_markers,
                "segment end {} outside the marker range",
                segment.end()
            );
        }
        let n_segments = segments.len();
        let root = Self::build(0, n_markers - 1, segments);
        CenteredIntervalTree { root, n_segments }
    }

    fn build(lo: usize, hi: usize, segments: Vec<HapSegment>) -> Option<Box<TreeNode>> {
        if segments.is_empty() {
            return None;
        }
        let center = lo + (hi - lo) / 2;
        let mut here = Vec::new();
        let mut left_segments = Vec::new();
        let mut right_segments = Vec::new();
        for segment in segments {
            if segment.end() < center {
                left_segments.push(segment);
            } else if segment.start() > center {
                right_segments.push(segment);
            } else {
                here.push(segment);
            }
        }
        let mut by_start = here.clone();
        by_start.sort_by_key(|s| s.start());
        let mut by_end = here;
        by_end.sort_by_key(|s| std::cmp::Reverse(s.end()));
        let left = if center > lo {
            Self::build(lo, center - 1, left_segments)
        } else {
            None
        };
        let right = if center < hi {
            Self::build(center + 1, hi, right_segments)
        } else {
            None
        };
        Some(Box::new(TreeNode {
            center,
            by_start,
            by_end,
            left,
            right,
        }))
    }

    pub fn n_segments(&self) -> usize {
        self.n_segments
    }

    /**
     * Appends every segment containing marker to out.
     */
    pub fn intersect(&self, marker: usize, out: &mut Vec<HapSegment>) {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            if marker < n.center {
                for segment in n.by_start.iter() {
                    if segment.start() <= marker {
                        out.push(*segment);
                    } else {
                        break;
                    }
                }
                node = n.left.as_deref();
            } else if marker > n.center {
                for segment in n.by_end.iter() {
                    if segment.end() >= marker {
                        out.push(*segment);
                    } else {
                        break;
                    }
                }
                node = n.right.as_deref();
            } else {
                out.extend_from_slice(&n.by_start);
                break;
            }
        }
    }

    /**
     * True if any stored segment other than exclude overlaps the inclusive
     * marker range [start, end].
     */
    pub fn overlaps_other(&self, start: usize, end: usize, exclude: &HapSegment) -> bool {
        let mut found = false;
        Self::visit_overlaps(self.root.as_deref(), start, end, &mut |segment| {
            if segment != exclude {
                found = true;
            }
        });
        found
    }

    fn visit_overlaps(
        node: Option<&TreeNode>,
        start: usize,
        end: usize,
        visit: &mut dyn FnMut(&HapSegment),
    ) {
        let n = match node {
            Some(n) => n,
            None => return,
        };
        for segment in n.by_start.iter() {
            if segment.start() <= end {
                if segment.overlaps(start, end) {
                    visit(segment);
                }
            } else {
                break;
            }
        }
        if start < n.center {
            Self::visit_overlaps(n.left.as_deref(), start, end, visit);
        }
        if end > n.center {
            Self::visit_overlaps(n.right.as_deref(), start, end, visit);
        }
    }
}
