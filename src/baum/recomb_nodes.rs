use crate::baum::node_map::NodeMap;

/**
 * Node-pair frontier for the recombination-augmented levels. In addition
 * to the per-pair accumulated values, the frontier maintains the row sums
 * over the first node, the column sums over the second node, and the grand
 * total, which the mixed transition formula consumes directly.
 */
#[derive(Debug, Clone)]
pub struct RecombNodes {
    pairs: NodeMap<2>,
    node1_sums: NodeMap<1>,
    node2_sums: NodeMap<1>,
    total: f32,
}

impl RecombNodes {
    pub fn new() -> RecombNodes {
        RecombNodes {
            pairs: NodeMap::new(),
            node1_sums: NodeMap::new(),
            node2_sums: NodeMap::new(),
            total: 0.0,
        }
    }

    pub fn with_capacity(min_entries: usize) -> RecombNodes {
        RecombNodes {
            pairs: NodeMap::with_capacity(min_entries),
            node1_sums: NodeMap::with_capacity(min_entries),
            node2_sums: NodeMap::with_capacity(min_entries),
            total: 0.0,
        }
    }

    pub fn sum_update(&mut self, node1: u32, node2: u32, value: f32) {
        self.pairs.sum_update([node1, node2], value);
        self.node1_sums.sum_update([node1], value);
        self.node2_sums.sum_update([node2], value);
        self.total += value;
    }

    pub fn value(&self, node1: u32, node2: u32) -> f32 {
        self.pairs.value([node1, node2])
    }

    /**
     * Sum of values over all pairs whose first node is node1.
     */
    pub fn sum_node1(&self, node1: u32) -> f32 {
        self.node1_sums.value([node1])
    }

    /**
     * Sum of values over all pairs whose second node is node2.
     */
    pub fn sum_node2(&self, node2: u32) -> f32 {
        self.node2_sums.value([node2])
    }

    /**
     * Sum of values over all pairs.
     */
    pub fn sum(&self) -> f32 {
        self.total
    }

    pub fn size(&self) -> usize {
        self.pairs.size()
    }

    pub fn enum_node1(&self, i: usize) -> u32 {
        self.pairs.enum_key(i)[0]
    }

    pub fn enum_node2(&self, i: usize) -> u32 {
        self.pairs.enum_key(i)[1]
    }

    pub fn enum_value(&self, i: usize) -> f32 {
        self.pairs.enum_value(i)
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.node1_sums.clear();
        self.node2_sums.clear();
        self.total = 0.0;
    }
}

impl Default for RecombNodes {
    fn default() -> RecombNodes {
        RecombNodes::new()
    }
}
