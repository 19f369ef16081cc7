use std::sync::Arc;

use indexmap::IndexSet;

use crate::errors::HmmError;

/**
 * An immutable ordered list of sample identifiers with index lookup.
 * Cloning is cheap, the backing data is shared.
 */
#[derive(Debug, Clone)]
pub struct Samples {
    ids: Arc<IndexSet<String>>,
}

impl Samples {
    pub fn new(ids: Vec<String>) -> Result<Samples, HmmError> {
        let n = ids.len();
        let set: IndexSet<String> = ids.into_iter().collect();
        if set.len() != n {
            return Err(HmmError::InconsistentInputs {
                msg: "duplicate sample identifier".to_string(),
            });
        }
        Ok(Samples { ids: Arc::new(set) })
    }

    pub fn n_samples(&self) -> usize {
        self.ids.len()
    }

    pub fn id(&self, sample: usize) -> &str {
        self.ids
            .get_index(sample)
            .unwrap_or_else(|| panic!("sample index out of bounds: {}", sample))
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ids.get_index_of(id)
    }
}

impl PartialEq for Samples {
    fn eq(&self, other: &Samples) -> bool {
        Arc::ptr_eq(&self.ids, &other.ids) || self.ids.as_ref() == other.ids.as_ref()
    }
}

impl Eq for Samples {}
