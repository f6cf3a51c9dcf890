use crate::algorithms::Algorithms;
use crate::finder::FileResolver;
use crate::store::DatasetStore;

/// External collaborators a reduction session works against: the dataset
/// registry, the file search service and the dataset operations.
pub struct Services {
    pub store: Box<dyn DatasetStore>,
    pub finder: Box<dyn FileResolver>,
    pub algorithms: Box<dyn Algorithms>,
}

impl Services {
    pub fn new(
        store: impl DatasetStore + 'static,
        finder: impl FileResolver + 'static,
        algorithms: impl Algorithms + 'static,
    ) -> Self {
        Self {
            store: Box::new(store),
            finder: Box::new(finder),
            algorithms: Box::new(algorithms),
        }
    }
}
