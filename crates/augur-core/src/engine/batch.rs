use crate::core::graph::NeighborGraph;

/// Several neighbor graphs packed along the atom axis.
///
/// Neighbor indices are re-based to batch-local atom numbering and
/// `structure_index` records which structure each atom came from, so the
/// model can segment per-structure reductions. Every graph in a batch must
/// share the same `max_num` padding width.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphBatch {
    pub n_structures: usize,
    pub n_atoms: usize,
    pub max_num: usize,
    pub central_species: Vec<i64>,
    pub displacements: Vec<f64>,
    pub neighbor_species: Vec<i64>,
    pub neighbor_index: Vec<i64>,
    pub mask: Vec<bool>,
    pub structure_index: Vec<i64>,
}

impl GraphBatch {
    pub fn pack(graphs: &[NeighborGraph]) -> Self {
        let max_num = graphs.first().map_or(0, |g| g.max_num);
        debug_assert!(graphs.iter().all(|g| g.max_num == max_num));

        let n_atoms: usize = graphs.iter().map(|g| g.n_atoms).sum();
        let mut batch = Self {
            n_structures: graphs.len(),
            n_atoms,
            max_num,
            central_species: Vec::with_capacity(n_atoms),
            displacements: Vec::with_capacity(n_atoms * max_num * 3),
            neighbor_species: Vec::with_capacity(n_atoms * max_num),
            neighbor_index: Vec::with_capacity(n_atoms * max_num),
            mask: Vec::with_capacity(n_atoms * max_num),
            structure_index: Vec::with_capacity(n_atoms),
        };

        let mut atom_base = 0i64;
        for (structure, graph) in graphs.iter().enumerate() {
            batch
                .central_species
                .extend_from_slice(&graph.central_species);
            batch.displacements.extend_from_slice(&graph.displacements);
            batch
                .neighbor_species
                .extend_from_slice(&graph.neighbor_species);
            batch.mask.extend_from_slice(&graph.mask);
            // Padded slots keep index 0 within their own structure so every
            // entry stays a valid row of the batch.
            batch.neighbor_index.extend(
                graph
                    .neighbor_index
                    .iter()
                    .map(|&index| index + atom_base),
            );
            batch
                .structure_index
                .extend(std::iter::repeat_n(structure as i64, graph.n_atoms));
            atom_base += graph.n_atoms as i64;
        }
        batch
    }
}

/// Splits the dataset's graphs into batches of at most `batch_size`
/// structures, preserving order.
pub fn make_batches(graphs: &[NeighborGraph], batch_size: usize) -> Vec<GraphBatch> {
    graphs.chunks(batch_size).map(GraphBatch::pack).collect()
}
