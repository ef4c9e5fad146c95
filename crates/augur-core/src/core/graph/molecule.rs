use super::GraphError;
use super::neighbors::{Neighbor, neighbor_lists};
use crate::core::models::species::SpeciesTable;
use crate::core::models::structure::Structure;

/// The variable-length neighbor representation of one structure.
///
/// A `Molecule` resolves atomic numbers to model species indices and holds
/// the raw neighbor lists. It is the intermediate between a parsed
/// [`Structure`] and the padded [`NeighborGraph`] the model consumes; the
/// padding width is a dataset-wide property, so it cannot be chosen here.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    species_indices: Vec<usize>,
    neighbors: Vec<Vec<Neighbor>>,
}

impl Molecule {
    /// Builds the neighbor lists of `structure` within `cutoff` and resolves
    /// every atom against the model's species table.
    pub fn build(
        structure: &Structure,
        cutoff: f64,
        species: &SpeciesTable,
    ) -> Result<Self, GraphError> {
        let species_indices = structure
            .atomic_numbers
            .iter()
            .map(|&z| species.index_of(z))
            .collect::<Result<Vec<_>, _>>()?;
        let neighbors = neighbor_lists(structure, cutoff)?;
        Ok(Self {
            species_indices,
            neighbors,
        })
    }

    /// The number of atoms.
    pub fn len(&self) -> usize {
        self.species_indices.len()
    }

    /// Returns `true` if the molecule has no atoms. Unreachable after
    /// construction; present for API completeness.
    pub fn is_empty(&self) -> bool {
        self.species_indices.is_empty()
    }

    /// The largest neighbor count of any atom; the dataset maximum of this
    /// value is the padding width shared by all graphs.
    pub fn max_neighbors(&self) -> usize {
        self.neighbors.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Produces the fixed-size graph, padded to `max_num` neighbor slots.
    ///
    /// `max_num` must be at least [`Self::max_neighbors`]; slots beyond an
    /// atom's real neighbor count are zero-filled and masked out.
    pub fn to_graph(&self, max_num: usize) -> NeighborGraph {
        debug_assert!(max_num >= self.max_neighbors());
        let n_atoms = self.len();

        let mut graph = NeighborGraph {
            n_atoms,
            max_num,
            central_species: self.species_indices.iter().map(|&s| s as i64).collect(),
            displacements: vec![0.0; n_atoms * max_num * 3],
            neighbor_species: vec![0; n_atoms * max_num],
            neighbor_index: vec![0; n_atoms * max_num],
            mask: vec![false; n_atoms * max_num],
        };

        for (i, neighbors) in self.neighbors.iter().enumerate() {
            for (slot, neighbor) in neighbors.iter().enumerate() {
                let flat = i * max_num + slot;
                graph.displacements[flat * 3] = neighbor.displacement.x;
                graph.displacements[flat * 3 + 1] = neighbor.displacement.y;
                graph.displacements[flat * 3 + 2] = neighbor.displacement.z;
                graph.neighbor_species[flat] = self.species_indices[neighbor.index] as i64;
                graph.neighbor_index[flat] = neighbor.index as i64;
                graph.mask[flat] = true;
            }
        }
        graph
    }
}

/// The fixed-size neighbor graph of one structure.
///
/// All per-neighbor arrays are `[n_atoms, max_num]` row-major (displacements
/// carry a trailing xyz axis); `mask` marks the slots holding real
/// neighbors. Graphs of one dataset share `max_num` so they stack into
/// rectangular batch tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborGraph {
    pub n_atoms: usize,
    pub max_num: usize,
    /// Model species index of each central atom, `[n_atoms]`.
    pub central_species: Vec<i64>,
    /// Neighbor displacement vectors, `[n_atoms, max_num, 3]` flattened.
    pub displacements: Vec<f64>,
    /// Model species index of each neighbor slot, `[n_atoms, max_num]`.
    pub neighbor_species: Vec<i64>,
    /// Within-structure atom index of each neighbor slot, `[n_atoms, max_num]`.
    pub neighbor_index: Vec<i64>,
    /// `true` where a slot holds a real neighbor, `[n_atoms, max_num]`.
    pub mask: Vec<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::species::SpeciesError;
    use nalgebra::Point3;

    fn species() -> SpeciesTable {
        SpeciesTable::new(vec![1, 8]).unwrap()
    }

    fn water() -> Structure {
        Structure::new(
            vec![8, 1, 1],
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.96, 0.0, 0.0),
                Point3::new(-0.24, 0.93, 0.0),
            ],
        )
    }

    #[test]
    fn build_resolves_species_indices() {
        let m = Molecule::build(&water(), 5.0, &species()).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.max_neighbors(), 2);
    }

    #[test]
    fn foreign_species_fail_the_build() {
        let s = Structure::new(vec![79], vec![Point3::new(0.0, 0.0, 0.0)]);
        assert_eq!(
            Molecule::build(&s, 5.0, &species()).unwrap_err(),
            GraphError::Species(SpeciesError::Unknown(79))
        );
    }

    #[test]
    fn padding_is_masked_out() {
        let m = Molecule::build(&water(), 1.2, &species()).unwrap();
        // 1.2 A cutoff keeps both O-H bonds but drops the H-H pair.
        assert_eq!(m.max_neighbors(), 2);
        let graph = m.to_graph(4);

        assert_eq!(graph.n_atoms, 3);
        assert_eq!(graph.max_num, 4);
        assert_eq!(graph.central_species, vec![1, 0, 0]);

        // Oxygen sees both hydrogens; each hydrogen sees only the oxygen.
        let row_mask = |atom: usize| &graph.mask[atom * 4..(atom + 1) * 4];
        assert_eq!(row_mask(0), &[true, true, false, false]);
        assert_eq!(row_mask(1), &[true, false, false, false]);
        assert_eq!(row_mask(2), &[true, false, false, false]);

        // Padded slots stay zeroed.
        assert_eq!(graph.neighbor_species[2], 0);
        assert_eq!(graph.displacements[(0 * 4 + 2) * 3], 0.0);

        // The first slot of atom 1 points back at the oxygen.
        assert_eq!(graph.neighbor_index[4], 0);
        assert_eq!(graph.displacements[4 * 3], -0.96);
    }
}
