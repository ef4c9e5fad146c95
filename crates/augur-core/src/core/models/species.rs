use super::structure::Structure;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SpeciesError {
    #[error("Species table is empty")]
    Empty,
    #[error("Duplicate atomic number in species table: {0}")]
    Duplicate(u32),
    #[error("Structure contains species Z={0} the model was not trained on")]
    Unknown(u32),
}

/// The ordered list of atomic numbers a model was trained on.
///
/// The model identifies species by their index in this table, not by atomic
/// number, so the table saved alongside the checkpoint must be used verbatim
/// at evaluation time. Structures containing species outside the table
/// cannot be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesTable {
    species: Vec<u32>,
    index: HashMap<u32, usize>,
}

impl SpeciesTable {
    /// Builds a table from the atomic numbers stored with the checkpoint.
    ///
    /// The order is preserved as saved; it defines the model's species
    /// indices and the layout of the self-contribution coefficients.
    pub fn new(species: Vec<u32>) -> Result<Self, SpeciesError> {
        if species.is_empty() {
            return Err(SpeciesError::Empty);
        }
        let mut index = HashMap::with_capacity(species.len());
        for (i, &z) in species.iter().enumerate() {
            if index.insert(z, i).is_some() {
                return Err(SpeciesError::Duplicate(z));
            }
        }
        Ok(Self { species, index })
    }

    /// The number of species the model distinguishes.
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// Returns `true` if the table holds no species. Unreachable after
    /// construction; present for API completeness.
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// The atomic numbers in table order.
    pub fn atomic_numbers(&self) -> &[u32] {
        &self.species
    }

    /// The model index of an atomic number.
    pub fn index_of(&self, atomic_number: u32) -> Result<usize, SpeciesError> {
        self.index
            .get(&atomic_number)
            .copied()
            .ok_or(SpeciesError::Unknown(atomic_number))
    }

    /// The compositional feature vector of a structure: per-species atom
    /// counts in table order.
    pub fn compositional_features(&self, structure: &Structure) -> Result<Vec<f64>, SpeciesError> {
        let mut features = vec![0.0; self.species.len()];
        for &z in &structure.atomic_numbers {
            features[self.index_of(z)?] += 1.0;
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn table() -> SpeciesTable {
        SpeciesTable::new(vec![1, 6, 8]).unwrap()
    }

    #[test]
    fn index_follows_saved_order() {
        let t = table();
        assert_eq!(t.len(), 3);
        assert_eq!(t.index_of(1), Ok(0));
        assert_eq!(t.index_of(6), Ok(1));
        assert_eq!(t.index_of(8), Ok(2));
    }

    #[test]
    fn unknown_species_is_an_error() {
        assert_eq!(table().index_of(26), Err(SpeciesError::Unknown(26)));
    }

    #[test]
    fn duplicates_and_empty_tables_are_rejected() {
        assert_eq!(
            SpeciesTable::new(vec![1, 6, 1]),
            Err(SpeciesError::Duplicate(1))
        );
        assert_eq!(SpeciesTable::new(vec![]), Err(SpeciesError::Empty));
    }

    #[test]
    fn compositional_features_count_atoms_per_species() {
        let t = table();
        let s = Structure::new(
            vec![1, 1, 8],
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
        );
        assert_eq!(t.compositional_features(&s).unwrap(), vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn compositional_features_reject_foreign_species() {
        let t = table();
        let s = Structure::new(vec![79], vec![Point3::new(0.0, 0.0, 0.0)]);
        assert_eq!(
            t.compositional_features(&s),
            Err(SpeciesError::Unknown(79))
        );
    }
}
