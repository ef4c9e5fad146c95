use super::GraphError;
use crate::core::models::structure::Structure;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector3;

/// One directed neighbor relation: the neighbor's atom index and the
/// displacement vector pointing from the central atom to it (minimum image
/// under periodic boundaries).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub displacement: Vector3<f64>,
}

/// Builds the per-atom neighbor lists of a structure within `cutoff`.
///
/// Open boundaries use a k-d tree; periodic axes use the minimum-image
/// convention, which is only valid while the cutoff sphere fits inside half
/// the cell. Cells narrower than that are rejected.
pub fn neighbor_lists(
    structure: &Structure,
    cutoff: f64,
) -> Result<Vec<Vec<Neighbor>>, GraphError> {
    if structure.is_empty() {
        return Err(GraphError::EmptyStructure);
    }
    if structure.is_periodic() {
        periodic_lists(structure, cutoff)
    } else {
        open_lists(structure, cutoff)
    }
}

fn open_lists(structure: &Structure, cutoff: f64) -> Result<Vec<Vec<Neighbor>>, GraphError> {
    let entries: Vec<[f64; 3]> = structure
        .positions
        .iter()
        .map(|p| [p.x, p.y, p.z])
        .collect();
    let tree: KdTree<f64, 3> = (&entries).into();
    let cutoff_sq = cutoff * cutoff;

    let mut lists = Vec::with_capacity(structure.len());
    for (i, pos) in structure.positions.iter().enumerate() {
        let mut neighbors = Vec::new();
        for hit in tree.within_unsorted::<SquaredEuclidean>(&[pos.x, pos.y, pos.z], cutoff_sq) {
            let j = hit.item as usize;
            if j == i {
                continue;
            }
            neighbors.push(Neighbor {
                index: j,
                displacement: structure.positions[j] - pos,
            });
        }
        neighbors.sort_unstable_by_key(|n| n.index);
        lists.push(neighbors);
    }
    Ok(lists)
}

fn periodic_lists(structure: &Structure, cutoff: f64) -> Result<Vec<Vec<Neighbor>>, GraphError> {
    let cell = structure.cell.ok_or(GraphError::MissingCell)?;
    let rows = [
        Vector3::new(cell[(0, 0)], cell[(0, 1)], cell[(0, 2)]),
        Vector3::new(cell[(1, 0)], cell[(1, 1)], cell[(1, 2)]),
        Vector3::new(cell[(2, 0)], cell[(2, 1)], cell[(2, 2)]),
    ];

    // Perpendicular width along each periodic axis: cell volume over the
    // area of the face spanned by the other two vectors.
    let volume = rows[0].dot(&rows[1].cross(&rows[2])).abs();
    for axis in 0..3 {
        if !structure.pbc[axis] {
            continue;
        }
        let face = rows[(axis + 1) % 3].cross(&rows[(axis + 2) % 3]).norm();
        if face == 0.0 || volume / face <= 2.0 * cutoff {
            return Err(GraphError::CellTooSmall { cutoff });
        }
    }

    let shift_range = |periodic: bool| if periodic { -1..=1 } else { 0..=0 };
    let cutoff_sq = cutoff * cutoff;
    let n = structure.len();
    let mut lists = vec![Vec::new(); n];

    for i in 0..n {
        let pos_i = structure.positions[i];
        for j in 0..n {
            let base = structure.positions[j] - pos_i;
            for sa in shift_range(structure.pbc[0]) {
                for sb in shift_range(structure.pbc[1]) {
                    for sc in shift_range(structure.pbc[2]) {
                        if i == j && sa == 0 && sb == 0 && sc == 0 {
                            continue;
                        }
                        let displacement = base
                            + rows[0] * sa as f64
                            + rows[1] * sb as f64
                            + rows[2] * sc as f64;
                        if displacement.norm_squared() <= cutoff_sq {
                            lists[i].push(Neighbor {
                                index: j,
                                displacement,
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(lists)
}
