use crate::engine::batch::GraphBatch;
use crate::engine::config::Hypers;
use crate::engine::error::EngineError;
use nalgebra::{Rotation3, Vector3};
use std::path::Path;
use tch::{CModule, Device, IValue, Kind, Tensor};
use tracing::info;

/// Predictions of one forward pass over one batch, already back in the
/// dataset's reference frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    /// Per-structure total energies in eV. Empty when energies are disabled.
    pub energies: Vec<f64>,
    /// Per-atom forces in eV/Angstrom. Empty when forces are disabled.
    pub forces: Vec<Vector3<f64>>,
}

/// A pretrained potential, deployed as a TorchScript archive.
///
/// The module is a pure function of its input dict; the harness owns graph
/// construction and orientation sampling. Inputs are the batch arrays as
/// named tensors, outputs a dict with `energies` and, when the checkpoint
/// was trained on them, `forces`.
pub struct PotentialModel {
    module: CModule,
    device: Device,
    use_energies: bool,
    use_forces: bool,
}

impl PotentialModel {
    /// Loads the scripted module from the checkpoint folder and puts it in
    /// eval mode on the best available device.
    pub fn load(path: &Path, hypers: &Hypers) -> Result<Self, EngineError> {
        let device = Device::cuda_if_available();
        info!(path = %path.display(), ?device, "Loading scripted model.");
        let mut module = CModule::load_on_device(path, device)?;
        module.set_eval();
        Ok(Self {
            module,
            device,
            use_energies: hypers.use_energies,
            use_forces: hypers.use_forces,
        })
    }

    /// Runs one forward pass over `batch` with every displacement rotated
    /// into `orientation`; predicted forces are rotated back before they
    /// are returned.
    pub fn predict(
        &self,
        batch: &GraphBatch,
        orientation: &Rotation3<f64>,
    ) -> Result<Prediction, EngineError> {
        let _no_grad = tch::no_grad_guard();
        let inputs = self.input_dict(batch, orientation);
        let output = self.module.forward_is(&[inputs])?;
        self.parse_output(output, batch, orientation)
    }

    fn input_dict(&self, batch: &GraphBatch, orientation: &Rotation3<f64>) -> IValue {
        let n = batch.n_atoms as i64;
        let m = batch.max_num as i64;
        let rotated = rotate_displacements(&batch.displacements, orientation);

        let entries = vec![
            (
                "central_species",
                Tensor::from_slice(&batch.central_species),
            ),
            (
                "neighbor_vectors",
                Tensor::from_slice(&rotated).reshape([n, m, 3]),
            ),
            (
                "neighbor_species",
                Tensor::from_slice(&batch.neighbor_species).reshape([n, m]),
            ),
            (
                "neighbor_index",
                Tensor::from_slice(&batch.neighbor_index).reshape([n, m]),
            ),
            ("mask", Tensor::from_slice(&batch.mask).reshape([n, m])),
            (
                "structure_index",
                Tensor::from_slice(&batch.structure_index),
            ),
        ];

        IValue::GenericDict(
            entries
                .into_iter()
                .map(|(key, tensor)| {
                    (
                        IValue::String(key.to_string()),
                        IValue::Tensor(tensor.to_device(self.device)),
                    )
                })
                .collect(),
        )
    }

    fn parse_output(
        &self,
        output: IValue,
        batch: &GraphBatch,
        orientation: &Rotation3<f64>,
    ) -> Result<Prediction, EngineError> {
        let IValue::GenericDict(pairs) = output else {
            return Err(EngineError::ModelOutput(
                "model must return a dict of tensors".to_string(),
            ));
        };

        let mut energies_tensor = None;
        let mut forces_tensor = None;
        for (key, value) in pairs {
            if let (IValue::String(key), IValue::Tensor(tensor)) = (key, value) {
                match key.as_str() {
                    "energies" => energies_tensor = Some(tensor),
                    "forces" => forces_tensor = Some(tensor),
                    _ => {}
                }
            }
        }

        let mut prediction = Prediction::default();

        if self.use_energies {
            let tensor = energies_tensor.ok_or_else(|| {
                EngineError::ModelOutput("output dict is missing 'energies'".to_string())
            })?;
            let energies = tensor_to_vec(&tensor)?;
            if energies.len() != batch.n_structures {
                return Err(EngineError::ModelOutput(format!(
                    "expected {} energies, model returned {}",
                    batch.n_structures,
                    energies.len()
                )));
            }
            prediction.energies = energies;
        }

        if self.use_forces {
            let tensor = forces_tensor.ok_or_else(|| {
                EngineError::ModelOutput("output dict is missing 'forces'".to_string())
            })?;
            let flat = tensor_to_vec(&tensor)?;
            if flat.len() != batch.n_atoms * 3 {
                return Err(EngineError::ModelOutput(format!(
                    "expected {} force components, model returned {}",
                    batch.n_atoms * 3,
                    flat.len()
                )));
            }
            let inverse = orientation.inverse();
            prediction.forces = flat
                .chunks_exact(3)
                .map(|f| inverse * Vector3::new(f[0], f[1], f[2]))
                .collect();
        }

        Ok(prediction)
    }
}

/// Applies `orientation` to every displacement vector, producing the f32
/// buffer the model consumes.
pub fn rotate_displacements(displacements: &[f64], orientation: &Rotation3<f64>) -> Vec<f32> {
    displacements
        .chunks_exact(3)
        .flat_map(|d| {
            let v = orientation * Vector3::new(d[0], d[1], d[2]);
            [v.x as f32, v.y as f32, v.z as f32]
        })
        .collect()
}

fn tensor_to_vec(tensor: &Tensor) -> Result<Vec<f64>, EngineError> {
    let flat = tensor
        .to_kind(Kind::Double)
        .to_device(Device::Cpu)
        .reshape([-1]);
    Vec::<f64>::try_from(&flat).map_err(EngineError::from)
}
