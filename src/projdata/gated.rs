use std::path::Path;
use std::sync::Arc;

use super::{ProjData, ProjDataError, ProjDataInfo};

/// Per-gate projection data, in gate order. All gates share one bin geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct GatedProjData {
    gates: Vec<ProjData>,
}

impl GatedProjData {

    pub fn new(gates: Vec<ProjData>) -> Result<Self, ProjDataError> {
        let first = gates.first().ok_or(ProjDataError::NoGates)?;
        if let Some(gate) = gates.iter().position(|g| !g.has_same_geometry(first)) {
            return Err(ProjDataError::GateGeometryMismatch { gate });
        }
        Ok(Self { gates })
    }

    /// `num_gates` copies of a constant dataset
    pub fn filled(info: Arc<ProjDataInfo>, num_gates: usize, value: f32) -> Result<Self, ProjDataError> {
        Self::new(vec![ProjData::filled(info, value); num_gates])
    }

    /// Read gates `1..=num_gates` from `{prefix}_g{n}.raw`
    pub fn read_raw(info: Arc<ProjDataInfo>, prefix: &Path, num_gates: usize) -> Result<Self, ProjDataError> {
        let gates = (1..=num_gates)
            .map(|n| ProjData::read_raw(info.clone(), &gate_file(prefix, n)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(gates)
    }

    pub fn write_raw(&self, prefix: &Path) -> std::io::Result<()> {
        for (n, gate) in self.gates.iter().enumerate() {
            gate.write_raw(&gate_file(prefix, n + 1))?;
        }
        Ok(())
    }

    pub fn num_gates(&self) -> usize { self.gates.len() }

    pub fn gate(&self, i: usize) -> &ProjData { &self.gates[i] }

    pub fn info(&self) -> &Arc<ProjDataInfo> { self.gates[0].info() }

    pub fn iter(&self) -> impl Iterator<Item = &ProjData> { self.gates.iter() }

    pub fn has_same_geometry(&self, other: &GatedProjData) -> bool { self.info() == other.info() }
}

/// `{prefix}_g{n}`
pub fn gate_file_stem(prefix: &Path, n: usize) -> std::path::PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!("_g{n}"));
    name.into()
}

/// `{prefix}_g{n}.raw`
pub fn gate_file(prefix: &Path, n: usize) -> std::path::PathBuf {
    let mut name = gate_file_stem(prefix, n).into_os_string();
    name.push(".raw");
    name.into()
}
