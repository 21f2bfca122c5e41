//! Lake geometry, physical parameters and methane sources.
use crate::errors::BasinError;
use serde::{Deserialize, Serialize};
use std::fs::File;

/// Seconds per day, converts the vertical exchange rate from m/s to m/d.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Converts volumetric rates in µmol/m³/d to µmol/l/d.
pub const PER_LITRE: f64 = 1e-3;

/// Planform of the basin.
///
/// A round basin is circularly symmetric, so the transport equation picks up a `1/r` curvature
/// term.  An elongated basin behaves like a channel and only feels the depth taper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum LakeKind {
    /// Circular symmetry.
    #[serde(alias = "R")]
    Round,
    /// Effectively one-dimensional channel.
    #[serde(alias = "E")]
    Elongated,
}

/// Struct for recording the physical characteristics of a lake basin.
///
/// Units follow field practice: lengths in m, `kh` in m²/d, `kch4` in m/d (divided by the local
/// depth to give a rate), `kz` in m/s, concentrations in µmol/l, `hcp` in µmol/l/Pa and `patm` in Pa.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Lake {
    radius: f64,
    mixed_depth: f64,
    inner_radius: f64,
    kind: LakeKind,
    kh: f64,
    kch4: f64,
    kz: f64,
    c_hyp: f64,
    hcp: f64,
    patm: f64,
}

pub(crate) fn positive(name: &str, val: f64) -> Result<f64, BasinError> {
    if val.is_finite() && val > 0.0 {
        Ok(val)
    } else {
        Err(BasinError::Config(format!("{} must be positive, got {}", name, val)))
    }
}

pub(crate) fn non_negative(name: &str, val: f64) -> Result<f64, BasinError> {
    if val.is_finite() && val >= 0.0 {
        Ok(val)
    } else {
        Err(BasinError::Config(format!("{} must be non-negative, got {}", name, val)))
    }
}

impl Lake {
    /// Create lakes using a builder pattern.  Calling new() creates a round lake of radius 500 m with
    /// a 5 m mixed layer tapering from 300 m, no vertical exchange and an equilibrium concentration of
    /// 0.1 µmol/l.
    ///
    /// # Examples
    /// ```
    /// use basins::prelude::*;
    /// let lake = Lake::new().radius(800.0)?.inner_radius(600.0)?;
    /// assert_eq!(lake.get_radius(), 800.0);
    /// # Ok::<(), BasinError>(())
    /// ```
    pub fn new() -> Self {
        Lake {
            radius: 500.0,
            mixed_depth: 5.0,
            inner_radius: 300.0,
            kind: LakeKind::Round,
            kh: 1000.0,
            kch4: 0.1,
            kz: 0.0,
            c_hyp: 0.0,
            hcp: 0.001,
            patm: 100.0,
        }
    }

    /// Assign the basin radius `R` in m.
    pub fn radius(mut self, val: f64) -> Result<Self, BasinError> {
        self.radius = positive("radius", val)?;
        Ok(self)
    }

    /// Assign the mixed-layer depth `Hsml` in m.
    pub fn mixed_depth(mut self, val: f64) -> Result<Self, BasinError> {
        self.mixed_depth = positive("mixed-layer depth", val)?;
        Ok(self)
    }

    /// Assign the inner radius `Rs` in m, inside which the mixed layer has constant depth.
    pub fn inner_radius(mut self, val: f64) -> Result<Self, BasinError> {
        self.inner_radius = non_negative("inner radius", val)?;
        Ok(self)
    }

    /// Assign the planform.
    pub fn kind(mut self, kind: LakeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Assign the horizontal diffusivity `Kh` in m²/d.
    pub fn kh(mut self, val: f64) -> Result<Self, BasinError> {
        self.kh = non_negative("horizontal diffusivity", val)?;
        Ok(self)
    }

    /// Assign the gas-exchange (oxidation) rate `Kch4` in m/d.
    pub fn kch4(mut self, val: f64) -> Result<Self, BasinError> {
        self.kch4 = non_negative("reaction rate", val)?;
        Ok(self)
    }

    /// Assign the vertical exchange rate `Kz` in m/s.
    pub fn kz(mut self, val: f64) -> Result<Self, BasinError> {
        self.kz = non_negative("vertical exchange rate", val)?;
        Ok(self)
    }

    /// Assign the hypolimnetic concentration `Chyp` in µmol/l.
    pub fn c_hyp(mut self, val: f64) -> Result<Self, BasinError> {
        self.c_hyp = non_negative("hypolimnetic concentration", val)?;
        Ok(self)
    }

    /// Assign Henry's-law solubility `Hcp` in µmol/l/Pa.
    pub fn hcp(mut self, val: f64) -> Result<Self, BasinError> {
        self.hcp = non_negative("Henry solubility", val)?;
        Ok(self)
    }

    /// Assign the atmospheric partial pressure of methane `Patm` in Pa.
    pub fn patm(mut self, val: f64) -> Result<Self, BasinError> {
        self.patm = non_negative("atmospheric partial pressure", val)?;
        Ok(self)
    }

    /// Basin radius `R` in m.
    pub fn get_radius(&self) -> f64 {
        self.radius
    }

    /// Mixed-layer depth `Hsml` in m.
    pub fn get_mixed_depth(&self) -> f64 {
        self.mixed_depth
    }

    /// Inner radius `Rs` in m.
    pub fn get_inner_radius(&self) -> f64 {
        self.inner_radius
    }

    /// Planform of the basin.
    pub fn get_kind(&self) -> LakeKind {
        self.kind
    }

    /// Horizontal diffusivity `Kh` in m²/d.
    pub fn get_kh(&self) -> f64 {
        self.kh
    }

    /// Gas-exchange rate `Kch4` in m/d.
    pub fn get_kch4(&self) -> f64 {
        self.kch4
    }

    /// Vertical exchange rate `Kz` in m/s.
    pub fn get_kz(&self) -> f64 {
        self.kz
    }

    /// Hypolimnetic concentration `Chyp` in µmol/l.
    pub fn get_c_hyp(&self) -> f64 {
        self.c_hyp
    }

    /// Concentration in equilibrium with the atmosphere, `Patm·Hcp`.
    pub fn equilibrium(&self) -> f64 {
        self.patm * self.hcp
    }

    /// True where the mixed layer sits over the flat inner basin.
    pub fn is_inner(&self, r: f64) -> bool {
        r <= self.inner_radius
    }

    /// Local slope of the depth taper; zero inside the inner radius.
    pub fn slope(&self, r: f64) -> f64 {
        if self.is_inner(r) {
            0.0
        } else {
            -self.mixed_depth / (self.radius - self.inner_radius)
        }
    }

    /// Mixed-layer depth at radius `r`, tapering linearly to zero at the shore.
    ///
    /// # Examples
    /// ```
    /// use basins::prelude::*;
    /// let lake = Lake::new();
    /// assert_eq!(lake.depth(100.0), 5.0);
    /// assert!((lake.depth(400.0) - 2.5).abs() < 1e-12);
    /// assert_eq!(lake.depth(500.0), 0.0);
    /// ```
    pub fn depth(&self, r: f64) -> f64 {
        if self.is_inner(r) {
            self.mixed_depth
        } else {
            self.slope(r) * (r - self.radius)
        }
    }

    /// Vertical exchange velocity in m/d at radius `r`, active only over the inner basin.
    pub fn exchange(&self, r: f64) -> f64 {
        if self.is_inner(r) {
            self.kz * SECONDS_PER_DAY
        } else {
            0.0
        }
    }

    /// Divergence factor of the radial operator, `1/r + slope/h` for round basins and `slope/h`
    /// for elongated ones.  Only defined for interior radii.
    pub fn divergence(&self, r: f64) -> f64 {
        let taper = self.slope(r) / self.depth(r);
        match self.kind {
            LakeKind::Round => 1.0 / r + taper,
            LakeKind::Elongated => taper,
        }
    }

    /// Check every parameter, as deserialized values skip the builder.
    pub fn validate(&self) -> Result<(), BasinError> {
        positive("radius", self.radius)?;
        positive("mixed-layer depth", self.mixed_depth)?;
        non_negative("inner radius", self.inner_radius)?;
        non_negative("horizontal diffusivity", self.kh)?;
        non_negative("reaction rate", self.kch4)?;
        non_negative("vertical exchange rate", self.kz)?;
        non_negative("hypolimnetic concentration", self.c_hyp)?;
        non_negative("Henry solubility", self.hcp)?;
        non_negative("atmospheric partial pressure", self.patm)?;
        Ok(())
    }

    /// Reads a single lake per row from a csv file with headers matching the field names.
    pub fn read(path: &str) -> Result<Vec<Lake>, BasinError> {
        let mut record = Vec::new();
        let var = File::open(path)?;
        let mut rdr = csv::Reader::from_reader(var);
        for result in rdr.deserialize() {
            let row: Lake = result?;
            row.validate()?;
            record.push(row);
        }
        Ok(record)
    }
}

impl Default for Lake {
    fn default() -> Self {
        Lake::new()
    }
}

/// One row of a bubble-dissolution table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct DissolutionRate {
    /// Radius from the basin centre in m.
    #[serde(rename = "Radius [m]")]
    pub radius: f64,
    /// Dissolution rate in µmol/m³/d.
    #[serde(rename = "Diss [micro-mol/m3/d]")]
    pub rate: f64,
}

/// Methane released by rising bubbles, tabulated against radius.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dissolution {
    table: Vec<DissolutionRate>,
}

impl Dissolution {
    /// Build a table from (radius, rate) pairs.  Rows are sorted by radius.
    pub fn new(pairs: &[(f64, f64)]) -> Result<Self, BasinError> {
        let rows = pairs
            .iter()
            .map(|&(radius, rate)| DissolutionRate { radius, rate })
            .collect::<Vec<DissolutionRate>>();
        Dissolution::from_rows(rows)
    }

    fn from_rows(mut table: Vec<DissolutionRate>) -> Result<Self, BasinError> {
        if table.is_empty() {
            return Err(BasinError::Config("dissolution table is empty".to_string()));
        }
        if table
            .iter()
            .any(|x| !x.radius.is_finite() || !x.rate.is_finite())
        {
            return Err(BasinError::Config(
                "dissolution table holds non-finite values".to_string(),
            ));
        }
        table.sort_by(|a, b| a.radius.total_cmp(&b.radius));
        Ok(Dissolution { table })
    }

    /// Read a dissolution table from csv with columns `Radius [m]` and `Diss [micro-mol/m3/d]`.
    pub fn read(path: &str) -> Result<Self, BasinError> {
        let mut rows = Vec::new();
        let var = File::open(path)?;
        let mut rdr = csv::Reader::from_reader(var);
        for result in rdr.deserialize() {
            let row: DissolutionRate = result?;
            rows.push(row);
        }
        Dissolution::from_rows(rows)
    }

    /// Nearest-neighbour rate at radius `r`, holding the end values beyond the table.
    ///
    /// # Examples
    /// ```
    /// use basins::prelude::*;
    /// let diss = Dissolution::new(&[(0.0, 1.0), (100.0, 3.0)])?;
    /// assert_eq!(diss.rate(40.0), 1.0);
    /// assert_eq!(diss.rate(50.0), 1.0);
    /// assert_eq!(diss.rate(60.0), 3.0);
    /// assert_eq!(diss.rate(900.0), 3.0);
    /// # Ok::<(), BasinError>(())
    /// ```
    pub fn rate(&self, r: f64) -> f64 {
        let upper = self.table.partition_point(|x| x.radius < r);
        if upper == 0 {
            return self.table[0].rate;
        }
        if upper == self.table.len() {
            return self.table[upper - 1].rate;
        }
        let below = &self.table[upper - 1];
        let above = &self.table[upper];
        if r - below.radius <= above.radius - r {
            below.rate
        } else {
            above.rate
        }
    }

    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True for a table without rows.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Methane sources feeding the mixed layer.
///
/// `sediment` is the areal flux from bottom sediments beyond the inner radius, `hypolimnion` an
/// areal flux from deep water inside it (added to the `Kz·Chyp` exchange), and `production` the
/// in-situ production rate in µmol/m³/d.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Sources {
    /// Sediment flux `Fsed`.
    pub sediment: f64,
    /// Direct hypolimnetic flux `Fhyp`.
    pub hypolimnion: f64,
    /// Production rate `OMP`, negative for net consumption.
    pub production: f64,
    /// Optional bubble-dissolution table.
    pub dissolution: Option<Dissolution>,
}

impl Sources {
    /// All sources off.
    pub fn new() -> Self {
        Sources::default()
    }

    /// Assign the sediment flux `Fsed`.
    pub fn sediment(mut self, val: f64) -> Self {
        self.sediment = val;
        self
    }

    /// Assign the direct hypolimnetic flux `Fhyp`.
    pub fn hypolimnion(mut self, val: f64) -> Self {
        self.hypolimnion = val;
        self
    }

    /// Assign the organic-matter production rate `OMP`.
    pub fn production(mut self, val: f64) -> Self {
        self.production = val;
        self
    }

    /// Attach a bubble-dissolution table.
    pub fn dissolution(mut self, table: Dissolution) -> Self {
        self.dissolution = Some(table);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_tapers_to_shore() {
        let lake = Lake::new();
        assert_eq!(lake.depth(0.0), 5.0);
        assert_eq!(lake.depth(300.0), 5.0);
        assert!((lake.depth(450.0) - 1.25).abs() < 1e-12);
        assert_eq!(lake.slope(200.0), 0.0);
        assert!((lake.slope(301.0) + 5.0 / 200.0).abs() < 1e-15);
    }

    #[test]
    fn exchange_only_over_inner_basin() {
        let lake = Lake::new().kz(1e-6).unwrap();
        assert!((lake.exchange(300.0) - 0.0864).abs() < 1e-12);
        assert_eq!(lake.exchange(300.5), 0.0);
    }

    #[test]
    fn divergence_by_kind() {
        let round = Lake::new();
        let long = Lake::new().kind(LakeKind::Elongated);
        assert!((round.divergence(100.0) - 0.01).abs() < 1e-15);
        assert_eq!(long.divergence(100.0), 0.0);
        let r = 400.0;
        assert!((round.divergence(r) - long.divergence(r) - 1.0 / r).abs() < 1e-15);
    }

    #[test]
    fn builders_reject_bad_values() {
        assert!(Lake::new().radius(0.0).is_err());
        assert!(Lake::new().mixed_depth(-1.0).is_err());
        assert!(Lake::new().kh(f64::NAN).is_err());
        assert!(Lake::new().kch4(-0.1).is_err());
    }

    #[test]
    fn read_checks_each_row() {
        let header = "radius,mixed_depth,inner_radius,kind,kh,kch4,kz,c_hyp,hcp,patm\n";
        let good = "500,5,300,R,1000,0.1,0,0,0.001,100\n";
        let bad = "500,-5,300,E,1000,0.1,0,0,0.001,100\n";
        let path = std::env::temp_dir().join("basins_lake_read_test.csv");
        let path = path.to_str().unwrap();

        std::fs::write(path, format!("{}{}", header, good)).unwrap();
        let lakes = Lake::read(path).unwrap();
        assert_eq!(lakes, vec![Lake::new()]);

        std::fs::write(path, format!("{}{}{}", header, good, bad)).unwrap();
        match Lake::read(path) {
            Err(BasinError::Config(msg)) => assert!(msg.contains("mixed-layer depth")),
            other => panic!("unexpected {:?}", other),
        }
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn validate_catches_fields_set_without_builder() {
        let mut lake = Lake::new();
        assert!(lake.validate().is_ok());
        lake.hcp = -0.001;
        assert!(lake.validate().is_err());
    }

    #[test]
    fn empty_dissolution_is_config_error() {
        match Dissolution::new(&[]) {
            Err(BasinError::Config(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn dissolution_sorts_rows() {
        let diss = Dissolution::new(&[(200.0, 2.0), (0.0, 0.5), (100.0, 1.0)]).unwrap();
        assert_eq!(diss.len(), 3);
        assert_eq!(diss.rate(-10.0), 0.5);
        assert_eq!(diss.rate(140.0), 1.0);
        assert_eq!(diss.rate(160.0), 2.0);
    }
}
