#[derive(Clone, Copy, Debug)]
pub enum EquationOfState {
    Ideal { gamma: f64 },
}

impl EquationOfState {
    pub fn ideal(gamma: f64) -> Self {
        EquationOfState::Ideal { gamma }
    }

    pub fn gamma(&self) -> f64 {
        match self {
            EquationOfState::Ideal { gamma } => *gamma,
        }
    }

    /// Ideal gas law: `p = (gamma - 1) rho e`, with `e` the specific internal energy.
    pub fn gas_pressure_from_energy(&self, energy: f64, density: f64) -> f64 {
        match self {
            EquationOfState::Ideal { gamma } => (gamma - 1.) * energy * density,
        }
    }

    /// Adiabatic sound speed expressed in the specific internal energy.
    pub fn sound_speed_from_energy(&self, energy: f64) -> f64 {
        match self {
            EquationOfState::Ideal { gamma } => (gamma * (gamma - 1.) * energy).sqrt(),
        }
    }

    pub fn gas_energy_from_pressure(&self, pressure: f64, density: f64) -> f64 {
        match self {
            EquationOfState::Ideal { gamma } => pressure / ((gamma - 1.) * density),
        }
    }
}
