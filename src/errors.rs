use std::{
    error::Error,
    fmt::{Debug, Display},
};

#[derive(Debug)]
pub enum ConfigError {
    MissingParameter(String),
    UnknownViscosity(String),
    UnknownPreset(String),
    InvalidMeshExtent(usize, usize, usize),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingParameter(name) => {
                write!(f, "Missing required parameter in configuration: {}", name)
            }
            ConfigError::UnknownViscosity(name) => {
                write!(f, "Unknown type of artificial viscosity configured: {}", name)
            }
            ConfigError::UnknownPreset(name) => {
                write!(f, "Unknown initial conditions preset configured: {}", name)
            }
            ConfigError::InvalidMeshExtent(nx, ny, nz) => {
                write!(f, "Invalid mesh extent configured: {}x{}x{}", nx, ny, nz)
            }
        }
    }
}

impl Error for ConfigError {}
