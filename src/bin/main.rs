use std::{error::Error, fs, path};

use clap::Parser;
use glam::DVec3;
use yaml_rust::YamlLoader;

use ale_hydro::{
    AleSolver, ArtificialViscosity, ConfigError, EdgeViscosity, EquationOfState, HydroState,
    NoViscosity, PolyMesh, CFL,
};

#[derive(Parser)]
struct Cli {
    /// The path to the config file to read
    #[clap(parse(from_os_str))]
    config: path::PathBuf,
}

fn uniform(_centroid: DVec3) -> (f64, f64) {
    (1., 1.)
}

/// A hot ball of gas in a cold uniform background, centred in the box.
fn hotspot(centroid: DVec3, box_size: DVec3) -> (f64, f64) {
    let distance = (centroid - 0.5 * box_size).length();
    let energy = if distance < 0.25 * box_size.min_element() {
        10.
    } else {
        1.
    };
    (1., energy)
}

/// Two slabs of gas at different pressures, split along x.
fn two_state(centroid: DVec3, box_size: DVec3) -> (f64, f64) {
    if centroid.x < 0.5 * box_size.x {
        (1., 2.5)
    } else {
        (0.125, 2.)
    }
}

fn initial_conditions(
    preset: &str,
    mesh: &PolyMesh,
    box_size: DVec3,
) -> Result<(Vec<f64>, Vec<f64>), ConfigError> {
    let profile: Box<dyn Fn(DVec3) -> (f64, f64)> = match preset {
        "uniform" => Box::new(uniform),
        "hotspot" => Box::new(move |c| hotspot(c, box_size)),
        "two_state" => Box::new(move |c| two_state(c, box_size)),
        _ => return Err(ConfigError::UnknownPreset(preset.to_string())),
    };

    let mut density = Vec::with_capacity(mesh.n_cells);
    let mut energy = Vec::with_capacity(mesh.n_cells);
    for cell in 0..mesh.n_cells {
        let (rho, e) = profile(mesh.centroids[cell]);
        density.push(rho);
        energy.push(e);
    }
    Ok((density, energy))
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    // parse command line parameters
    let args = Cli::parse();

    // read configuration
    let docs = YamlLoader::load_from_str(&fs::read_to_string(args.config)?)?;
    let config = &docs[0];

    let nx = config["mesh"]["nx"].as_i64().unwrap_or(10) as usize;
    let ny = config["mesh"]["ny"].as_i64().unwrap_or(10) as usize;
    let nz = config["mesh"]["nz"].as_i64().unwrap_or(10) as usize;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(ConfigError::InvalidMeshExtent(nx, ny, nz).into());
    }
    let cell_size = config["mesh"]["cell_size"].as_f64().unwrap_or(1.);
    let preset = config["initial_conditions"]["preset"]
        .as_str()
        .ok_or_else(|| ConfigError::MissingParameter("initial_conditions:preset".to_string()))?
        .to_string();
    let gamma = config["equation_of_state"]["gamma"]
        .as_f64()
        .unwrap_or(5. / 3.);
    let cfl_criterion = config["time_integration"]["cfl_criterion"]
        .as_f64()
        .unwrap_or(CFL);
    let dt_max = config["time_integration"]["dt_max"]
        .as_f64()
        .ok_or_else(|| ConfigError::MissingParameter("time_integration:dt_max".to_string()))?;
    let t_end = config["time_integration"]["t_end"]
        .as_f64()
        .ok_or_else(|| ConfigError::MissingParameter("time_integration:t_end".to_string()))?;
    let t_status = config["engine"]["t_status"].as_f64().unwrap_or(t_end / 10.);

    let viscosity_kind = config["viscosity"]["type"].as_str().unwrap_or("edge");
    let viscosity: Box<dyn ArtificialViscosity> = match viscosity_kind {
        "none" => Box::new(NoViscosity),
        "edge" => Box::new(EdgeViscosity {
            coeff1: config["viscosity"]["coeff1"].as_f64().unwrap_or(0.5),
            coeff2: config["viscosity"]["coeff2"].as_f64().unwrap_or(0.75),
        }),
        _ => return Err(ConfigError::UnknownViscosity(viscosity_kind.to_string()).into()),
    };

    // Setup simulation
    let mut mesh = PolyMesh::rectilinear(nx, ny, nz, DVec3::splat(cell_size));
    let box_size = DVec3::new(
        nx as f64 * cell_size,
        ny as f64 * cell_size,
        nz as f64 * cell_size,
    );
    let (density, energy) = initial_conditions(&preset, &mesh, box_size)?;
    let mut state = HydroState::new(&mesh, &density, &energy);
    let eos = EquationOfState::ideal(gamma);
    let mut solver = AleSolver::new(eos, viscosity, cfl_criterion, dt_max);
    solver.initialise(&mesh, &mut state);

    // run
    let mut next_status = 0.;
    while solver.time() < t_end {
        if solver.time() >= next_status {
            log::info!(
                "t = {:.6e}, step = {}, dt = {:.6e}, internal energy = {:.6e}",
                solver.time(),
                solver.step_count(),
                solver.dt(),
                state.total_internal_energy()
            );
            next_status += t_status;
        }
        solver.step(&mut mesh, &mut state);
    }
    log::info!(
        "finished after {} steps at t = {:.6e}",
        solver.step_count(),
        solver.time()
    );

    println!("Done!");
    Ok(())
}
