use std::path::PathBuf;

use clap::Parser;
use glam::DVec3;

use crate::sdf::{SdfExpr, scenes};

/// Built-in demo scene meshed by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scene {
    #[value(name = "sphere")]
    Sphere,
    #[value(name = "two-spheres")]
    TwoSpheres,
    #[value(name = "plane")]
    Plane,
    #[value(name = "gyroid")]
    Gyroid,
}

impl Scene {
    /// Construct the scene's signed-distance field.
    pub fn field(&self) -> SdfExpr {
        match self {
            Scene::Sphere => scenes::sphere(DVec3::ZERO, 1.0),
            Scene::TwoSpheres => scenes::two_spheres(),
            Scene::Plane => scenes::half_space(DVec3::new(0.2, 1.0, 0.1), 0.0),
            Scene::Gyroid => scenes::gyroid(3.0, 0.3),
        }
    }
}

impl std::fmt::Display for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scene::Sphere => write!(f, "sphere"),
            Scene::TwoSpheres => write!(f, "two-spheres"),
            Scene::Plane => write!(f, "plane"),
            Scene::Gyroid => write!(f, "gyroid"),
        }
    }
}

/// Parameters of one meshing run.
#[derive(Debug, Clone)]
pub struct BuildParams {
    /// Center of the cubic root cell.
    pub root_center: DVec3,
    /// Side length of the root cell.
    pub root_size: f64,
    /// Cells stop subdividing once their quarter-size drops to this.
    pub min_size: f64,
    /// Hard upper bound on octree cells; exceeding it aborts the build.
    pub cell_budget: usize,
    /// Project vertices onto the true isosurface after extraction.
    pub optimize: bool,
    /// Split edges whose midpoints stray from the surface.
    pub refine: bool,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            root_center: DVec3::ZERO,
            root_size: 4.0,
            min_size: 0.025,
            cell_budget: 100_000,
            optimize: true,
            refine: false,
        }
    }
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "sdf-mesher",
    about = "Signed distance function to watertight triangle mesh converter",
    version
)]
pub struct CliArgs {
    /// Built-in scene to mesh
    #[arg(short = 's', long, value_enum, default_value = "sphere")]
    pub scene: Scene,

    /// Output OBJ path
    #[arg(short = 'o', long, default_value = "mesh.obj")]
    pub output: PathBuf,

    /// Side length of the cubic root cell
    #[arg(long, default_value_t = 4.0)]
    pub root_size: f64,

    /// Finest cell size the octree refines to
    #[arg(long, default_value_t = 0.025)]
    pub min_size: f64,

    /// Hard limit on the number of octree cells
    #[arg(long, default_value_t = 100_000)]
    pub cell_budget: usize,

    /// Skip gradient projection of vertices onto the surface
    #[arg(long)]
    pub no_optimize: bool,

    /// Refine edges whose midpoints stray from the surface
    #[arg(long)]
    pub refine: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub stats_json: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl From<&CliArgs> for BuildParams {
    fn from(args: &CliArgs) -> Self {
        BuildParams {
            root_center: DVec3::ZERO,
            root_size: args.root_size,
            min_size: args.min_size,
            cell_budget: args.cell_budget,
            optimize: !args.no_optimize,
            refine: args.refine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_build_params() {
        let p = BuildParams::default();
        assert_eq!(p.root_center, DVec3::ZERO);
        assert_eq!(p.root_size, 4.0);
        assert_eq!(p.min_size, 0.025);
        assert_eq!(p.cell_budget, 100_000);
        assert!(p.optimize);
        assert!(!p.refine);
    }

    #[test]
    fn scene_display() {
        assert_eq!(Scene::Sphere.to_string(), "sphere");
        assert_eq!(Scene::TwoSpheres.to_string(), "two-spheres");
        assert_eq!(Scene::Plane.to_string(), "plane");
        assert_eq!(Scene::Gyroid.to_string(), "gyroid");
    }

    #[test]
    fn scene_fields_have_the_right_sign_at_origin() {
        assert!(Scene::Sphere.field().evaluate(DVec3::ZERO) < 0.0);
        assert!(Scene::TwoSpheres.field().evaluate(DVec3::ZERO) < 0.0);
        assert!(Scene::Plane.field().evaluate(DVec3::new(0.0, 2.0, 0.0)) > 0.0);
    }

    #[test]
    fn cli_args_to_build_params() {
        let args = CliArgs::parse_from([
            "sdf-mesher",
            "-s",
            "two-spheres",
            "-o",
            "./out.obj",
            "--root-size",
            "8",
            "--min-size",
            "0.1",
            "--cell-budget",
            "50000",
            "--no-optimize",
            "--refine",
            "--stats-json",
            "-v",
        ]);

        assert_eq!(args.scene, Scene::TwoSpheres);
        assert_eq!(args.output, PathBuf::from("./out.obj"));
        assert!(args.stats_json);
        assert!(args.verbose);

        let params: BuildParams = (&args).into();
        assert_eq!(params.root_size, 8.0);
        assert_eq!(params.min_size, 0.1);
        assert_eq!(params.cell_budget, 50_000);
        assert!(!params.optimize);
        assert!(params.refine);
    }

    #[test]
    fn cli_args_minimal() {
        let args = CliArgs::parse_from(["sdf-mesher"]);
        assert_eq!(args.scene, Scene::Sphere);
        assert_eq!(args.output, PathBuf::from("mesh.obj"));
        assert!(!args.verbose);

        let params: BuildParams = (&args).into();
        assert!(params.optimize);
        assert!(!params.refine);
        assert_eq!(params.cell_budget, 100_000);
    }
}
