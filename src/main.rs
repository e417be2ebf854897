//! CLI for computing additively weighted Voronoi contacts of atomic balls.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Parser};
use log::info;
use serde::Serialize;
use voronota_contacts::input::{parse_xyzr, parse_xyzr_file};
use voronota_contacts::mesh_export::ObjWriter;
use voronota_contacts::{
    ContactsParameters, ContactsResult, EnhancementParameters, InterfaceMesh, Pair,
    construct_contacts_from_triangulation, enhance_contacts, triangulate_balls,
};

/// JSON output: contacts plus totals
#[derive(Serialize)]
struct JsonOutput {
    #[serde(flatten)]
    result: ContactsResult,
    total_contact_area: f64,
    total_solvent_area: f64,
    total_volume: f64,
}

#[derive(Parser)]
#[command(name = "voronota-contacts")]
#[command(about = "Compute additively weighted Voronoi contacts of atomic balls")]
#[command(
    long_about = "Constructs the additively weighted Voronoi diagram of atomic balls \
    and measures the contact faces between neighboring balls, constrained by a rolling \
    probe. Also computes solvent contacts and, optionally, volumes, bounding arcs, and \
    the contact adjacency graph.\n\n\
    Input is XYZR text: the last four columns of each line are x, y, z, and radius."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Rolling probe radius
    #[arg(long, default_value_t = 1.4)]
    probe: f64,

    /// Distance between neighboring contour points
    #[arg(long, default_value_t = 0.2)]
    step: f64,

    /// Rounds of projections that settle contour points on curved faces
    #[arg(long, default_value_t = 5)]
    projections: usize,

    /// Subdivision depth of the icosahedron used for solvent surfaces
    #[arg(long, default_value_t = 3)]
    sih_depth: u32,

    /// Input XYZR file. Reads from stdin if not specified
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output JSON file. Writes to stdout if not specified
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the interface mesh of all inter-atom contacts as OBJ
    #[arg(long)]
    mesh_obj: Option<PathBuf>,

    /// Compute per-ball volumes
    #[arg(long)]
    volumes: bool,

    /// Compute per-contact lengths of the solvent boundary
    #[arg(long)]
    bounding_arcs: bool,

    /// Compute the contact adjacency graph
    #[arg(long)]
    adjacencies: bool,

    /// Write the measured triangles of every contact into the JSON output
    #[arg(long)]
    graphics: bool,

    /// Tag contacts that reach the solvent
    #[arg(long)]
    tag_peripherial: bool,

    /// Do not tag central contacts
    #[arg(long)]
    no_tag_centrality: bool,

    /// Add the mean solvent direction to solvent contacts
    #[arg(long)]
    solvent_direction: bool,

    /// Increase verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Reduce verbosity to warnings only
    #[arg(short, long)]
    quiet: bool,

    /// Maximum number of threads to use, also splits the triangulation into parts
    #[arg(long)]
    processors: Option<usize>,

    /// Measure and output running time
    #[arg(long)]
    measure_running_time: bool,
}

impl Cli {
    fn contacts_parameters(&self) -> ContactsParameters {
        ContactsParameters {
            probe: self.probe,
            step: self.step,
            projections: self.projections,
            sih_depth: self.sih_depth,
            calculate_volumes: self.volumes,
            calculate_bounding_arcs: self.bounding_arcs,
            calculate_adjacencies: self.adjacencies,
            calculate_graphics: self.graphics,
            parallel_parts: self.processors.filter(|&n| n > 1),
            ..ContactsParameters::default()
        }
    }

    fn enhancement_parameters(&self) -> EnhancementParameters {
        EnhancementParameters {
            tag_centrality: !self.no_tag_centrality,
            tag_peripherial: self.tag_peripherial,
            adjunct_solvent_direction: self.solvent_direction,
            probe: self.probe,
            sih_depth: self.sih_depth,
            ..EnhancementParameters::default()
        }
    }
}

fn invalid_input(e: voronota_contacts::ContactsError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e)
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Some(num_threads) = cli.processors {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(io::Error::other)?;
        info!("Using {num_threads} threads");
    }

    let params = cli.contacts_parameters();
    params.validate().map_err(invalid_input)?;

    let balls = match &cli.input {
        Some(path) => parse_xyzr_file(path)?,
        None => parse_xyzr(io::stdin().lock())?,
    };
    info!("Read {} balls", balls.len());

    let start = Instant::now();
    let mut result = ContactsResult::default();
    if !balls.is_empty() {
        let triangulation = triangulate_balls(&balls, &params).map_err(invalid_input)?;
        result = construct_contacts_from_triangulation(&triangulation, &params)
            .map_err(invalid_input)?;
        enhance_contacts(&triangulation, &mut result, &cli.enhancement_parameters());

        if let Some(path) = &cli.mesh_obj {
            let pairs: BTreeSet<Pair> = result
                .contacts
                .iter()
                .filter_map(|c| c.id_b.map(|b| Pair::of(c.id_a, b)))
                .collect();
            let mesh = InterfaceMesh::new(
                &triangulation.spheres,
                &triangulation.vertices_vector(),
                &pairs,
                &params.contour_parameters(),
                false,
            );
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("contacts");
            ObjWriter::new(&mesh).write_obj(BufWriter::new(File::create(path)?), name)?;
            info!("Wrote mesh with {} faces to {}", mesh.faces.len(), path.display());
        }
    }
    let elapsed = start.elapsed();

    if cli.measure_running_time {
        info!("Contacts time: {} ms", elapsed.as_millis());
    }

    let output = JsonOutput {
        total_contact_area: result.total_contact_area(),
        total_solvent_area: result.total_solvent_area(),
        total_volume: result.total_volume(),
        result,
    };

    if let Some(path) = &cli.output {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &output)?;
    } else {
        let stdout = io::stdout().lock();
        serde_json::to_writer_pretty(stdout, &output)?;
        println!();
    }

    Ok(())
}
