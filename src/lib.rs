//! Additively weighted Voronoi contacts of atomic balls.
//!
//! Balls are triangulated into quadruples sharing an empty tangent sphere,
//! the Voronoi face of every neighboring pair is traced as a contour clipped
//! by the solvent probe and by the other neighbors, and the faces are measured
//! into contact areas. Each ball also gets a solvent contact for the part of
//! its probe-expanded surface the solvent can reach.
//!
//! # Example
//!
//! ```
//! use voronota_contacts::{Ball, ContactsParameters, construct_contacts};
//!
//! let balls = vec![
//!     Ball::new(0.0, 0.0, 0.0, 1.0),
//!     Ball::new(2.0, 0.0, 0.0, 1.0),
//! ];
//!
//! let result = construct_contacts(&balls, &ContactsParameters::default())?;
//!
//! for contact in &result.contacts {
//!     match contact.id_b {
//!         Some(b) => println!("Contact {}-{}: area={:.2}", contact.id_a, b, contact.area),
//!         None => println!("Solvent {}: area={:.2}", contact.id_a, contact.area),
//!     }
//! }
//! assert_eq!(result.inter_atom_count(), 1);
//! # Ok::<(), voronota_contacts::ContactsError>(())
//! ```

pub mod boundary;
pub mod bsh;
pub mod collisions;
pub mod contact_contour;
pub mod contact_remainder;
pub mod contacts;
pub mod enhancement;
mod error;
pub mod geometry;
pub mod hyperboloid;
pub mod input;
pub mod interface_mesh;
pub mod mesh_export;
pub mod subdivided_icosahedron;
pub mod tangents;
pub mod triangulation;
pub mod triangulation_queries;
pub mod tuple;
mod types;

pub use contacts::{
    ContactsParameters, construct_contacts, construct_contacts_from_triangulation,
    triangulate_balls,
};
pub use enhancement::{EnhancementParameters, enhance_contacts};
pub use error::ContactsError;
pub use interface_mesh::InterfaceMesh;
pub use triangulation::{Triangulation, TriangulationParameters, construct_triangulation};
pub use tuple::{Pair, Quadruple, Triple};
pub use types::{Ball, Contact, ContactsResult, Sphere, Triangle};
