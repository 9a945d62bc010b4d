//! bonk2d: 2D rigid-body physics server (spaces, bodies, areas, fixed-step solver)

pub mod types;
pub mod error;
pub mod api;
pub mod arena;
pub mod narrowphase;
pub mod shape;
pub mod collision_solver;
mod broadphase;
pub mod collision_object;
pub mod body;
pub mod area;
mod constraint;
pub mod space;
mod step;
pub mod server;

pub use crate::types::*;
pub use crate::api::*;
pub use crate::error::{PhysicsError, Result};
pub use crate::arena::Handle;
pub use crate::shape::{Shape, ShapeData, ShapeType};
pub use crate::body::{Body, BodyContact, BodyDirectState, ForceIntegrationCallback};
pub use crate::area::{Area, MonitorCallback};
pub use crate::collision_object::CollisionObject;
pub use crate::space::Space;
pub use crate::server::PhysicsServer;
