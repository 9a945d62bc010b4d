//! One simulation tick over a space.

use log::trace;

use crate::constraint::PairContext;
use crate::space::{Objects, Space};
use crate::types::{BodyId, ConstraintId, SpaceInfo};

/// Bodies and constraints connected through the constraint graph.
#[derive(Default)]
struct Island {
    bodies: Vec<BodyId>,
    constraints: Vec<ConstraintId>,
}

pub(crate) struct Stepper {
    /// Generation stamped on bodies and constraints claimed by an island.
    step: u64,
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stepper {
    pub fn new() -> Self {
        Self { step: 1 }
    }

    #[cfg(test)]
    pub fn current(&self) -> u64 {
        self.step
    }

    /// Depth-first walk from `seed`. Anchors are never entered, so they
    /// do not join islands together.
    fn populate_island(&self, seed: BodyId, space: &mut Space, objs: &mut Objects<'_>) -> Island {
        let mut island = Island::default();
        let mut stack = vec![seed];
        if let Some(body) = objs.bodies.get_mut(seed.0) {
            body.island_step = self.step;
        }
        while let Some(id) = stack.pop() {
            island.bodies.push(id);
            let Some(body) = objs.bodies.get(id.0) else {
                continue;
            };
            let edges: Vec<(ConstraintId, usize)> = body.constraint_map.iter().map(|(c, i)| (*c, *i)).collect();
            for (cid, own_index) in edges {
                let Some(constraint) = space.constraints.get_mut(cid.0) else {
                    continue;
                };
                if constraint.island_step == self.step {
                    continue;
                }
                constraint.island_step = self.step;
                island.constraints.push(cid);
                for (i, other) in constraint.bodies().into_iter().enumerate() {
                    let Some(other) = other else {
                        continue;
                    };
                    if i == own_index {
                        continue;
                    }
                    let Some(ob) = objs.bodies.get_mut(other.0) else {
                        continue;
                    };
                    if ob.island_step == self.step || ob.mode.is_anchor() {
                        continue;
                    }
                    ob.island_step = self.step;
                    stack.push(other);
                }
            }
        }
        island
    }

    /// Sleep the whole island if every movable member passed its sleep
    /// test, otherwise keep all of them awake.
    fn check_suspend(island: &Island, space: &mut Space, objs: &mut Objects<'_>, dt: f32) {
        let mut can_sleep = true;
        for id in &island.bodies {
            let Some(body) = objs.bodies.get_mut(id.0) else {
                continue;
            };
            if body.mode.is_anchor() {
                continue;
            }
            if !body.sleep_test(dt, &space.config) {
                can_sleep = false;
            }
        }
        for id in &island.bodies {
            let Some(body) = objs.bodies.get_mut(id.0) else {
                continue;
            };
            if body.mode.is_anchor() {
                continue;
            }
            if body.active == can_sleep {
                body.set_active(!can_sleep);
                space.refresh_active(*id, body);
            }
        }
    }

    pub fn step(&mut self, space: &mut Space, objs: &mut Objects<'_>, dt: f32, iterations: usize) {
        space.setup(objs);

        let active: Vec<BodyId> = space.active_list.iter().copied().collect();
        for id in &active {
            if let Some(body) = objs.bodies.get_mut(id.0) {
                body.integrate_forces(dt, objs.areas, &space.config.default_area);
            }
        }

        let mut islands = Vec::new();
        for &id in &active {
            let seen = objs.bodies.get(id.0).is_none_or(|b| b.island_step == self.step);
            if !seen {
                islands.push(self.populate_island(id, space, objs));
            }
        }

        let mut area_constraints = Vec::new();
        for aid in std::mem::take(&mut space.moved_areas) {
            let Some(area) = objs.areas.get(aid.0) else {
                continue;
            };
            for cid in &area.constraints {
                if let Some(constraint) = space.constraints.get_mut(cid.0) {
                    if constraint.island_step != self.step {
                        constraint.island_step = self.step;
                        area_constraints.push(*cid);
                    }
                }
            }
        }

        {
            let constraints = &mut space.constraints;
            let mut ctx = PairContext {
                bodies: &mut *objs.bodies,
                areas: &mut *objs.areas,
                shapes: objs.shapes,
                config: &space.config,
                monitor_queries: &mut space.monitor_queries,
            };
            for cid in &area_constraints {
                if let Some(constraint) = constraints.get_mut(cid.0) {
                    constraint.setup(&mut ctx, dt);
                }
            }
            for island in &mut islands {
                island
                    .constraints
                    .retain(|cid| constraints.get_mut(cid.0).is_some_and(|c| c.setup(&mut ctx, dt)));
            }
        }

        for island in &islands {
            for _ in 0..iterations {
                for cid in &island.constraints {
                    if let Some(constraint) = space.constraints.get_mut(cid.0) {
                        constraint.solve(objs.bodies);
                    }
                }
            }
        }

        for id in &active {
            let Some(body) = objs.bodies.get_mut(id.0) else {
                continue;
            };
            if body.integrate_velocities(dt) {
                body.co.pending_update = true;
            }
            if body.force_integration.is_some() {
                space.state_queries.insert(*id);
            }
            space.refresh_body(*id, body);
        }

        for island in &islands {
            Self::check_suspend(island, space, objs, dt);
        }

        space.update(objs);
        space.info = SpaceInfo {
            active_objects: active.len(),
            collision_pairs: space.constraints.len(),
            island_count: islands.len(),
        };
        trace!(
            "step {}: {} islands, {} active, {} pairs",
            self.step,
            space.info.island_count,
            space.info.active_objects,
            space.info.collision_pairs
        );
        self.step += 1;
    }
}
