//! YAML-described replication scenarios and their runner.

use anyhow::{Context, bail, ensure};
use glam::Vec3;
use rigsync_common::{BodyId, PeerId};
use rigsync_net::{NetConfig, NetStats, Session, SessionStats};
use rigsync_physics::SimBody;
use rigsync_replicate::SyncConfig;
use serde::{Deserialize, Serialize};

pub const SERVER: PeerId = PeerId(0);

/// A session to simulate. Clients are numbered `1..=clients`; peer 0 is the
/// server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub net: NetConfig,
    pub clients: u32,
    pub ticks: u64,
    pub physics_steps_per_tick: u32,
    pub dt: f32,
    pub bodies: Vec<ScenarioBody>,
    pub transfers: Vec<ScenarioTransfer>,
    pub kicks: Vec<ScenarioKick>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            net: NetConfig::default(),
            clients: 2,
            ticks: 100,
            physics_steps_per_tick: 1,
            dt: 0.02,
            bodies: Vec::new(),
            transfers: Vec::new(),
            kicks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScenarioBody {
    pub owner: Option<u32>,
    pub sync: SyncConfig,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub kinematic: bool,
    pub use_gravity: bool,
    pub drag: f32,
    pub angular_drag: f32,
}

impl Default for ScenarioBody {
    fn default() -> Self {
        let body = SimBody::default();
        Self {
            owner: None,
            sync: SyncConfig::default(),
            velocity: body.velocity,
            angular_velocity: body.angular_velocity,
            kinematic: body.is_kinematic,
            use_gravity: body.use_gravity,
            drag: body.drag,
            angular_drag: body.angular_drag,
        }
    }
}

impl ScenarioBody {
    fn prefab(&self) -> SimBody {
        SimBody {
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
            is_kinematic: self.kinematic,
            use_gravity: self.use_gravity,
            drag: self.drag,
            angular_drag: self.angular_drag,
            ..SimBody::default()
        }
    }
}

/// Hand `body` to client `to` (or to nobody) before tick `tick` runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioTransfer {
    pub tick: u64,
    pub body: usize,
    pub to: Option<u32>,
}

/// Overwrite the velocity of `body` on whichever peer is authoritative.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioKick {
    pub tick: u64,
    pub body: usize,
    pub velocity: Vec3,
}

impl Scenario {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let scenario: Self = serde_yaml::from_str(text).context("parsing scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.dt.is_finite() && self.dt > 0.0,
            "dt must be positive, got {}",
            self.dt
        );
        ensure!(
            (0.0..=1.0).contains(&self.net.unreliable_loss),
            "unreliable_loss must be within [0, 1], got {}",
            self.net.unreliable_loss
        );
        for (index, body) in self.bodies.iter().enumerate() {
            if let Some(owner) = body.owner {
                self.check_peer(owner).with_context(|| format!("body {index} owner"))?;
            }
            body.sync
                .validate()
                .with_context(|| format!("body {index} sync config"))?;
        }
        for transfer in &self.transfers {
            self.check_body(transfer.body)?;
            if let Some(to) = transfer.to {
                self.check_peer(to)
                    .with_context(|| format!("transfer at tick {}", transfer.tick))?;
            }
        }
        for kick in &self.kicks {
            self.check_body(kick.body)?;
        }
        Ok(())
    }

    fn check_peer(&self, peer: u32) -> anyhow::Result<()> {
        if peer > self.clients {
            bail!("peer {peer} does not exist ({} clients)", self.clients);
        }
        Ok(())
    }

    fn check_body(&self, body: usize) -> anyhow::Result<()> {
        if body >= self.bodies.len() {
            bail!("body index {body} out of range ({} bodies)", self.bodies.len());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub clients: u32,
    pub session: SessionStats,
    pub network: NetStats,
    pub bodies: Vec<BodySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BodySummary {
    pub index: usize,
    pub owner: Option<PeerId>,
    pub authority: Option<PeerId>,
    pub velocity: Vec3,
    pub final_divergence: f32,
    pub max_divergence: f32,
}

pub fn run(scenario: &Scenario) -> anyhow::Result<Summary> {
    scenario.validate()?;
    let mut session = Session::new(SERVER, scenario.net);
    for peer in 1..=scenario.clients {
        session.join(PeerId(peer))?;
    }

    let mut ids: Vec<BodyId> = Vec::with_capacity(scenario.bodies.len());
    for (index, entry) in scenario.bodies.iter().enumerate() {
        let id = session
            .spawn(entry.sync, entry.prefab(), entry.owner.map(PeerId))
            .with_context(|| format!("spawning body {index}"))?;
        ids.push(id);
    }
    session.pump();

    let mut max_divergence = vec![0.0f32; ids.len()];
    for tick in 0..scenario.ticks {
        for transfer in scenario.transfers.iter().filter(|t| t.tick == tick) {
            session.transfer_ownership(ids[transfer.body], transfer.to.map(PeerId))?;
        }
        for kick in scenario.kicks.iter().filter(|k| k.tick == tick) {
            let id = ids[kick.body];
            if let Some(authority) = session.authority_of(id) {
                if let Some(body) = session.body_mut(authority, id) {
                    body.body_mut().velocity = kick.velocity;
                }
            }
        }
        for _ in 0..scenario.physics_steps_per_tick {
            session.physics_step(scenario.dt);
        }
        session.tick();

        for (slot, id) in max_divergence.iter_mut().zip(&ids) {
            if let Some(d) = session.velocity_divergence(*id) {
                *slot = slot.max(d);
            }
        }
    }

    let bodies = ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let authority = session.authority_of(*id);
            let velocity = authority
                .and_then(|peer| session.body(peer, *id))
                .map(|b| b.body().velocity)
                .unwrap_or(Vec3::ZERO);
            BodySummary {
                index,
                owner: session.owner(*id),
                authority,
                velocity,
                final_divergence: session.velocity_divergence(*id).unwrap_or(0.0),
                max_divergence: max_divergence[index],
            }
        })
        .collect();

    Ok(Summary {
        ticks: scenario.ticks,
        clients: scenario.clients,
        session: *session.stats(),
        network: *session.network().stats(),
        bodies,
    })
}

/// One owned body per client plus one server body. Each body gets a kick
/// every 25 ticks and body 0 changes hands halfway through.
pub fn demo(clients: u32, ticks: u64, net: NetConfig) -> Scenario {
    let mut bodies: Vec<ScenarioBody> = (1..=clients)
        .map(|peer| ScenarioBody {
            owner: Some(peer),
            drag: 0.1,
            ..ScenarioBody::default()
        })
        .collect();
    bodies.push(ScenarioBody {
        sync: SyncConfig::server_authoritative(),
        angular_velocity: Vec3::new(0.0, 1.0, 0.0),
        ..ScenarioBody::default()
    });

    let kicks = (0..ticks)
        .step_by(25)
        .flat_map(|tick| {
            (0..bodies.len()).map(move |body| ScenarioKick {
                tick,
                body,
                velocity: Vec3::new(body as f32 + 1.0, 5.0, 0.0),
            })
        })
        .collect();

    let transfers = if clients >= 2 {
        vec![ScenarioTransfer {
            tick: ticks / 2,
            body: 0,
            to: Some(2),
        }]
    } else {
        Vec::new()
    };

    Scenario {
        net,
        clients,
        ticks,
        bodies,
        transfers,
        kicks,
        ..Scenario::default()
    }
}
