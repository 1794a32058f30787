//! Interactable household objects

use serde::{Deserialize, Serialize};
use std::fmt;

use needs_rl_agent::AgentId;
use needs_rl_core::{NeedType, PrimitiveAction};

/// Point on the household floor plan
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Position {
    /// Create a new position
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(self, other: Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Move up to `step` toward `target` without overshooting
    pub fn step_toward(self, target: Position, step: f64) -> Position {
        let distance = self.distance(target);
        if distance <= step || distance == 0.0 {
            return target;
        }
        let ratio = step / distance;
        Position::new(
            self.x + (target.x - self.x) * ratio,
            self.y + (target.y - self.y) * ratio,
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.0}, {:.0})", self.x, self.y)
    }
}

/// Change applied to one need when an interaction completes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeedModifier {
    /// Affected need
    pub need: NeedType,
    /// Amount added
    pub amount: f64,
}

/// Placement of one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// Display name
    pub name: String,
    /// Action this object affords
    pub affordance: PrimitiveAction,
    /// Location
    pub position: Position,
    /// Seconds an interaction takes; the world default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Effects on completion
    pub modifiers: Vec<NeedModifier>,
}

impl ObjectSpec {
    fn new(name: &str, affordance: PrimitiveAction, x: f64, y: f64, modifiers: &[(NeedType, f64)]) -> Self {
        Self {
            name: name.to_string(),
            affordance,
            position: Position::new(x, y),
            duration: None,
            modifiers: modifiers
                .iter()
                .map(|&(need, amount)| NeedModifier { need, amount })
                .collect(),
        }
    }

    /// Whether completing an interaction raises `need`
    pub fn serves(&self, need: NeedType) -> bool {
        self.modifiers
            .iter()
            .any(|modifier| modifier.need == need && modifier.amount > 0.0)
    }
}

/// One object per affordance laid out across a small house
pub fn default_layout() -> Vec<ObjectSpec> {
    use NeedType::{Bladder, Energy, Fun, Hunger, Hygiene, Social};
    use PrimitiveAction as P;
    vec![
        ObjectSpec::new("Refrigerator", P::UseRefrigerator, 0.0, 600.0, &[(Hunger, 40.0), (Bladder, -5.0)]),
        ObjectSpec::new("Sink", P::UseSink, 300.0, 600.0, &[(Hygiene, 15.0), (Hunger, 5.0)]),
        ObjectSpec::new("Toilet", P::UseToilet, 1200.0, 0.0, &[(Bladder, 50.0)]),
        ObjectSpec::new("Shower", P::UseShower, 1200.0, 300.0, &[(Hygiene, 45.0), (Energy, -5.0)]),
        ObjectSpec::new("Bed", P::UseBed, 1200.0, 1200.0, &[(Energy, 50.0), (Hunger, -5.0)]),
        ObjectSpec::new("Sofa", P::UseSofa, 600.0, 300.0, &[(Social, 35.0), (Energy, 10.0)]),
        ObjectSpec::new("Phone", P::UsePhone, 600.0, 0.0, &[(Social, 30.0)]),
        ObjectSpec::new("Television", P::UseTelevision, 600.0, 600.0, &[(Fun, 40.0), (Energy, -5.0)]),
        ObjectSpec::new("Computer", P::UseComputer, 0.0, 1200.0, &[(Fun, 35.0), (Social, 10.0), (Energy, -10.0)]),
        ObjectSpec::new("Bookshelf", P::UseBookshelf, 300.0, 1200.0, &[(Fun, 25.0)]),
        ObjectSpec::new("Gym", P::UseGym, 0.0, 0.0, &[(Fun, 20.0), (Energy, -15.0), (Hygiene, -10.0)]),
    ]
}

/// Index of an object inside a world
pub type ObjectId = usize;

/// Placed object with occupancy
#[derive(Debug, Clone, PartialEq)]
pub struct Interactable {
    id: ObjectId,
    spec: ObjectSpec,
    duration: f64,
    occupant: Option<AgentId>,
}

impl Interactable {
    /// Place an object. `default_duration` applies when the spec has none.
    pub fn new(id: ObjectId, spec: ObjectSpec, default_duration: f64) -> Self {
        let duration = spec.duration.unwrap_or(default_duration);
        Self {
            id,
            spec,
            duration,
            occupant: None,
        }
    }

    /// Identifier
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Placement and effects
    pub fn spec(&self) -> &ObjectSpec {
        &self.spec
    }

    /// Afforded action
    pub fn affordance(&self) -> PrimitiveAction {
        self.spec.affordance
    }

    /// Location
    pub fn position(&self) -> Position {
        self.spec.position
    }

    /// Seconds an interaction takes
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Whether nobody is using the object
    pub fn can_interact(&self) -> bool {
        self.occupant.is_none()
    }

    /// Current user
    pub fn occupant(&self) -> Option<AgentId> {
        self.occupant
    }

    /// Occupy the object. Fails when it is already in use.
    pub fn start_interaction(&mut self, agent: AgentId) -> bool {
        if self.occupant.is_some() {
            return false;
        }
        self.occupant = Some(agent);
        true
    }

    /// Free the object if `agent` holds it
    pub fn release(&mut self, agent: AgentId) {
        if self.occupant == Some(agent) {
            self.occupant = None;
        }
    }
}

/// Nearest free object affording `action`
pub fn nearest_free(objects: &[Interactable], action: PrimitiveAction, from: Position) -> Option<&Interactable> {
    objects
        .iter()
        .filter(|object| object.affordance() == action && object.can_interact())
        .min_by(|a, b| {
            a.position()
                .distance(from)
                .total_cmp(&b.position().distance(from))
        })
}
