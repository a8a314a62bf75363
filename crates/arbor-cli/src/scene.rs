//! The demo scene: a handful of persisted component types and a small
//! entity tree wired together with a cross-entity reference.

use std::rc::Rc;

use arbor::save::{Manifest, SaveType};
use arbor::{
    Component, ComponentHandle, ComponentRegistry, EntityContext, EntityError, EntityId,
    EntitySystem, Persist,
};

pub struct Label {
    pub name: String,
}

impl Component for Label {
    fn save_manifest(&self) -> Option<Rc<Manifest>> {
        Some(<Self as Persist>::manifest())
    }
}

impl Persist for Label {
    fn manifest() -> Rc<Manifest> {
        Manifest::new("label")
            .field(
                "name",
                SaveType::string::<Label>(|c| c.name.clone(), |c, v| c.name = v),
            )
            .shared()
    }

    fn blank(_cx: &mut EntityContext<'_>) -> Self {
        Self {
            name: String::new(),
        }
    }
}

pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub frozen: bool,
}

impl Component for Transform {
    fn save_manifest(&self) -> Option<Rc<Manifest>> {
        Some(<Self as Persist>::manifest())
    }
}

impl Persist for Transform {
    fn manifest() -> Rc<Manifest> {
        Manifest::new("transform")
            .field("x", SaveType::number::<Transform>(|c| c.x, |c, v| c.x = v))
            .field("y", SaveType::number::<Transform>(|c| c.y, |c, v| c.y = v))
            .field(
                "frozen",
                SaveType::boolean::<Transform>(|c| c.frozen, |c, v| c.frozen = v),
            )
            .shared()
    }

    fn blank(_cx: &mut EntityContext<'_>) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            frozen: false,
        }
    }
}

/// Tracks another entity's [`Label`] across save and load.
pub struct Follower {
    pub target: Option<ComponentHandle<Label>>,
}

impl Component for Follower {
    fn save_manifest(&self) -> Option<Rc<Manifest>> {
        Some(<Self as Persist>::manifest())
    }
}

impl Persist for Follower {
    fn manifest() -> Rc<Manifest> {
        Manifest::new("follower")
            .field(
                "target",
                SaveType::component::<Follower, Label>(|c| c.target, |c, v| c.target = Some(v)),
            )
            .shared()
    }

    fn blank(_cx: &mut EntityContext<'_>) -> Self {
        Self { target: None }
    }
}

pub fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register::<Label>().expect("registry is open");
    registry.register::<Transform>().expect("registry is open");
    registry.register::<Follower>().expect("registry is open");
    registry.finish();
    registry
}

/// Build the demo tree: a world root with two children, one of which
/// follows the other.
pub fn populate(system: &mut EntitySystem) -> Result<EntityId, EntityError> {
    let world = system
        .entity_builder()
        .add_component(|_| Label {
            name: "world".into(),
        })?
        .build()?;

    let beacon = system
        .entity_builder()
        .add_component(|_| Label {
            name: "beacon".into(),
        })?
        .add_component(|_| Transform {
            x: 4.0,
            y: -2.5,
            frozen: true,
        })?
        .build()?;
    system.add_child(world, beacon)?;

    let drone = system
        .entity_builder()
        .add_component(|_| Label {
            name: "drone".into(),
        })?
        .add_component(|_| Transform {
            x: 0.0,
            y: 0.0,
            frozen: false,
        })?
        .add_component(|_| Follower { target: None })?
        .build()?;
    system.add_child(world, drone)?;
    system.get_component_mut::<Follower>(drone)?.target = Some(ComponentHandle::new(beacon));

    Ok(world)
}
