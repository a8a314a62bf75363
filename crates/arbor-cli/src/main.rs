mod scene;

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use arbor::{EntitySaver, EntitySystem, SaveData};
use clap::Parser;
use tracing::info;

use scene::{Follower, Label, Transform};

#[derive(Parser)]
#[command(name = "arbor", about = "Entity graph save/load demo")]
struct Args {
    /// Path the saved scene is written to
    #[arg(short, long, default_value = "scene.json")]
    output: PathBuf,

    /// Load an existing save instead of building the demo scene
    #[arg(short, long)]
    input: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let saver = EntitySaver::new(scene::registry());

    let data = match &args.input {
        Some(path) => {
            info!(path = %path.display(), "reading save");
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<SaveData>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => {
            let mut system = EntitySystem::new();
            let root = scene::populate(&mut system)?;
            info!(%root, entities = system.entity_count(), "built demo scene");

            let data = saver.save(&system)?;
            let text = serde_json::to_string_pretty(&data)?;
            fs::write(&args.output, text)
                .with_context(|| format!("writing {}", args.output.display()))?;
            info!(path = %args.output.display(), "scene saved");
            data
        }
    };

    let mut restored = EntitySystem::new();
    let report = saver.load(&mut restored, &data)?;
    info!(
        entities = restored.entity_count(),
        components = report.total(),
        "scene loaded"
    );

    for &entity in report.loaded::<Label>() {
        let label = restored.get_component::<Label>(entity)?;
        let position = restored
            .try_get_component::<Transform>(entity)
            .map(|t| format!("({}, {})", t.x, t.y))
            .unwrap_or_else(|| "-".to_string());
        info!(%entity, name = %label.name, position = %position, "entity");
    }

    for &entity in report.loaded::<Follower>() {
        let follower = restored.get_component::<Follower>(entity)?;
        if let Some(target) = follower.target {
            let name = &target.get(&restored)?.name;
            info!(%entity, target = %name, "follower resolved");
        }
    }

    Ok(())
}
