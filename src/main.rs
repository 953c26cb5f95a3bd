use glance3d::viewer::{self, ViewerConfig};

fn main() -> anyhow::Result<()> {
    viewer::run(ViewerConfig::default())
}
