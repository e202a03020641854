//! `loopcast combine` – run the multi-part combiner without acquiring.

use anyhow::Result;
use loopcast_core::combine::combine_from_cache;
use loopcast_core::config::LoopcastConfig;
use loopcast_core::media::FfmpegRemuxer;
use std::path::Path;

pub async fn run_combine(cfg: &LoopcastConfig, state_dir: &Path, show: Option<&str>) -> Result<()> {
    let remuxer = FfmpegRemuxer::default();
    for show in cfg.select_shows(show)? {
        match combine_from_cache(cfg, state_dir, show, &remuxer).await? {
            None => println!("{}: no catalog yet, run `loopcast acquire` first", show.name),
            Some(s) => println!(
                "{}: combined {}, failed {}, waiting on parts {}",
                show.name, s.combined, s.failed, s.waiting
            ),
        }
    }
    Ok(())
}
