mod manifest;
mod plan;
mod runner;

pub use manifest::{BatchManifest, manifest_path, read_manifest, write_manifest};
pub use plan::{Batch, batch_dir_name, plan_batches};
pub use runner::{BatchSummary, run_batch};
