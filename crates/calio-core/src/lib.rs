pub mod bucket;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod grid;
pub mod lunar;
pub mod model;
pub mod render;
pub mod session;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use bucket::{
  BucketKey,
  DateBuckets,
  bucket_by_date
};
pub use grid::{
  DayCell,
  MonthGrid,
  WeekStart,
  build_month_grid
};
pub use lunar::{
  lunar_label,
  lunar_short_label
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting calio"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.caliorc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::JsonlStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;
  let sessions =
    session::SessionStore::open(
      &data_dir
    )?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let mut stdout =
    std::io::stdout().lock();

  let mut env = commands::Env {
    store:    &store,
    sessions: &sessions,
    cfg:      &cfg,
    renderer: &renderer,
    out:      &mut stdout,
    now:      Utc::now()
  };
  commands::dispatch(
    &mut env,
    cli.command
  )?;

  info!("done");
  Ok(())
}
