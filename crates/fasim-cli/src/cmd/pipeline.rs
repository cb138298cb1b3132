//! `fasim pipeline`: pipeline graphs.

use anyhow::Result;
use clap::Subcommand;
use fasim_core::model::{FacilityId, Pipeline, PipelineId};
use fasim_core::{EntityKind, RepoError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{Globals, Session, or_dash};
use crate::output::{Ack, pretty_kv, pretty_section, render_ack, render_mode};
use crate::payload::{PipelinePayload, read_payload};

#[derive(Subcommand, Debug)]
pub enum PipelineCommand {
    /// Create a pipeline from a JSON payload. Node ids in the payload are
    /// placeholders and are replaced by stored ids.
    Create {
        /// Payload file, or `-` for stdin.
        #[arg(long, short = 'f')]
        file: PathBuf,
    },
    /// Show one pipeline with its nodes and edges.
    Get {
        id: i64,
    },
    /// List all pipelines by id.
    List,
    /// Replace a pipeline's graph. Every node receives a fresh id.
    Update {
        id: i64,
        /// Payload file, or `-` for stdin.
        #[arg(long, short = 'f')]
        file: PathBuf,
    },
    /// Delete a pipeline and its whole graph.
    Delete {
        id: i64,
    },
}

/// Execute `fasim pipeline <command>`.
///
/// # Errors
///
/// Returns an error if the payload is invalid, the store cannot be opened,
/// or the repository call fails.
pub fn run_pipeline(
    command: &PipelineCommand,
    globals: &Globals,
    project_root: &Path,
) -> Result<()> {
    match command {
        PipelineCommand::Create { file } => {
            let payload: PipelinePayload = read_payload(file)?;
            let session = Session::open(globals, project_root)?;
            let repos = session.repos();
            let mut pipeline = payload.into_pipeline(&session.ctx, repos.facilities.as_ref())?;
            repos.pipelines.create(&session.ctx, &mut pipeline)?;
            render_one(&session, &pipeline)
        }
        PipelineCommand::Get { id } => {
            let session = Session::open(globals, project_root)?;
            let pipeline = session
                .repos()
                .pipelines
                .get(&session.ctx, PipelineId::new(*id))?
                .ok_or(RepoError::NotFound {
                    entity: EntityKind::Pipeline,
                    id: *id,
                })?;
            render_one(&session, &pipeline)
        }
        PipelineCommand::List => {
            let session = Session::open(globals, project_root)?;
            let pipelines = session.repos().pipelines.list(&session.ctx)?;
            render_mode(session.output, pipelines.as_slice(), write_text, write_pretty)
        }
        PipelineCommand::Update { id, file } => {
            let payload: PipelinePayload = read_payload(file)?;
            let session = Session::open(globals, project_root)?;
            let repos = session.repos();
            let mut pipeline = payload.into_pipeline(&session.ctx, repos.facilities.as_ref())?;
            pipeline.id = Some(PipelineId::new(*id));
            repos.pipelines.update(&session.ctx, &mut pipeline)?;
            render_one(&session, &pipeline)
        }
        PipelineCommand::Delete { id } => {
            let session = Session::open(globals, project_root)?;
            session
                .repos()
                .pipelines
                .delete(&session.ctx, PipelineId::new(*id))?;
            render_ack(session.output, &Ack::new("deleted", EntityKind::Pipeline, *id))
        }
    }
}

fn render_one(session: &Session, pipeline: &Pipeline) -> Result<()> {
    render_mode(
        session.output,
        pipeline,
        |p, w| write_text(std::slice::from_ref(p), w),
        |p, w| write_pretty(std::slice::from_ref(p), w),
    )
}

fn write_text(pipelines: &[Pipeline], w: &mut dyn Write) -> io::Result<()> {
    for pipeline in pipelines {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            pipeline.id.map_or(0, PipelineId::get),
            pipeline.name,
            pipeline.nodes.len(),
            pipeline.edge_count()
        )?;
    }
    Ok(())
}

fn write_pretty(pipelines: &[Pipeline], w: &mut dyn Write) -> io::Result<()> {
    for pipeline in pipelines {
        pretty_section(
            w,
            &format!("Pipeline {}", pipeline.id.map_or(0, PipelineId::get)),
        )?;
        pretty_kv(w, "name", &pipeline.name)?;
        pretty_kv(w, "description", or_dash(pipeline.description.as_deref()))?;
        pretty_kv(
            w,
            "graph",
            format!(
                "{} nodes, {} edges",
                pipeline.nodes.len(),
                pipeline.edge_count()
            ),
        )?;

        for node in pipeline.nodes.values() {
            let targets = if node.next_node_ids.is_empty() {
                "(end)".to_string()
            } else {
                node.next_node_ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            writeln!(
                w,
                "  node {:<6} {} (#{}) -> {targets}",
                node.id,
                node.facility.name,
                node.facility.id.map_or(0, FacilityId::get)
            )?;
        }
    }
    Ok(())
}
