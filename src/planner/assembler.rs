//! Build plan assembler
//!
//! Walks a config document into a [`BuildPlan`]. Includes are processed with
//! an explicit frame stack: each frame carries its own search path set, so
//! path changes made inside an included document are discarded when it
//! finishes, while settings changes persist.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::ledger::RunLedger;
use super::search_path::SearchPathSet;
use super::{BuildPlan, InputVideo, OutputVideo};
use crate::domain::model::*;
use crate::domain::rules::should_include;
use crate::domain::settings::Settings;
use crate::error::{ReplayError, ReplayResult};
use crate::kv::{ConfigNode, Document, NodeValue};
use crate::ports::ProbePort;
use crate::utils::path::{is_bare_time_key, resolve_against};

/// Name of markers generated for ranges left out of a raw build
pub const ENCODED_CUT_MARKER: &str = "encoded cut";

/// Knobs that come from the command line rather than the config
#[derive(Debug, Clone, Copy)]
pub struct AssemblerOptions {
    pub mode: BuildMode,
    /// Keep outputs tagged for the other mode, used by listing runs
    pub include_opposite: bool,
}

struct Frame {
    document: Document,
    cursor: usize,
    search_paths: SearchPathSet,
    include_opposite: bool,
}

/// Turns config documents into a build plan
pub struct PlanAssembler<'a> {
    probe: &'a dyn ProbePort,
    ledger: &'a mut RunLedger,
    options: AssemblerOptions,
    settings: Settings,
    probes: HashMap<PathBuf, MediaProbe>,
    plan: BuildPlan,
}

impl<'a> PlanAssembler<'a> {
    pub fn new(probe: &'a dyn ProbePort, ledger: &'a mut RunLedger, options: AssemblerOptions) -> Self {
        Self {
            probe,
            ledger,
            options,
            settings: Settings::default(),
            probes: HashMap::new(),
            plan: BuildPlan::new(options.mode),
        }
    }

    /// Start from existing global settings instead of the defaults
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    fn mode(&self) -> BuildMode {
        self.options.mode
    }

    /// Resolve `root` and every document it includes into a plan
    pub async fn assemble(mut self, root: Document) -> ReplayResult<BuildPlan> {
        info!("Parsing config: {}", root.path().display());

        let mut search_paths = SearchPathSet::new();
        search_paths.add(root.directory(), self.ledger);
        let mut frames = vec![Frame {
            document: root,
            cursor: 0,
            search_paths,
            include_opposite: false,
        }];

        while let Some(frame) = frames.last_mut() {
            let Some(node) = frame.document.nodes().get(frame.cursor).cloned() else {
                frames.pop();
                continue;
            };
            frame.cursor += 1;

            if let Some(document) = self.visit(frame, &node).await? {
                let child = Frame {
                    search_paths: frame.search_paths.clone(),
                    include_opposite: frame.include_opposite,
                    document,
                    cursor: 0,
                };
                if frames.iter().any(|f| f.document.path() == child.document.path()) {
                    return Err(ReplayError::syntax(
                        node.location(),
                        format!("include cycle through {}", child.document.path().display()),
                    ));
                }
                info!("Parsing config: {}", child.document.path().display());
                frames.push(child);
            }
        }

        info!("Planned {} output video(s)", self.plan.outputs.len());
        Ok(self.plan)
    }

    /// Handle one top-level node. Returns a document to descend into for
    /// includes.
    async fn visit(&mut self, frame: &mut Frame, node: &ConfigNode) -> ReplayResult<Option<Document>> {
        if node.is_directive() {
            if !should_include(node.condition(), self.mode(), false) {
                debug!("{}: skipping {} for {} mode", node.location(), node.key, self.mode());
                return Ok(None);
            }
            return self.apply_top_directive(frame, node);
        }

        let allow_opposite = self.options.include_opposite || frame.include_opposite;
        if !should_include(node.condition(), self.mode(), allow_opposite) {
            debug!("{}: skipping output {} for {} mode", node.location(), node.key, self.mode());
            return Ok(None);
        }

        match self.parse_output(frame, node).await {
            Ok(output) => self.plan.outputs.push(output),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!("{}: skipping output {}: {}", node.location(), node.key, e),
        }
        Ok(None)
    }

    fn apply_top_directive(&mut self, frame: &mut Frame, node: &ConfigNode) -> ReplayResult<Option<Document>> {
        let value = node.as_scalar()?;
        match node.key.as_str() {
            "$include" => {
                let path = frame.document.include_path(value);
                let document = Document::load(&path).map_err(|e| match e {
                    ReplayError::NotFound { .. } => ReplayError::syntax(
                        node.location(),
                        format!("included file not found: {}", path.display()),
                    ),
                    other => other,
                })?;
                return Ok(Some(document));
            }
            "$moveFolder" => {
                let folder = resolve_against(&frame.document.directory(), value);
                debug!("Move folder set to {}", folder.display());
                self.plan.move_folder = Some(folder);
            }
            "$includeOpposite" => frame.include_opposite = parse_flag(node, value)?,
            key => {
                let handled = self.settings.apply_directive(key, value)?
                    || frame.search_paths.apply_directive(
                        key,
                        value,
                        &frame.document.directory(),
                        self.ledger,
                    );
                if !handled {
                    warn!("{}: unknown setting {}", node.location(), key);
                }
            }
        }
        Ok(None)
    }

    async fn parse_output(&mut self, frame: &Frame, node: &ConfigNode) -> ReplayResult<OutputVideo> {
        let children = node.as_sequence()?;
        let config_dir = frame.document.directory();
        let mode = self.mode();
        let mut output = OutputVideo::new(
            node.key.clone(),
            resolve_against(&config_dir, &node.key),
            mode,
            self.settings.derive_child(),
        );
        let mut search_paths = frame.search_paths.clone();

        for child in children {
            if !child.is_directive() && is_bare_time_key(&child.key) {
                self.add_bare_range(&mut output, &search_paths, node, child).await?;
                continue;
            }

            if !should_include(child.condition(), mode, false) {
                debug!("{}: skipping {} for {} mode", child.location(), child.key, mode);
                continue;
            }

            if child.key == "$markers" {
                output.markers.extend(parse_markers(child)?);
            } else if child.is_directive() {
                let value = child.as_scalar()?;
                let handled = output.settings.apply_directive(&child.key, value)?
                    || search_paths.apply_directive(&child.key, value, &config_dir, self.ledger);
                if !handled {
                    warn!("{}: unknown setting {}", child.location(), child.key);
                }
            } else {
                self.add_named_input(&mut output, &search_paths, child).await?;
            }
        }

        output.finalize();
        Ok(output)
    }

    /// Time range on the output's own source file
    async fn add_bare_range(
        &mut self,
        output: &mut OutputVideo,
        search_paths: &SearchPathSet,
        output_node: &ConfigNode,
        child: &ConfigNode,
    ) -> ReplayResult<()> {
        let source = match search_paths.resolve(&output_node.key) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}: {} (skipping time range {})", child.location(), e, child.key);
                return Ok(());
            }
        };

        let reuse = output
            .inputs
            .last()
            .is_some_and(|input| input.implicit && input.path == source);
        if !reuse {
            match self.create_input(source, &output.settings, true).await {
                Ok(input) => output.inputs.push(input),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("{}: {} (skipping time range {})", child.location(), e, child.key);
                    return Ok(());
                }
            }
        }

        if let Some(input) = output.inputs.last_mut() {
            self.add_input_entry(input, child)?;
        }
        Ok(())
    }

    async fn add_named_input(
        &mut self,
        output: &mut OutputVideo,
        search_paths: &SearchPathSet,
        child: &ConfigNode,
    ) -> ReplayResult<()> {
        let entries = child.as_sequence()?;
        let path = match search_paths.resolve(&child.key) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}: {} (skipping input)", child.location(), e);
                return Ok(());
            }
        };

        let mut input = match self.create_input(path, &output.settings, false).await {
            Ok(input) => input,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("{}: {} (skipping input)", child.location(), e);
                return Ok(());
            }
        };

        for entry in entries {
            self.add_input_entry(&mut input, entry)?;
        }
        output.inputs.push(input);
        Ok(())
    }

    async fn create_input(&mut self, path: PathBuf, settings: &Settings, implicit: bool) -> ReplayResult<InputVideo> {
        let probe = match self.probes.get(&path) {
            Some(probe) => probe.clone(),
            None => {
                let probe = self.probe.probe_media(&path).await?;
                self.probes.insert(path.clone(), probe.clone());
                probe
            }
        };
        debug!("Input {} ({} long)", path.display(), probe.duration);
        self.ledger.reference_input(&path);
        Ok(InputVideo::new(path, probe, settings.derive_child(), implicit))
    }

    /// One child of an input: markers, a settings directive or a time range
    fn add_input_entry(&self, input: &mut InputVideo, entry: &ConfigNode) -> ReplayResult<()> {
        let mode = self.mode();
        let included = should_include(entry.condition(), mode, false);

        if entry.key == "$markers" {
            if included {
                input.pending_markers.extend(parse_markers(entry)?);
            }
            return Ok(());
        }

        if entry.is_directive() {
            if included && !input.settings.apply_directive(&entry.key, entry.as_scalar()?)? {
                warn!("{}: unknown input setting {}", entry.location(), entry.key);
            }
            return Ok(());
        }

        let end = entry.as_scalar()?;
        if included {
            input.add_range(&entry.key, end)?;
        } else if mode.is_raw() {
            let range = input.parse_range(&entry.key, end)?;
            input
                .pending_markers
                .push(Marker::new(ENCODED_CUT_MARKER, range.start, range.end));
        } else {
            debug!("{}: skipping range {} for {} mode", entry.location(), entry.key, mode);
        }
        Ok(())
    }
}

/// `$markers` block: `"name" "time"` or `"name" { "start" "end" }`
fn parse_markers(node: &ConfigNode) -> ReplayResult<Vec<Marker>> {
    node.as_sequence()?
        .iter()
        .map(|marker| -> ReplayResult<Marker> {
            match &marker.value {
                NodeValue::Scalar(time) => Ok(Marker::at(marker.key.clone(), TimeSpec::parse(time)?)),
                NodeValue::Sequence(span) => {
                    let first = span.first().ok_or_else(|| {
                        ReplayError::syntax(marker.location(), format!("marker '{}' has an empty span", marker.key))
                    })?;
                    Ok(Marker::new(
                        marker.key.clone(),
                        TimeSpec::parse(&first.key)?,
                        TimeSpec::parse(first.as_scalar()?)?,
                    ))
                }
            }
        })
        .collect()
}

fn parse_flag(node: &ConfigNode, value: &str) -> ReplayResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ReplayError::Format {
            key: node.key.clone(),
            value: value.to_string(),
        }),
    }
}
