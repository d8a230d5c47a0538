//! Run orchestration.
//!
//! Phase 1 parses every header in parallel and freezes the enum table.
//! Phase 2 classifies, matches and resolves classes in discovery order, groups
//! them by metadata identifier and synthesizes meta blocks. Per-item failures
//! are logged and collected in the [`RunReport`]; only [`FatalError`]s abort.

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::classify;
use crate::config::GeneratorConfig;
use crate::emit;
use crate::error::{FatalError, HeaderError, MetadataError, SkipReason};
use crate::fuzzy::{GestaltScorer, SimilarityScorer};
use crate::header;
use crate::matcher;
use crate::meta;
use crate::metadata;
use crate::resolve::{self, ResolveContext};
use crate::signature;
use crate::types::*;

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// One item left out of the output, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub item: String,
    pub reason: String,
}

impl SkippedItem {
    fn new(item: impl Into<String>, reason: impl Display) -> Self {
        Self { item: item.into(), reason: reason.to_string() }
    }
}

/// Summary of a run: counts plus every skip, drop and unused method.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub target: Option<String>,
    pub blacklisted_target: bool,
    pub headers_scanned: usize,
    pub metadata_records: usize,
    pub classes_accepted: usize,
    pub blocks_emitted: usize,
    pub meta_blocks: usize,
    pub skipped_headers: Vec<SkippedItem>,
    /// Headers processed despite syntax errors (non-strict mode).
    pub syntax_error_headers: Vec<String>,
    pub skipped_records: Vec<SkippedItem>,
    pub duplicate_metadata: Vec<String>,
    pub skipped_classes: Vec<SkippedItem>,
    pub skipped_groups: Vec<SkippedItem>,
    pub dropped_methods: Vec<String>,
    pub unused_methods: Vec<String>,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} blocks ({} meta) from {} headers; skipped {} classes, {} groups, {} headers, {} records",
            self.blocks_emitted,
            self.meta_blocks,
            self.headers_scanned,
            self.skipped_classes.len(),
            self.skipped_groups.len(),
            self.skipped_headers.len(),
            self.skipped_records.len(),
        )
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub model: RegistrationModel,
    /// Final block descriptors in emission order, meta blocks included.
    pub descriptors: Vec<BlockDescriptor>,
    /// Generated C++ source.
    pub source: String,
    pub report: RunReport,
}

/// Inputs of a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub roots: Vec<PathBuf>,
    pub target: Option<String>,
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// The `dirname` child of `path` or of its nearest ancestor that has one.
pub fn find_dir_root(path: &Path, dirname: &str) -> Result<PathBuf, FatalError> {
    let start = path
        .canonicalize()
        .map_err(|source| FatalError::Io { path: path.to_path_buf(), source })?;
    start
        .ancestors()
        .map(|dir| dir.join(dirname))
        .find(|candidate| candidate.is_dir())
        .ok_or_else(|| FatalError::RootNotFound { root: path.to_path_buf(), dir: dirname.to_string() })
}

/// Files under `dir` with one of `extensions`, recursively, in sorted order.
pub fn collect_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(dir)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.iter().any(|x| x == ext))
        })
        .collect();
    files.sort();
    files
}

/// A header file and the include directory it was found under.
struct HeaderSource {
    path: PathBuf,
    include_root: PathBuf,
}

// ---------------------------------------------------------------------------
// Emission bookkeeping
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Emission {
    model: RegistrationModel,
    descriptors: Vec<BlockDescriptor>,
}

impl Emission {
    fn push_doc(&mut self, desc: BlockDescriptor) -> Result<(), FatalError> {
        self.model.block_docs.insert(desc.path.clone(), emit::descriptor_json(&desc)?);
        self.descriptors.push(desc);
        Ok(())
    }

    fn push_single(&mut self, block: DescribedBlock) -> Result<(), FatalError> {
        self.model.registrations.push(Registration { path: block.factory.path.clone(), symbol: block.factory.symbol() });
        self.model.factories.push(block.factory);
        self.push_doc(block.desc)
    }

    fn push_meta(
        &mut self,
        meta: MetaFactoryDescriptor,
        desc: BlockDescriptor,
        members: Vec<DescribedBlock>,
    ) -> Result<(), FatalError> {
        self.model.factories.extend(members.into_iter().map(|m| m.factory));
        self.model.registrations.push(Registration { path: meta.path.clone(), symbol: meta.symbol() });
        self.model.meta_factories.push(meta);
        self.push_doc(desc)
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run the generator with the default similarity scorer.
pub fn run(options: &RunOptions, config: &GeneratorConfig) -> Result<RunOutput, FatalError> {
    let scorer = GestaltScorer::new(config.similarity_cutoff);
    run_with_scorer(options, config, &scorer)
}

pub fn run_with_scorer(
    options: &RunOptions,
    config: &GeneratorConfig,
    scorer: &dyn SimilarityScorer,
) -> Result<RunOutput, FatalError> {
    let start = Instant::now();
    let target = options.target.as_deref();
    info!(build_target = target.unwrap_or("-"), roots = options.roots.len(), "Generator begin");

    let mut report = RunReport { target: options.target.clone(), ..RunReport::default() };
    let mut emission = Emission::default();

    if target.is_some_and(|t| config.is_blacklisted_target(t)) {
        info!(build_target = target.unwrap_or_default(), "Blacklisted target; emitting empty registration");
        report.blacklisted_target = true;
    } else {
        generate(options, config, scorer, &mut report, &mut emission)?;
    }

    let source = emit::render(&emission.model, target)?;
    report.blocks_emitted = emission.descriptors.len();
    report.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        blocks = report.blocks_emitted,
        meta = report.meta_blocks,
        skipped = report.skipped_classes.len() + report.skipped_groups.len(),
        time_ms = report.elapsed_ms,
        "Generator done"
    );

    Ok(RunOutput { model: emission.model, descriptors: emission.descriptors, source, report })
}

fn generate(
    options: &RunOptions,
    config: &GeneratorConfig,
    scorer: &dyn SimilarityScorer,
    report: &mut RunReport,
    emission: &mut Emission,
) -> Result<(), FatalError> {
    // Directory resolution is fatal per root.
    let mut header_sources = Vec::new();
    let mut metadata_files = Vec::new();
    for root in &options.roots {
        let include_root = find_dir_root(root, &config.include_dir)?;
        let metadata_root = find_dir_root(root, &config.metadata_dir)?;
        debug!(root = %root.display(), include = %include_root.display(), metadata = %metadata_root.display(), "Resolved root");

        header_sources.extend(
            collect_files(&include_root, &config.header_extensions)
                .into_iter()
                .map(|path| HeaderSource { path, include_root: include_root.clone() }),
        );
        metadata_files.extend(collect_files(&metadata_root, &config.metadata_extensions));
    }

    let loaded = metadata::load_metadata(&metadata_files, config.duplicate_keys)?;
    report.metadata_records = loaded.set.records.len();
    report.duplicate_metadata = loaded.duplicates;
    report.skipped_records = loaded
        .skipped
        .iter()
        .map(|e| SkippedItem::new(metadata_error_path(e), e))
        .collect();
    let metadata = loaded.set;

    // Phase 1: parse every header, then freeze the enum table.
    let parse_start = Instant::now();
    let parsed: Vec<Result<HeaderModel, HeaderError>> = header_sources
        .par_iter()
        .map(|src| header::read_header(&src.path, &src.include_root, config.strict_headers))
        .collect();
    report.headers_scanned = parsed.len();

    let mut headers = Vec::with_capacity(parsed.len());
    for (src, result) in header_sources.iter().zip(parsed) {
        match result {
            Ok(model) => {
                if model.has_syntax_errors {
                    report.syntax_error_headers.push(src.path.display().to_string());
                }
                headers.push(model);
            }
            Err(e) => {
                warn!(header = %src.path.display(), reason = %e, "Skipping header");
                report.skipped_headers.push(SkippedItem::new(src.path.display().to_string(), &e));
            }
        }
    }
    let enums = EnumTable::from_headers(&headers);
    debug!(
        headers = headers.len(),
        enums = enums.len(),
        time_ms = parse_start.elapsed().as_millis() as u64,
        "Headers parsed"
    );

    // Phase 2: classify, match and describe, in discovery order.
    let ids = metadata.ids();
    let ctx = ResolveContext { metadata: &metadata, enums: &enums, scorer, config };
    let mut groups: BTreeMap<String, Vec<DescribedBlock>> = BTreeMap::new();

    for model in &headers {
        for class in classify::blocks(&model.classes, config) {
            report.classes_accepted += 1;
            emission.model.headers.insert(model.include_path.clone());

            let described = matcher::match_class(class, &ids, &config.legacy_prefix).and_then(|id| {
                let record = metadata
                    .get(&id)
                    .ok_or_else(|| SkipReason::NoMetadataMatch {
                        class: class.qualified_name(),
                        candidate: id.clone(),
                    })?;
                let sig = signature::extract(class, &model.functions, record, config)?;
                report.dropped_methods.extend(sig.dropped.iter().cloned());
                report.unused_methods.extend(sig.unused.iter().cloned());
                resolve::describe_block(class, &sig, record, &ctx)
            });

            match described {
                Ok(block) => groups.entry(block.group.clone()).or_default().push(block),
                Err(reason) => {
                    warn!(class = %class.qualified_name(), reason = %reason, "Skipping class");
                    report.skipped_classes.push(SkippedItem::new(class.qualified_name(), reason));
                }
            }
        }
    }

    // Meta-block grouping: one metadata record, several classes.
    for (group, members) in groups {
        if members.len() < 2 {
            for block in members {
                emission.push_single(block)?;
            }
            continue;
        }

        let synthesized = match metadata.get(&group) {
            Some(record) => meta::synthesize(&group, record, &members, scorer),
            None => Err(SkipReason::EmptyGroup { group: group.clone() }),
        };
        match synthesized {
            Ok((meta_factory, desc)) => {
                debug!(group = %group, members = members.len(), path = %meta_factory.path, "Synthesized meta block");
                report.meta_blocks += 1;
                emission.push_meta(meta_factory, desc, members)?;
            }
            Err(reason) => {
                error!(group = %group, reason = %reason, "Meta block synthesis failed");
                report.skipped_groups.push(SkippedItem::new(group.clone(), &reason));
                if config.meta_fallback {
                    info!(group = %group, members = members.len(), "Emitting group members individually");
                    for block in members {
                        emission.push_single(block)?;
                    }
                }
            }
        }
    }

    Ok(())
}

fn metadata_error_path(e: &MetadataError) -> String {
    match e {
        MetadataError::Read { path, .. }
        | MetadataError::Xml { path, .. }
        | MetadataError::MissingField { path, .. }
        | MetadataError::UnknownRoot { path } => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_dir_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("include/gnuradio/blocks")).unwrap();
        std::fs::create_dir_all(dir.path().join("lib/deep")).unwrap();

        let found = find_dir_root(&dir.path().join("lib/deep"), "include").unwrap();
        assert_eq!(found, dir.path().canonicalize().unwrap().join("include"));

        let err = find_dir_root(&dir.path().join("lib/deep"), "no_such_dir_name_here").unwrap_err();
        assert!(matches!(err, FatalError::RootNotFound { .. }));
    }

    #[test]
    fn test_collect_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        for name in ["b/z.h", "a.h", "b/a.h", "notes.txt", "c.hpp"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let files = collect_files(dir.path(), &["h".to_string()]);
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a.h", "b/a.h", "b/z.h"]);
    }

    #[test]
    fn test_blacklisted_target_yields_empty_output() {
        let options = RunOptions { roots: vec![PathBuf::from("/definitely/not/here")], target: Some("gnuradio-pmt".into()) };
        let out = run(&options, &GeneratorConfig::default()).unwrap();
        assert!(out.report.blacklisted_target);
        assert!(out.model.is_empty());
        assert!(out.descriptors.is_empty());
        assert!(out.source.contains("pothos_static_block"));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions { roots: vec![dir.path().to_path_buf()], target: None };
        let mut config = GeneratorConfig::default();
        config.include_dir = "no_such_include_dir_for_test".into();
        assert!(matches!(run(&options, &config), Err(FatalError::RootNotFound { .. })));
    }

    #[test]
    fn test_report_summary() {
        let report = RunReport { blocks_emitted: 3, meta_blocks: 1, headers_scanned: 7, ..RunReport::default() };
        assert_eq!(report.summary(), "3 blocks (1 meta) from 7 headers; skipped 0 classes, 0 groups, 0 headers, 0 records");
    }
}
