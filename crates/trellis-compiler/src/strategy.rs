//! The strategy rewriter: folds the pushdown-eligible prefix of a pipeline
//! into a single compiled source step.
//!
//! The walk is a single pass. Adjacent foldable filter steps are absorbed
//! into the current replaced step; supported navigation steps append a
//! child and advance the cursor; the first step that can be neither
//! absorbed nor safely skipped terminates the prefix and is left to the
//! host interpreter. Termination is a pushdown boundary, never an error.

use tracing::debug;
use trellis_core::ElementKind;
use trellis_plan::{ReplacedStep, ReplacedStepTree, StepId};

use crate::classify::classify;
use crate::pipeline::{CompiledSource, GraphSource, Pipeline, PipelineStep, Step};

/// Apply the rewriter to a pipeline. Idempotent: a pipeline whose source
/// is already compiled is returned unchanged, as is a pipeline rooted in a
/// foreign graph.
pub fn install_strategies(pipeline: &mut Pipeline) {
    if pipeline.source != GraphSource::Relational {
        return;
    }
    let Some(source_idx) = pipeline
        .steps
        .iter()
        .position(|s| matches!(s.step, Step::Graph { .. } | Step::Compiled(_)))
    else {
        return;
    };
    if matches!(pipeline.steps[source_idx].step, Step::Compiled(_)) {
        return;
    }
    let Step::Graph { element } = pipeline.steps[source_idx].step else {
        unreachable!("position matched a source step");
    };

    let mut tree = ReplacedStepTree::new();
    let root = tree.add_replaced(ReplacedStep::source(element));
    for label in &pipeline.steps[source_idx].labels {
        tree.add_label(root, label.clone());
    }

    let mut cursor = root;
    let mut walk = source_idx + 1;

    loop {
        absorb_filters(pipeline, &mut tree, cursor, &mut walk);

        let Some(next) = pipeline.steps.get(walk) else {
            break;
        };
        let replaced = match &next.step {
            Step::Navigate {
                direction,
                edge_labels,
                emit,
            } => ReplacedStep::edge_nav(*direction, *emit, edge_labels.iter().cloned()),
            Step::Endpoint {
                direction,
                vertex_labels,
            } if emits_edges(tree.get(cursor)) => {
                ReplacedStep::vertex_nav(*direction, vertex_labels.iter().cloned())
            }
            _ => break,
        };

        let host = pipeline.steps.remove(walk);
        cursor = tree.add_replaced(replaced);
        for label in &host.labels {
            tree.add_label(cursor, label.clone());
        }
    }

    absorb_trailing(pipeline, &mut tree, cursor, &mut walk);

    debug!(steps = tree.len(), "folded traversal prefix");
    let labels = std::mem::take(&mut pipeline.steps[source_idx].labels);
    pipeline.steps[source_idx] = PipelineStep {
        step: Step::Compiled(CompiledSource::new(element, tree)),
        labels,
    };
}

fn emits_edges(step: &ReplacedStep) -> bool {
    step.kind.emitted_element() == ElementKind::Edge
}

/// Absorb adjacent foldable filter steps into `cursor`, skipping identity
/// steps. A folded filter step that carried labels is replaced by an
/// identity step at the same position so downstream label consumers still
/// find a step to bind to; the labels are additionally recorded on the
/// replaced step so the emitter re-attaches them at the right path
/// position.
fn absorb_filters(
    pipeline: &mut Pipeline,
    tree: &mut ReplacedStepTree,
    cursor: StepId,
    walk: &mut usize,
) {
    loop {
        match pipeline.steps.get(*walk).map(|s| &s.step) {
            Some(Step::Identity) => {
                *walk += 1;
            }
            Some(Step::Has { containers }) if classify(containers).is_some() => {
                let host = pipeline.steps.remove(*walk);
                let Step::Has { containers } = host.step else {
                    unreachable!("matched a filter step");
                };
                tree.add_filters(cursor, containers);
                if !host.labels.is_empty() {
                    for label in &host.labels {
                        tree.add_label(cursor, label.clone());
                    }
                    pipeline.steps.insert(
                        *walk,
                        PipelineStep {
                            step: Step::Identity,
                            labels: host.labels,
                        },
                    );
                    *walk += 1;
                }
            }
            _ => return,
        }
    }
}

/// Absorb a trailing ordering, row limit, and property projection.
///
/// These fold only at the end of the prefix: an ordering folds when its
/// comparator is plain property keys, a limit always folds (rendered into
/// SQL or enforced by the emitter when the plan splits), and a projection
/// folds only as the final step of the whole pipeline.
fn absorb_trailing(
    pipeline: &mut Pipeline,
    tree: &mut ReplacedStepTree,
    cursor: StepId,
    walk: &mut usize,
) {
    loop {
        match pipeline.steps.get(*walk).map(|s| &s.step) {
            Some(Step::Identity) => {
                *walk += 1;
            }
            Some(Step::Order { custom: false, .. }) => {
                let host = pipeline.steps.remove(*walk);
                let Step::Order { keys, .. } = host.step else {
                    unreachable!("matched an ordering step");
                };
                tree.get_mut(cursor).order_by.extend(keys);
                restore_label_binding(pipeline, tree, cursor, walk, host.labels);
            }
            Some(Step::Limit { count }) => {
                let count = *count;
                let host = pipeline.steps.remove(*walk);
                let step = tree.get_mut(cursor);
                step.limit = Some(step.limit.map_or(count, |existing| existing.min(count)));
                restore_label_binding(pipeline, tree, cursor, walk, host.labels);
            }
            Some(Step::Values { .. }) if *walk == pipeline.steps.len() - 1 => {
                let host = pipeline.steps.remove(*walk);
                let Step::Values { keys } = host.step else {
                    unreachable!("matched a projection step");
                };
                let projection = tree.add_replaced(ReplacedStep::property_projection(keys));
                for label in &host.labels {
                    tree.add_label(projection, label.clone());
                }
                return;
            }
            _ => return,
        }
    }
}

fn restore_label_binding(
    pipeline: &mut Pipeline,
    tree: &mut ReplacedStepTree,
    cursor: StepId,
    walk: &mut usize,
    labels: indexmap::IndexSet<String>,
) {
    if labels.is_empty() {
        return;
    }
    for label in &labels {
        tree.add_label(cursor, label.clone());
    }
    pipeline.steps.insert(
        *walk,
        PipelineStep {
            step: Step::Identity,
            labels,
        },
    );
    *walk += 1;
}
