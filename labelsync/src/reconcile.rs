//! Orchestration for a single move event.
//!
//! Runs the event filter, builds the redirect title set, asks the decision
//! engine what to do and passes any proposed write through the change guard
//! and confirmation before it reaches the item store. Every outcome worth a
//! human's attention is journaled.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::decision::{Decision, decide};
use crate::core::filter::{
    FilterStep, Severity, SkipReason, check_linkage, check_namespace, check_source, check_target,
};
use crate::core::guard::{GuardVerdict, evaluate_change};
use crate::core::redirects::RedirectTitleSet;
use crate::core::types::{ItemSnapshot, MoveEvent, PageStatus};
use crate::io::config::EditionProfile;
use crate::io::confirm::Confirmer;
use crate::io::journal::Journal;
use crate::io::wiki::PageDirectory;
use crate::io::wikibase::ItemStore;

/// Collaborators and settings shared by every event of a run.
pub struct ReconcileContext<'a> {
    pub profile: &'a EditionProfile,
    pub pages: &'a dyn PageDirectory,
    pub items: &'a dyn ItemStore,
    pub confirmer: &'a dyn Confirmer,
    pub journal: &'a dyn Journal,
    /// Journal what would be written without writing it.
    pub dry_run: bool,
}

/// What happened to one move event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Skipped(SkipReason),
    /// The item had no label; the target title was added.
    Added { item_id: String, label: String },
    Changed {
        item_id: String,
        from: String,
        to: String,
        alias_added: bool,
    },
    /// Label already follows the target title.
    Unchanged { item_id: String },
    /// The change would introduce forbidden substrings.
    Rejected {
        item_id: String,
        introduced: Vec<String>,
    },
    /// The operator declined the change.
    Declined { item_id: String },
    /// The label matches nothing known; left for manual triage.
    Unsure { item_id: String, label: String },
}

impl EventOutcome {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Added { .. } | Self::Changed { .. })
    }
}

/// Process one move event end to end.
///
/// Errors are collaborator failures only; every recoverable condition is
/// journaled and reported through the returned outcome.
pub fn reconcile_event(event: &MoveEvent, ctx: &ReconcileContext<'_>) -> Result<EventOutcome> {
    debug!(source = %event.source, target = %event.target, timestamp = %event.timestamp, "reconciling move");
    let item = match filter_event(event, ctx)? {
        Ok(item) => item,
        Err(reason) => {
            let line = reason.describe(event);
            match reason.severity() {
                Severity::Info => info!("{line}"),
                Severity::Warning => ctx.journal.warn(&line)?,
            }
            return Ok(EventOutcome::Skipped(reason));
        }
    };

    let redirect_titles = ctx
        .pages
        .redirects_to(&event.target)
        .with_context(|| format!("list redirects to {}", event.target))?;
    let redirects = RedirectTitleSet::build(&ctx.profile.splitter, &redirect_titles);

    let decision = decide(item.label(), &event.target, &event.source, &redirects)
        .with_context(|| format!("decide label for move {} -> {}", event.source, event.target))?;
    debug!(item_id = %item.id, ?decision, "decision");

    match decision {
        Decision::Add { label } => apply_change(ctx, &item, &label, false),
        Decision::Replace {
            label, keep_alias, ..
        } => apply_change(ctx, &item, &label, keep_alias),
        Decision::Unsure => {
            let label = item.label().unwrap_or_default().to_string();
            ctx.journal.info(&format!(
                "Page \"{}\" moved to \"{}\". Label of {} is \"{}\". Not sure what to do.",
                event.source, event.target, item.id, label
            ))?;
            Ok(EventOutcome::Unsure {
                item_id: item.id,
                label,
            })
        }
        Decision::AlreadyCurrent => Ok(EventOutcome::Unchanged { item_id: item.id }),
    }
}

/// Run the filter checks in order, querying collaborators only as needed.
///
/// Returns the item linked to the target when the event passes.
fn filter_event(
    event: &MoveEvent,
    ctx: &ReconcileContext<'_>,
) -> Result<std::result::Result<ItemSnapshot, SkipReason>> {
    if let FilterStep::Skip(reason) = check_namespace(event, ctx.profile.namespace) {
        return Ok(Err(reason));
    }

    let source_status = ctx
        .pages
        .page_status(&event.source)
        .with_context(|| format!("page status of {}", event.source))?;
    if let FilterStep::Skip(reason) = check_source(&source_status) {
        return Ok(Err(reason));
    }
    if source_status == PageStatus::Missing {
        info!(source = %event.source, "source no longer exists (moved without redirect or deleted)");
    }

    let target_status = ctx
        .pages
        .page_status(&event.target)
        .with_context(|| format!("page status of {}", event.target))?;
    if let FilterStep::Skip(reason) = check_target(&target_status) {
        return Ok(Err(reason));
    }

    let source_item = ctx
        .items
        .linked_item(&event.source)
        .with_context(|| format!("item linked to {}", event.source))?;
    let target_item = ctx
        .items
        .linked_item(&event.target)
        .with_context(|| format!("item linked to {}", event.target))?;
    let step = check_linkage(
        source_item.as_ref().map(|item| item.id.as_str()),
        target_item.as_ref().map(|item| item.id.as_str()),
    );
    match (step, target_item) {
        (FilterStep::Skip(reason), _) => Ok(Err(reason)),
        (FilterStep::Continue, Some(item)) => Ok(Ok(item)),
        (FilterStep::Continue, None) => Ok(Err(SkipReason::TargetUnlinked)),
    }
}

/// Guard, confirm and write a proposed label.
fn apply_change(
    ctx: &ReconcileContext<'_>,
    item: &ItemSnapshot,
    proposed: &str,
    keep_alias: bool,
) -> Result<EventOutcome> {
    let current = item.label();
    let needs_review = match evaluate_change(current, proposed, &ctx.profile.policy) {
        GuardVerdict::Unchanged => {
            return Ok(EventOutcome::Unchanged {
                item_id: item.id.clone(),
            });
        }
        GuardVerdict::Rejected { introduced } => {
            ctx.journal.warn(&format!(
                "{}: Will not change label from \"{}\" to \"{}\" since it introduces \"{}\"",
                item.id,
                current.unwrap_or_default(),
                proposed,
                introduced.join("\", \"")
            ))?;
            return Ok(EventOutcome::Rejected {
                item_id: item.id.clone(),
                introduced,
            });
        }
        GuardVerdict::Accepted { needs_review } => needs_review,
    };

    let description = match current {
        Some(current) => format!("{}: CHANGE label from \"{current}\" to \"{proposed}\"", item.id),
        None => format!("{}: ADD label \"{proposed}\"", item.id),
    };
    if !ctx.dry_run && !ctx.confirmer.confirm(&format!("{description}?"))? {
        info!(item_id = %item.id, "change declined");
        return Ok(EventOutcome::Declined {
            item_id: item.id.clone(),
        });
    }

    // The alias goes first: once the label moves, a rerun no longer sees the
    // old label and cannot recover it.
    let alias_added = match current {
        Some(current) if keep_alias && !item.state.has_alias(current) => {
            let summary = format!(
                "Keeping previous label as alias after page move on {}",
                ctx.profile.site_id()
            );
            write_alias(ctx, &item.id, current, &summary)?;
            journal_change(ctx, &format!("{}: ALIAS \"{current}\" kept", item.id))?;
            true
        }
        _ => false,
    };

    let summary = match current {
        Some(_) => format!("Changing label to reflect page move on {}", ctx.profile.site_id()),
        None => format!("Add label from {}", ctx.profile.site_id()),
    };
    write_label(ctx, &item.id, proposed, &summary)?;
    journal_change(ctx, &description)?;
    for substring in &needs_review {
        ctx.journal.warn(&format!(
            "{}: Label \"{proposed}\" includes \"{substring}\" -- please verify manually!",
            item.id
        ))?;
    }

    Ok(match current {
        Some(current) => EventOutcome::Changed {
            item_id: item.id.clone(),
            from: current.to_string(),
            to: proposed.to_string(),
            alias_added,
        },
        None => EventOutcome::Added {
            item_id: item.id.clone(),
            label: proposed.to_string(),
        },
    })
}

fn write_label(ctx: &ReconcileContext<'_>, item_id: &str, label: &str, summary: &str) -> Result<()> {
    if ctx.dry_run {
        return Ok(());
    }
    ctx.items
        .set_label(item_id, label, summary)
        .with_context(|| format!("write label of {item_id}"))
}

fn write_alias(ctx: &ReconcileContext<'_>, item_id: &str, alias: &str, summary: &str) -> Result<()> {
    if ctx.dry_run {
        return Ok(());
    }
    ctx.items
        .add_alias(item_id, alias, summary)
        .with_context(|| format!("write alias of {item_id}"))
}

fn journal_change(ctx: &ReconcileContext<'_>, line: &str) -> Result<()> {
    if ctx.dry_run {
        ctx.journal.info(&format!("[dry-run] {line}"))
    } else {
        ctx.journal.info(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::confirm::AcceptAll;
    use crate::test_support::{
        FakeItemStore, FakeWiki, MemoryJournal, ScriptedConfirmer, Write, item, profile,
    };

    fn event(source: &str, target: &str) -> MoveEvent {
        MoveEvent {
            log_id: 1,
            timestamp: "2024-05-01T12:00:00Z".to_string(),
            source: source.to_string(),
            target: target.to_string(),
            target_namespace: 0,
        }
    }

    fn moved_with_redirect(wiki: &FakeWiki, source: &str, target: &str) {
        wiki.set_redirect(source, target);
        wiki.set_article(target);
    }

    struct Harness {
        profile: EditionProfile,
        wiki: FakeWiki,
        items: FakeItemStore,
        journal: MemoryJournal,
    }

    impl Harness {
        fn new(edition: &str) -> Self {
            Self {
                profile: profile(edition),
                wiki: FakeWiki::default(),
                items: FakeItemStore::default(),
                journal: MemoryJournal::default(),
            }
        }

        fn try_run(&self, event: &MoveEvent, confirmer: &dyn Confirmer) -> Result<EventOutcome> {
            let ctx = ReconcileContext {
                profile: &self.profile,
                pages: &self.wiki,
                items: &self.items,
                confirmer,
                journal: &self.journal,
                dry_run: false,
            };
            reconcile_event(event, &ctx)
        }

        fn run(&self, event: &MoveEvent, confirmer: &dyn Confirmer) -> EventOutcome {
            self.try_run(event, confirmer).expect("reconcile")
        }
    }

    #[test]
    fn label_from_redirect_is_replaced_and_kept_as_alias() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Oslo", item("Q585", Some("Kristiania"), &[]));

        let outcome = h.run(&event("Kristiania", "Oslo"), &AcceptAll);

        assert_eq!(
            outcome,
            EventOutcome::Changed {
                item_id: "Q585".to_string(),
                from: "Kristiania".to_string(),
                to: "Oslo".to_string(),
                alias_added: true,
            }
        );
        assert_eq!(
            h.items.writes(),
            vec![
                Write::Alias {
                    item_id: "Q585".to_string(),
                    value: "Kristiania".to_string(),
                    summary: "Keeping previous label as alias after page move on nowiki"
                        .to_string(),
                },
                Write::Label {
                    item_id: "Q585".to_string(),
                    value: "Oslo".to_string(),
                    summary: "Changing label to reflect page move on nowiki".to_string(),
                },
            ]
        );
        assert_eq!(
            h.journal.info_lines(),
            vec![
                "Q585: ALIAS \"Kristiania\" kept",
                "Q585: CHANGE label from \"Kristiania\" to \"Oslo\"",
            ]
        );
    }

    #[test]
    fn existing_alias_is_not_duplicated() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items
            .link("Oslo", item("Q585", Some("Kristiania"), &["Kristiania"]));

        let outcome = h.run(&event("Kristiania", "Oslo"), &AcceptAll);

        assert!(matches!(
            outcome,
            EventOutcome::Changed {
                alias_added: false,
                ..
            }
        ));
        assert_eq!(h.items.writes().len(), 1);
    }

    #[test]
    fn missing_label_is_added_without_alias() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Oslo", item("Q585", None, &[]));

        let outcome = h.run(&event("Kristiania", "Oslo"), &AcceptAll);

        assert_eq!(
            outcome,
            EventOutcome::Added {
                item_id: "Q585".to_string(),
                label: "Oslo".to_string(),
            }
        );
        assert_eq!(
            h.items.writes(),
            vec![Write::Label {
                item_id: "Q585".to_string(),
                value: "Oslo".to_string(),
                summary: "Add label from nowiki".to_string(),
            }]
        );
    }

    #[test]
    fn added_label_with_qualifier_is_flagged_for_review() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Moss", "Moss (by)");
        h.items.link("Moss (by)", item("Q9", None, &[]));

        let outcome = h.run(&event("Moss", "Moss (by)"), &AcceptAll);

        assert!(outcome.is_write());
        assert_eq!(
            h.journal.warn_lines(),
            vec!["Q9: Label \"Moss (by)\" includes \" (\" -- please verify manually!"]
        );
    }

    #[test]
    fn introducing_qualifier_is_rejected_without_write() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Foo", "Foo (bar)");
        h.items.link("Foo (bar)", item("Q1", Some("Foo"), &[]));

        let outcome = h.run(&event("Foo", "Foo (bar)"), &AcceptAll);

        assert_eq!(
            outcome,
            EventOutcome::Rejected {
                item_id: "Q1".to_string(),
                introduced: vec![" (".to_string()],
            }
        );
        assert!(h.items.writes().is_empty());
        assert_eq!(
            h.journal.warn_lines(),
            vec!["Q1: Will not change label from \"Foo\" to \"Foo (bar)\" since it introduces \" (\""]
        );
    }

    #[test]
    fn removing_qualifier_is_applied() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Foo (bar)", "Foo");
        h.items.link("Foo", item("Q1", Some("Foo (bar)"), &[]));

        // The redirect title truncates to "Foo", so the label only matches the source title.
        let outcome = h.run(&event("Foo (bar)", "Foo"), &AcceptAll);

        assert_eq!(
            outcome,
            EventOutcome::Changed {
                item_id: "Q1".to_string(),
                from: "Foo (bar)".to_string(),
                to: "Foo".to_string(),
                alias_added: false,
            }
        );
    }

    #[test]
    fn lowercased_redirect_match_equal_to_label_is_not_rewritten() {
        let h = Harness::new("nb");
        // "Oslo kommune (kommune)" truncates to "Oslo kommune"; folded it equals the label,
        // and so does the folded target title.
        moved_with_redirect(&h.wiki, "Oslo kommune (kommune)", "Oslo kommune");
        h.items
            .link("Oslo kommune", item("Q1", Some("oslo kommune"), &[]));

        let outcome = h.run(&event("Oslo kommune (kommune)", "Oslo kommune"), &AcceptAll);

        assert_eq!(
            outcome,
            EventOutcome::Unchanged {
                item_id: "Q1".to_string()
            }
        );
        assert!(h.items.writes().is_empty());
        assert!(h.journal.info_lines().is_empty());
    }

    #[test]
    fn label_matching_folded_target_is_not_rewritten() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Oslo Kommune", "Oslo kommune");
        h.items
            .link("Oslo kommune", item("Q2", Some("oslo kommune"), &[]));

        let outcome = h.run(&event("Oslo Kommune", "Oslo kommune"), &AcceptAll);

        assert_eq!(
            outcome,
            EventOutcome::Unchanged {
                item_id: "Q2".to_string()
            }
        );
        assert!(h.items.writes().is_empty());
    }

    #[test]
    fn unrelated_label_is_left_for_triage() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Oslo", item("Q585", Some("Tigerstaden"), &[]));

        let outcome = h.run(&event("Kristiania", "Oslo"), &AcceptAll);

        assert!(matches!(outcome, EventOutcome::Unsure { .. }));
        assert!(h.items.writes().is_empty());
        assert_eq!(
            h.journal.info_lines(),
            vec!["Page \"Kristiania\" moved to \"Oslo\". Label of Q585 is \"Tigerstaden\". Not sure what to do."]
        );
    }

    #[test]
    fn declined_confirmation_writes_nothing() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Oslo", item("Q585", Some("Kristiania"), &[]));
        let confirmer = ScriptedConfirmer::new(vec![false]);

        let outcome = h.run(&event("Kristiania", "Oslo"), &confirmer);

        assert_eq!(
            outcome,
            EventOutcome::Declined {
                item_id: "Q585".to_string()
            }
        );
        assert!(h.items.writes().is_empty());
        assert_eq!(
            confirmer.prompts(),
            vec!["Q585: CHANGE label from \"Kristiania\" to \"Oslo\"?"]
        );
    }

    #[test]
    fn source_article_is_skipped_before_item_lookup() {
        let h = Harness::new("nb");
        h.wiki.set_article("Kristiania");
        h.wiki.set_article("Oslo");

        let outcome = h.run(&event("Kristiania", "Oslo"), &AcceptAll);

        assert_eq!(outcome, EventOutcome::Skipped(SkipReason::SourceIsArticle));
        assert_eq!(h.items.lookups(), 0);
    }

    #[test]
    fn linkage_not_migrated_is_warned() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Kristiania", item("Q585", Some("Kristiania"), &[]));

        let outcome = h.run(&event("Kristiania", "Oslo"), &AcceptAll);

        assert_eq!(
            outcome,
            EventOutcome::Skipped(SkipReason::LinkageNotMigrated {
                source_item: "Q585".to_string()
            })
        );
        assert_eq!(h.journal.warn_lines().len(), 1);
    }

    #[test]
    fn dry_run_journals_without_writing() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Oslo", item("Q585", Some("Kristiania"), &[]));
        let confirmer = ScriptedConfirmer::new(Vec::new());
        let ctx = ReconcileContext {
            profile: &h.profile,
            pages: &h.wiki,
            items: &h.items,
            confirmer: &confirmer,
            journal: &h.journal,
            dry_run: true,
        };

        let outcome = reconcile_event(&event("Kristiania", "Oslo"), &ctx).expect("reconcile");

        assert!(outcome.is_write());
        assert!(h.items.writes().is_empty());
        assert!(confirmer.prompts().is_empty());
        assert_eq!(
            h.journal.info_lines(),
            vec![
                "[dry-run] Q585: ALIAS \"Kristiania\" kept",
                "[dry-run] Q585: CHANGE label from \"Kristiania\" to \"Oslo\"",
            ]
        );
    }

    #[test]
    fn failed_write_is_an_error() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Oslo", item("Q585", Some("Kristiania"), &[]));
        h.items.fail_writes();
        let ctx = ReconcileContext {
            profile: &h.profile,
            pages: &h.wiki,
            items: &h.items,
            confirmer: &AcceptAll,
            journal: &h.journal,
            dry_run: false,
        };

        let err = reconcile_event(&event("Kristiania", "Oslo"), &ctx).expect_err("write fails");
        assert!(format!("{err:#}").contains("write alias of Q585"));
        assert!(h.journal.info_lines().is_empty());
    }

    #[test]
    fn refused_alias_leaves_label_for_the_rerun() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Oslo", item("Q585", Some("Kristiania"), &[]));
        h.items.fail_next_alias();

        let err = h
            .try_run(&event("Kristiania", "Oslo"), &AcceptAll)
            .expect_err("alias refused");
        assert!(format!("{err:#}").contains("write alias of Q585"));
        assert!(h.items.writes().is_empty());

        let outcome = h.run(&event("Kristiania", "Oslo"), &AcceptAll);
        assert!(matches!(
            outcome,
            EventOutcome::Changed {
                alias_added: true,
                ..
            }
        ));
        let state = h.items.item("Q585").map(|item| item.state);
        assert_eq!(
            state.as_ref().and_then(|state| state.label.as_deref()),
            Some("Oslo")
        );
        assert_eq!(
            state.map(|state| state.aliases),
            Some(vec!["Kristiania".to_string()])
        );
    }

    #[test]
    fn refused_label_is_retried_without_a_second_alias() {
        let h = Harness::new("nb");
        moved_with_redirect(&h.wiki, "Kristiania", "Oslo");
        h.items.link("Oslo", item("Q585", Some("Kristiania"), &[]));
        h.items.fail_next_label();

        let err = h
            .try_run(&event("Kristiania", "Oslo"), &AcceptAll)
            .expect_err("label refused");
        assert!(format!("{err:#}").contains("write label of Q585"));
        assert_eq!(h.journal.info_lines(), vec!["Q585: ALIAS \"Kristiania\" kept"]);

        let outcome = h.run(&event("Kristiania", "Oslo"), &AcceptAll);
        assert!(matches!(
            outcome,
            EventOutcome::Changed {
                alias_added: false,
                ..
            }
        ));
        let writes = h.items.writes();
        assert_eq!(writes.len(), 2);
        assert!(matches!(&writes[0], Write::Alias { value, .. } if value == "Kristiania"));
        assert!(matches!(&writes[1], Write::Label { value, .. } if value == "Oslo"));
    }
}
